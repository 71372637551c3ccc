//! The page-level state machine: one enum, explicit transitions.
//!
//! Every transition borrows the current state and returns the next one, so
//! a rejected move leaves the caller's state untouched.

use crate::{
    error::{
        ErrorKind,
        Failure,
    },
    reading::{
        Reading,
        ReadingRequest,
    },
};
use std::fmt;
use tarot_contract::{
    DrawResult,
    TxHash,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    WalletRequired,
    Drawing,
    AwaitingRedirect,
    Resolving,
    GeneratingReading,
    ReadingReady,
    Minting,
    Minted,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::WalletRequired => "wallet-required",
            Stage::Drawing => "drawing",
            Stage::AwaitingRedirect => "awaiting-redirect",
            Stage::Resolving => "resolving",
            Stage::GeneratingReading => "generating-reading",
            Stage::ReadingReady => "reading-ready",
            Stage::Minting => "minting",
            Stage::Minted => "minted",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} while {from}")]
    NotAllowed { from: Stage, action: &'static str },
    #[error("a question is required before drawing")]
    EmptyQuestion,
    #[error("no question has been asked for transaction {0}")]
    QuestionMissing(TxHash),
}

/// A finished reading: the question, the card and the generated text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedReading {
    pub question: String,
    pub draw: DrawResult,
    pub reading: Reading,
}

impl CompletedReading {
    pub fn request(&self) -> ReadingRequest {
        ReadingRequest::new(self.question.clone(), &self.draw)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ViewState {
    #[default]
    Idle,
    WalletRequired {
        interrupted: Box<ViewState>,
    },
    Drawing {
        question: String,
    },
    AwaitingRedirect {
        question: Option<String>,
        tx_hash: TxHash,
    },
    Resolving {
        question: String,
        tx_hash: TxHash,
    },
    GeneratingReading {
        question: String,
        draw: DrawResult,
    },
    ReadingReady {
        completed: CompletedReading,
    },
    Minting {
        completed: CompletedReading,
        tx_hash: Option<TxHash>,
    },
    Minted {
        completed: CompletedReading,
        tx_hash: TxHash,
        token_id: Option<String>,
    },
    /// `retry` is the state the failed step can be taken up again from.
    Error {
        failure: Failure,
        at: Stage,
        retry: Option<Box<ViewState>>,
    },
}

impl ViewState {
    pub fn stage(&self) -> Stage {
        match self {
            ViewState::Idle => Stage::Idle,
            ViewState::WalletRequired { .. } => Stage::WalletRequired,
            ViewState::Drawing { .. } => Stage::Drawing,
            ViewState::AwaitingRedirect { .. } => Stage::AwaitingRedirect,
            ViewState::Resolving { .. } => Stage::Resolving,
            ViewState::GeneratingReading { .. } => Stage::GeneratingReading,
            ViewState::ReadingReady { .. } => Stage::ReadingReady,
            ViewState::Minting { .. } => Stage::Minting,
            ViewState::Minted { .. } => Stage::Minted,
            ViewState::Error { .. } => Stage::Error,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.stage(),
            Stage::Drawing
                | Stage::AwaitingRedirect
                | Stage::Resolving
                | Stage::GeneratingReading
                | Stage::Minting
        )
    }

    pub fn question(&self) -> Option<&str> {
        match self {
            ViewState::Drawing { question }
            | ViewState::Resolving { question, .. }
            | ViewState::GeneratingReading { question, .. } => Some(question),
            ViewState::AwaitingRedirect { question, .. } => question.as_deref(),
            ViewState::ReadingReady { completed }
            | ViewState::Minting { completed, .. }
            | ViewState::Minted { completed, .. } => Some(&completed.question),
            ViewState::WalletRequired { interrupted }
            | ViewState::Error {
                retry: Some(interrupted),
                ..
            } => interrupted.question(),
            ViewState::Idle | ViewState::Error { .. } => None,
        }
    }

    pub fn draw(&self) -> Option<&DrawResult> {
        match self {
            ViewState::GeneratingReading { draw, .. } => Some(draw),
            ViewState::ReadingReady { completed }
            | ViewState::Minting { completed, .. }
            | ViewState::Minted { completed, .. } => Some(&completed.draw),
            ViewState::WalletRequired { interrupted }
            | ViewState::Error {
                retry: Some(interrupted),
                ..
            } => interrupted.draw(),
            _ => None,
        }
    }

    pub fn completed(&self) -> Option<&CompletedReading> {
        match self {
            ViewState::ReadingReady { completed }
            | ViewState::Minting { completed, .. }
            | ViewState::Minted { completed, .. } => Some(completed),
            ViewState::WalletRequired { interrupted }
            | ViewState::Error {
                retry: Some(interrupted),
                ..
            } => interrupted.completed(),
            _ => None,
        }
    }

    /// The draw transaction being followed, if any.
    pub fn tracked_draw(&self) -> Option<&TxHash> {
        match self {
            ViewState::AwaitingRedirect { tx_hash, .. }
            | ViewState::Resolving { tx_hash, .. } => Some(tx_hash),
            _ => None,
        }
    }

    fn not_allowed(&self, action: &'static str) -> TransitionError {
        TransitionError::NotAllowed {
            from: self.stage(),
            action,
        }
    }

    /// idle → drawing, or the wallet prompt when nobody is signed in.
    pub fn request_draw(
        &self,
        question: &str,
        signed_in: bool,
    ) -> Result<ViewState, TransitionError> {
        let ViewState::Idle = self else {
            return Err(self.not_allowed("draw"));
        };
        let question = question.trim();
        if question.is_empty() {
            return Err(TransitionError::EmptyQuestion);
        }
        if !signed_in {
            return Ok(ViewState::WalletRequired {
                interrupted: Box::new(self.clone()),
            });
        }
        Ok(ViewState::Drawing {
            question: question.to_string(),
        })
    }

    pub fn draw_submitted(&self, tx_hash: TxHash) -> Result<ViewState, TransitionError> {
        let ViewState::Drawing { question } = self else {
            return Err(self.not_allowed("record a draw transaction"));
        };
        Ok(ViewState::AwaitingRedirect {
            question: Some(question.clone()),
            tx_hash,
        })
    }

    /// Entry point when the client starts from a wallet redirect.
    pub fn resume_from_redirect(
        &self,
        tx_hash: TxHash,
        question: Option<String>,
    ) -> Result<ViewState, TransitionError> {
        let ViewState::Idle = self else {
            return Err(self.not_allowed("resume a redirect"));
        };
        let question = question
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        Ok(ViewState::AwaitingRedirect { question, tx_hash })
    }

    pub fn answer_question(&self, question: &str) -> Result<ViewState, TransitionError> {
        let ViewState::AwaitingRedirect { tx_hash, .. } = self else {
            return Err(self.not_allowed("answer the question"));
        };
        let question = question.trim();
        if question.is_empty() {
            return Err(TransitionError::EmptyQuestion);
        }
        Ok(ViewState::AwaitingRedirect {
            question: Some(question.to_string()),
            tx_hash: tx_hash.clone(),
        })
    }

    /// awaiting-redirect → resolving, once the question is known.
    pub fn begin_resolving(&self) -> Result<ViewState, TransitionError> {
        let ViewState::AwaitingRedirect { question, tx_hash } = self else {
            return Err(self.not_allowed("resolve a transaction"));
        };
        let question = question
            .clone()
            .ok_or_else(|| TransitionError::QuestionMissing(tx_hash.clone()))?;
        Ok(ViewState::Resolving {
            question,
            tx_hash: tx_hash.clone(),
        })
    }

    pub fn draw_resolved(&self, draw: DrawResult) -> Result<ViewState, TransitionError> {
        let ViewState::Resolving { question, .. } = self else {
            return Err(self.not_allowed("accept a draw"));
        };
        Ok(ViewState::GeneratingReading {
            question: question.clone(),
            draw,
        })
    }

    pub fn reading_generated(&self, reading: Reading) -> Result<ViewState, TransitionError> {
        let ViewState::GeneratingReading { question, draw } = self else {
            return Err(self.not_allowed("accept a reading"));
        };
        Ok(ViewState::ReadingReady {
            completed: CompletedReading {
                question: question.clone(),
                draw: draw.clone(),
                reading,
            },
        })
    }

    pub fn request_mint(&self, signed_in: bool) -> Result<ViewState, TransitionError> {
        let ViewState::ReadingReady { completed } = self else {
            return Err(self.not_allowed("mint"));
        };
        if !signed_in {
            return Ok(ViewState::WalletRequired {
                interrupted: Box::new(self.clone()),
            });
        }
        Ok(ViewState::Minting {
            completed: completed.clone(),
            tx_hash: None,
        })
    }

    pub fn mint_submitted(&self, tx_hash: TxHash) -> Result<ViewState, TransitionError> {
        match self {
            ViewState::Minting {
                completed,
                tx_hash: None,
            } => Ok(ViewState::Minting {
                completed: completed.clone(),
                tx_hash: Some(tx_hash),
            }),
            _ => Err(self.not_allowed("record a mint transaction")),
        }
    }

    pub fn mint_confirmed(&self, token_id: Option<String>) -> Result<ViewState, TransitionError> {
        match self {
            ViewState::Minting {
                completed,
                tx_hash: Some(tx_hash),
            } => Ok(ViewState::Minted {
                completed: completed.clone(),
                tx_hash: tx_hash.clone(),
                token_id,
            }),
            _ => Err(self.not_allowed("confirm a mint")),
        }
    }

    /// Any in-flight state → error. No partial draw or reading is carried
    /// over; only the point a retry would start from.
    pub fn fail(&self, failure: Failure) -> Result<ViewState, TransitionError> {
        if !self.is_in_flight() {
            return Err(self.not_allowed("fail"));
        }
        let retry = self.retry_point(failure.kind).map(Box::new);
        Ok(ViewState::Error {
            failure,
            at: self.stage(),
            retry,
        })
    }

    /// A tracked transaction the node could not show yet is looked up
    /// again; a finished reading survives any mint failure.
    fn retry_point(&self, kind: ErrorKind) -> Option<ViewState> {
        let transient = matches!(
            kind,
            ErrorKind::NotFound | ErrorKind::NetworkFailure | ErrorKind::AuthRequired
        );
        match self {
            ViewState::Resolving { question, tx_hash } if transient => {
                Some(ViewState::AwaitingRedirect {
                    question: Some(question.clone()),
                    tx_hash: tx_hash.clone(),
                })
            }
            ViewState::Minting {
                completed,
                tx_hash: Some(tx_hash),
            } if transient => Some(ViewState::Minting {
                completed: completed.clone(),
                tx_hash: Some(tx_hash.clone()),
            }),
            ViewState::Minting { completed, .. } => Some(ViewState::ReadingReady {
                completed: completed.clone(),
            }),
            _ => None,
        }
    }

    pub fn can_retry(&self) -> bool {
        matches!(self, ViewState::Error { retry: Some(_), .. })
    }

    /// error → the state the failed step left off at.
    pub fn retry(&self) -> Result<ViewState, TransitionError> {
        match self {
            ViewState::Error {
                retry: Some(resume),
                ..
            } => Ok((**resume).clone()),
            _ => Err(self.not_allowed("retry")),
        }
    }

    /// Leaves the wallet prompt, back to whatever it interrupted.
    pub fn leave_wallet_prompt(&self) -> Result<ViewState, TransitionError> {
        let ViewState::WalletRequired { interrupted } = self else {
            return Err(self.not_allowed("close the wallet prompt"));
        };
        Ok((**interrupted).clone())
    }

    pub fn restart(&self) -> Result<ViewState, TransitionError> {
        match self.stage() {
            Stage::Minted | Stage::Error | Stage::ReadingReady | Stage::Idle => {
                Ok(ViewState::Idle)
            }
            _ => Err(self.not_allowed("start again")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::error::ErrorKind;

    fn hash(byte: u8) -> TxHash {
        TxHash::from_digest([byte; 32])
    }

    fn draw() -> DrawResult {
        DrawResult {
            card: "XVII The Star".to_string(),
            image_ref: "ipfs://cid/17.png".to_string(),
            orientation: "upright".to_string(),
        }
    }

    fn ready() -> ViewState {
        ViewState::Idle
            .request_draw("Will it work out?", true)
            .and_then(|s| s.draw_submitted(hash(1)))
            .and_then(|s| s.begin_resolving())
            .and_then(|s| s.draw_resolved(draw()))
            .and_then(|s| {
                s.reading_generated(Reading {
                    text: "Hope returns.".to_string(),
                })
            })
            .unwrap()
    }

    fn failure() -> Failure {
        Failure {
            kind: ErrorKind::NetworkFailure,
            message: "down".to_string(),
        }
    }

    #[test]
    fn request_draw__requires_signed_in_session() {
        // when
        let state = ViewState::Idle.request_draw("Will it work out?", false).unwrap();

        // then
        assert_eq!(
            state,
            ViewState::WalletRequired {
                interrupted: Box::new(ViewState::Idle)
            }
        );
        assert_eq!(state.leave_wallet_prompt().unwrap(), ViewState::Idle);
    }

    #[test]
    fn request_draw__rejects_blank_question() {
        assert_eq!(
            ViewState::Idle.request_draw("   ", true),
            Err(TransitionError::EmptyQuestion)
        );
    }

    #[test]
    fn happy_path__walks_every_stage_in_order() {
        let mut stages = Vec::new();
        let mut state = ViewState::Idle;
        stages.push(state.stage());
        state = state.request_draw("Q?", true).unwrap();
        stages.push(state.stage());
        state = state.draw_submitted(hash(1)).unwrap();
        stages.push(state.stage());
        state = state.begin_resolving().unwrap();
        stages.push(state.stage());
        state = state.draw_resolved(draw()).unwrap();
        stages.push(state.stage());
        state = state
            .reading_generated(Reading {
                text: "t".to_string(),
            })
            .unwrap();
        stages.push(state.stage());
        state = state.request_mint(true).unwrap();
        state = state.mint_submitted(hash(2)).unwrap();
        stages.push(state.stage());
        state = state.mint_confirmed(Some("0".to_string())).unwrap();
        stages.push(state.stage());

        assert_eq!(
            stages,
            vec![
                Stage::Idle,
                Stage::Drawing,
                Stage::AwaitingRedirect,
                Stage::Resolving,
                Stage::GeneratingReading,
                Stage::ReadingReady,
                Stage::Minting,
                Stage::Minted,
            ]
        );
    }

    #[test]
    fn reading_generated__unreachable_without_a_draw() {
        let reading = Reading {
            text: "t".to_string(),
        };
        let drawing = ViewState::Idle.request_draw("Q?", true).unwrap();

        for state in [ViewState::Idle, drawing] {
            assert!(matches!(
                state.reading_generated(reading.clone()),
                Err(TransitionError::NotAllowed { .. })
            ));
        }
    }

    #[test]
    fn request_mint__only_from_reading_ready() {
        assert!(ViewState::Idle.request_mint(true).is_err());
        let interrupted = ready().request_mint(false).unwrap();
        assert_eq!(interrupted.stage(), Stage::WalletRequired);
        assert_eq!(interrupted.leave_wallet_prompt().unwrap(), ready());
    }

    #[test]
    fn resume_from_redirect__tracks_only_one_transaction() {
        // given
        let awaiting = ViewState::Idle
            .request_draw("Q?", true)
            .and_then(|s| s.draw_submitted(hash(1)))
            .unwrap();

        // when
        let other = awaiting.resume_from_redirect(hash(9), Some("Q?".to_string()));

        // then
        assert!(matches!(
            other,
            Err(TransitionError::NotAllowed {
                from: Stage::AwaitingRedirect,
                ..
            })
        ));
        assert_eq!(awaiting.tracked_draw(), Some(&hash(1)));
    }

    #[test]
    fn resume_from_redirect__waits_for_question() {
        // given
        let awaiting = ViewState::Idle.resume_from_redirect(hash(3), None).unwrap();

        // when
        let missing = awaiting.begin_resolving();
        let answered = awaiting.answer_question("Is it time?").unwrap();

        // then
        assert_eq!(missing, Err(TransitionError::QuestionMissing(hash(3))));
        assert_eq!(
            answered.begin_resolving().unwrap(),
            ViewState::Resolving {
                question: "Is it time?".to_string(),
                tx_hash: hash(3),
            }
        );
    }

    #[test]
    fn fail__only_from_in_flight_states() {
        let resolving = ViewState::Idle
            .resume_from_redirect(hash(3), Some("Q?".to_string()))
            .and_then(|s| s.begin_resolving())
            .unwrap();

        let errored = resolving.fail(failure()).unwrap();

        assert_eq!(errored.stage(), Stage::Error);
        assert!(errored.draw().is_none());
        assert!(errored.completed().is_none());
        assert!(ViewState::Idle.fail(failure()).is_err());
        assert!(ready().fail(failure()).is_err());
    }

    #[test]
    fn fail__unseen_draw_can_be_resolved_again() {
        // given
        let resolving = ViewState::Idle
            .resume_from_redirect(hash(3), Some("Q?".to_string()))
            .and_then(|s| s.begin_resolving())
            .unwrap();
        let not_found = Failure {
            kind: ErrorKind::NotFound,
            message: "not yet".to_string(),
        };

        // when
        let errored = resolving.fail(not_found).unwrap();

        // then
        assert!(errored.can_retry());
        assert_eq!(
            errored.retry().unwrap(),
            ViewState::AwaitingRedirect {
                question: Some("Q?".to_string()),
                tx_hash: hash(3),
            }
        );
    }

    #[test]
    fn fail__failed_draw_decode_offers_no_retry() {
        let resolving = ViewState::Idle
            .resume_from_redirect(hash(3), Some("Q?".to_string()))
            .and_then(|s| s.begin_resolving())
            .unwrap();
        let undecodable = Failure {
            kind: ErrorKind::DecodeFailure,
            message: "no result".to_string(),
        };

        let errored = resolving.fail(undecodable).unwrap();

        assert!(!errored.can_retry());
        assert!(errored.retry().is_err());
    }

    #[test]
    fn fail__mint_failure_keeps_the_reading() {
        // given
        let unsent = ready().request_mint(true).unwrap();
        let sent = unsent.mint_submitted(hash(2)).unwrap();

        // when
        let before_send = unsent.fail(failure()).unwrap();
        let after_send = sent.fail(failure()).unwrap();

        // then
        assert_eq!(before_send.completed(), ready().completed());
        assert_eq!(before_send.retry().unwrap(), ready());
        assert_eq!(after_send.completed(), ready().completed());
        assert_eq!(after_send.retry().unwrap(), sent);
    }

    #[test]
    fn restart__clears_draw_and_reading() {
        let minted = ready()
            .request_mint(true)
            .and_then(|s| s.mint_submitted(hash(2)))
            .and_then(|s| s.mint_confirmed(None))
            .unwrap();

        let restarted = minted.restart().unwrap();

        assert_eq!(restarted, ViewState::Idle);
        assert!(restarted.draw().is_none());
        assert!(restarted.completed().is_none());
        let resolving = ViewState::Idle
            .resume_from_redirect(hash(3), Some("Q?".to_string()))
            .and_then(|s| s.begin_resolving())
            .unwrap();
        assert!(resolving.restart().is_err());
        let errored = ready()
            .request_mint(true)
            .and_then(|s| s.fail(failure()))
            .unwrap();
        assert_eq!(errored.restart().unwrap(), ViewState::Idle);
    }
}
