use crate::{
    error::{
        Failure,
        ReadingError,
    },
    invoker::{
        ContractInvoker,
        FunctionCaller,
    },
    reading::{
        CompletionApi,
        ReadingGenerator,
        ReadingRequest,
    },
    resolver::{
        Resolution,
        TransactionQuery,
        TransactionResolver,
    },
    session::WalletSession,
    workflow::{
        Stage,
        TransitionError,
        ViewState,
    },
};
use color_eyre::eyre::Result;
use tarot_contract::{
    MintRequest,
    TxHash,
};
use tracing::{
    error,
    info,
    warn,
};

/// Drives one reading at a time through draw, resolve, generate and mint.
///
/// Every step is a separate awaited call so the UI can redraw in between;
/// a failed step moves the state to [`ViewState::Error`], keeping only the
/// point [`Self::retry`] can pick up from.
pub struct AppController<S, Q, F, C> {
    session: S,
    resolver: TransactionResolver<Q>,
    invoker: ContractInvoker<F>,
    generator: ReadingGenerator<C>,
    state: ViewState,
    pub status: String,
}

impl<S, Q, F, C> AppController<S, Q, F, C>
where
    S: WalletSession,
    Q: TransactionQuery,
    F: FunctionCaller,
    C: CompletionApi,
{
    pub fn new(
        session: S,
        resolver: TransactionResolver<Q>,
        invoker: ContractInvoker<F>,
        generator: ReadingGenerator<C>,
    ) -> Self {
        Self {
            session,
            resolver,
            invoker,
            generator,
            state: ViewState::Idle,
            status: String::from("Ready"),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn invoker(&self) -> &ContractInvoker<F> {
        &self.invoker
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    /// Starts from a hash handed back by the wallet. Without a question the
    /// state waits in awaiting-redirect until [`Self::answer_question`].
    pub fn load_redirect(
        &mut self,
        tx_hash: TxHash,
        question: Option<String>,
    ) -> Result<(), ReadingError> {
        self.state = self.state.resume_from_redirect(tx_hash, question)?;
        info!(state = %self.state.stage(), "redirect loaded");
        Ok(())
    }

    pub fn answer_question(&mut self, question: &str) -> Result<(), ReadingError> {
        self.state = self.state.answer_question(question)?;
        Ok(())
    }

    /// Whether the tracked draw can be resolved now.
    pub fn ready_to_resolve(&self) -> bool {
        matches!(
            &self.state,
            ViewState::AwaitingRedirect {
                question: Some(_),
                ..
            }
        )
    }

    /// idle → drawing → awaiting-redirect. Leaves the state at the wallet
    /// prompt when nobody is signed in.
    pub async fn request_draw(&mut self, question: &str) -> Result<(), ReadingError> {
        self.state = self
            .state
            .request_draw(question, self.session.is_signed_in())?;
        if self.state.stage() == Stage::WalletRequired {
            self.set_status("Sign in to draw a card");
            return Ok(());
        }
        info!("requesting draw");
        match self.invoker.draw(&self.session).await {
            Ok(tx_hash) => {
                self.state = self.state.draw_submitted(tx_hash)?;
                self.set_status("Draw submitted; waiting for the transaction");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// awaiting-redirect → resolving → generating-reading.
    pub async fn resolve_draw(&mut self) -> Result<(), ReadingError> {
        self.state = self.state.begin_resolving()?;
        let tx_hash = match self.state.tracked_draw() {
            Some(tx_hash) => tx_hash.clone(),
            None => return Err(self.reject("resolve a transaction")),
        };
        info!(%tx_hash, "resolving draw");

        let account = match self.session.account_id() {
            Some(account) => account.clone(),
            None => return Err(self.fail(ReadingError::AuthRequired)),
        };
        let resolution = match self.resolver.resolve(&tx_hash, &account).await {
            Ok(resolution) => resolution,
            Err(e) => return Err(self.fail(e)),
        };
        match resolution {
            Resolution::Draw(draw) => {
                info!(card = %draw.card, orientation = %draw.orientation, "draw resolved");
                self.state = self.state.draw_resolved(draw)?;
                self.set_status("Card drawn; generating the reading");
                Ok(())
            }
            Resolution::Logs(logs) => {
                let reason = if logs.is_empty() {
                    "transaction has no result and no logs".to_string()
                } else {
                    logs.join("; ")
                };
                Err(self.fail(ReadingError::decode("draw result", reason)))
            }
            Resolution::Minted { .. } => Err(self.fail(ReadingError::decode(
                "draw result",
                "transaction is a mint, not a draw",
            ))),
        }
    }

    /// generating-reading → reading-ready. Refused from any other state, so
    /// the generator is never called without a Draw Result.
    pub async fn generate_reading(&mut self) -> Result<(), ReadingError> {
        let request = match &self.state {
            ViewState::GeneratingReading { question, draw } => {
                ReadingRequest::new(question.clone(), draw)
            }
            _ => return Err(self.reject("accept a reading")),
        };
        match self.generator.generate(&request).await {
            Ok(reading) => {
                self.state = self.state.reading_generated(reading)?;
                self.set_status("Your reading is ready");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Resolves the tracked draw and generates its reading.
    pub async fn complete_redirect(&mut self) -> Result<(), ReadingError> {
        self.resolve_draw().await?;
        self.generate_reading().await
    }

    /// reading-ready → minting. The mint request is validated before
    /// anything is sent, then the mint is confirmed.
    pub async fn request_mint(&mut self) -> Result<(), ReadingError> {
        self.state = self.state.request_mint(self.session.is_signed_in())?;
        if self.state.stage() == Stage::WalletRequired {
            self.set_status("Sign in to mint the reading");
            return Ok(());
        }
        let request = match self.mint_request() {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e)),
        };

        let tx_hash = match self.invoker.mint(&self.session, &request).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => return Err(self.fail(e)),
        };
        self.state = self.state.mint_submitted(tx_hash)?;
        self.set_status("Mint submitted; waiting for the transaction");
        self.confirm_mint().await
    }

    /// minting → minted once the submitted mint reports its token.
    pub async fn confirm_mint(&mut self) -> Result<(), ReadingError> {
        let tx_hash = match &self.state {
            ViewState::Minting {
                tx_hash: Some(tx_hash),
                ..
            } => tx_hash.clone(),
            _ => return Err(self.reject("confirm a mint")),
        };
        let account = match self.session.account_id() {
            Some(account) => account.clone(),
            None => return Err(self.fail(ReadingError::AuthRequired)),
        };
        let resolution = match self.resolver.resolve(&tx_hash, &account).await {
            Ok(resolution) => resolution,
            Err(e) => return Err(self.fail(e)),
        };
        match resolution {
            Resolution::Minted { token_id } => {
                info!(%tx_hash, token_id = ?token_id, "reading minted");
                self.state = self.state.mint_confirmed(token_id)?;
                self.set_status("Reading minted");
                Ok(())
            }
            Resolution::Logs(logs) if !logs.is_empty() => {
                Err(self.fail(ReadingError::decode("mint result", logs.join("; "))))
            }
            _ => Err(self.fail(ReadingError::decode(
                "mint result",
                "transaction did not mint a token",
            ))),
        }
    }

    fn mint_request(&self) -> Result<MintRequest, ReadingError> {
        let Some(completed) = self.state.completed() else {
            return Err(ReadingError::InvalidInput("no reading to mint".to_string()));
        };
        Ok(MintRequest::new(
            self.session.account_id().cloned(),
            &completed.question,
            &completed.reading.text,
            &completed.draw.card,
            &completed.draw.orientation,
        )?)
    }

    /// error → the step the failure left off at: awaiting the draw again,
    /// re-checking a submitted mint, or the reading ready to mint.
    pub fn retry(&mut self) -> Result<(), ReadingError> {
        self.state = self.state.retry()?;
        info!(state = %self.state.stage(), "retrying");
        self.set_status(match self.state.stage() {
            Stage::AwaitingRedirect => "Looking up the draw again",
            Stage::Minting => "Checking the mint again",
            _ => "Your reading is back; press m to mint",
        });
        Ok(())
    }

    pub fn restart(&mut self) -> Result<(), ReadingError> {
        self.state = self.state.restart()?;
        self.set_status("Ready");
        Ok(())
    }

    /// Signs in and, when the wallet prompt was up, returns to what it
    /// interrupted.
    pub fn sign_in(&mut self, account: &str) -> Result<()> {
        self.session.request_sign_in(account)?;
        if self.state.stage() == Stage::WalletRequired {
            self.state = self.state.leave_wallet_prompt()?;
        }
        self.set_status(format!("Signed in as {account}"));
        Ok(())
    }

    pub fn sign_out(&mut self) {
        self.session.sign_out();
        self.set_status("Signed out");
    }

    pub fn dismiss_wallet_prompt(&mut self) -> Result<(), ReadingError> {
        self.state = self.state.leave_wallet_prompt()?;
        Ok(())
    }

    fn fail(&mut self, err: ReadingError) -> ReadingError {
        let failure = Failure::from(&err);
        error!(error = %err, stage = %self.state.stage(), "workflow step failed");
        match self.state.fail(failure.clone()) {
            Ok(next) => self.state = next,
            Err(e) => warn!(error = %e, "failure outside an in-flight step"),
        }
        self.set_status(failure.headline());
        err
    }

    fn reject(&self, action: &'static str) -> ReadingError {
        ReadingError::Transition(TransitionError::NotAllowed {
            from: self.state.stage(),
            action,
        })
    }
}
