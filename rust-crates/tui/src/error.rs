use crate::workflow::TransitionError;
use tarot_contract::{
    IdError,
    MintRequestError,
    TxHash,
};

/// What went wrong, without the details. Stable enough to branch on in the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkFailure,
    AuthRequired,
    DecodeFailure,
    GenerationFailure,
    NotFound,
    InvalidInput,
    Transition,
}

#[derive(Debug, thiserror::Error)]
pub enum ReadingError {
    #[error("{context}: {reason}")]
    Network {
        context: &'static str,
        reason: String,
    },
    #[error("a signed-in wallet is required")]
    AuthRequired,
    #[error("could not decode {what}: {reason}")]
    Decode {
        what: &'static str,
        reason: String,
    },
    #[error("reading fetch failed: {0}")]
    Generation(String),
    #[error("transaction {0} was not found")]
    NotFound(TxHash),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl ReadingError {
    pub fn network(context: &'static str, err: impl std::fmt::Display) -> Self {
        ReadingError::Network {
            context,
            reason: err.to_string(),
        }
    }

    pub fn from_http(context: &'static str, err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("timed out ({err})")
        } else {
            err.to_string()
        };
        ReadingError::Network { context, reason }
    }

    pub fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        ReadingError::Decode {
            what,
            reason: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReadingError::Network { .. } => ErrorKind::NetworkFailure,
            ReadingError::AuthRequired => ErrorKind::AuthRequired,
            ReadingError::Decode { .. } => ErrorKind::DecodeFailure,
            ReadingError::Generation(_) => ErrorKind::GenerationFailure,
            ReadingError::NotFound(_) => ErrorKind::NotFound,
            ReadingError::InvalidInput(_) => ErrorKind::InvalidInput,
            ReadingError::Transition(_) => ErrorKind::Transition,
        }
    }
}

impl From<MintRequestError> for ReadingError {
    fn from(err: MintRequestError) -> Self {
        ReadingError::InvalidInput(err.to_string())
    }
}

impl From<IdError> for ReadingError {
    fn from(err: IdError) -> Self {
        ReadingError::InvalidInput(err.to_string())
    }
}

/// A failure as kept in view state: cloneable, already rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn headline(&self) -> &'static str {
        match self.kind {
            ErrorKind::NetworkFailure => "The network could not be reached",
            ErrorKind::AuthRequired => "Connect a wallet first",
            ErrorKind::DecodeFailure => "The draw could not be read from the transaction",
            ErrorKind::GenerationFailure => "The reading could not be generated",
            ErrorKind::NotFound => "The transaction was not found on chain",
            ErrorKind::InvalidInput => "Some required details are missing",
            ErrorKind::Transition => "That action is not available right now",
        }
    }
}

impl From<&ReadingError> for Failure {
    fn from(err: &ReadingError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
