//! Upload error types.

use skydrive_transfer::TransferError;

use crate::types::{TaskId, TaskStatus};

/// Errors produced by the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// A pause or cancel request was observed. Not a failure.
    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Api(#[from] skydrive_api::Error),

    #[error("cannot read source file: {0}")]
    Source(TransferError),

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server reported a collision without saying which file collides.
    #[error("name conflict with an unidentified file")]
    UnidentifiedConflict,

    #[error("name conflict still unresolved after {0} attempts")]
    ConflictLoop(u32),

    #[error("no one is answering conflict prompts")]
    NoDecisionMaker,

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {id} is {status}")]
    InvalidState { id: TaskId, status: TaskStatus },

    #[error("upload engine stopped")]
    EngineStopped,
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Interrupted => Self::Interrupted,
            TransferError::InvalidName(_) | TransferError::InvalidPath(_) => {
                Self::InvalidSource(e.to_string())
            }
            other => Self::Source(other),
        }
    }
}

impl UploadError {
    /// Whether a fresh attempt of the whole sequence may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
