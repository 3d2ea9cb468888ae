use thiserror::Error;

use crate::blob::BlobError;
use crate::passphrase::PassphraseError;
use crate::scheduler::QueueError;
use crate::storage::StoreError;

/// Failures of the upload / view / revoke protocol.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Names the missing thing: `view`, `share` or `file`.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid passphrase")]
    Unauthorized,

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Storage failure: {0}")]
    Storage(#[from] BlobError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Scheduling failure: {0}")]
    Scheduling(#[from] QueueError),

    #[error(transparent)]
    Passphrase(#[from] PassphraseError),
}

impl AccessError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;
