//! Engine errors

use guild_bank_storage::StorageError;
use guild_bank_types::{ConfigError, Rejection};

/// Errors returned by guild bank operations
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    /// Validation failed; nothing changed
    #[error("Request rejected: {0}")]
    Rejected(#[from] Rejection),

    /// The write batch could not be committed; nothing changed
    #[error("Commit failed: {0}")]
    Commit(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The guild's actor has stopped
    #[error("Guild bank unavailable")]
    Unavailable,
}

impl BankError {
    /// The rejection reason, when this is a validation failure
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            BankError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Result type alias for guild bank operations
pub type BankResult<T> = Result<T, BankError>;
