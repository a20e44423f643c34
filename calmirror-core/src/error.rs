//! Error types for the caching layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::AccountKey;
use crate::event::EventId;

/// Errors that can occur while serving or refreshing a cached account.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountKey),

    /// The conditional account write lost against a concurrent writer.
    #[error("Account {key} was modified concurrently (expected version {expected})")]
    ConcurrentModification { key: AccountKey, expected: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Remote source error: {0}")]
    Remote(String),

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// The account's source could not be set up; carries the original error.
    #[error("Calendar source unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MirrorError {
    /// A version conflict is the expected signal that a peer got there first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, MirrorError::ConcurrentModification { .. })
    }

    /// Stable machine-readable code, used when an error travels as a warning.
    pub fn code(&self) -> &'static str {
        match self {
            MirrorError::Config(_) => "config",
            MirrorError::AccountNotFound(_) => "account_not_found",
            MirrorError::ConcurrentModification { .. } => "concurrent_modification",
            MirrorError::Storage(_) => "storage",
            MirrorError::Remote(_) => "remote",
            MirrorError::EventNotFound(_) => "event_not_found",
            MirrorError::Unavailable(_) => "unavailable",
            MirrorError::Serialization(_) => "serialization",
            MirrorError::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(e: serde_json::Error) -> Self {
        MirrorError::Serialization(e.to_string())
    }
}

/// Result type alias for caching operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// A non-fatal problem carried alongside a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub code: String,
    pub message: String,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Warning {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn from_error(err: &MirrorError) -> Self {
        Warning::new(err.code(), err.to_string())
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
