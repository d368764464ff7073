//! Error types for store access
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Failure talking to a document store, either on a point query or on the
/// change feed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether a later attempt may succeed without any change on our side
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(_) | StoreError::Unavailable(_) => true,
            StoreError::Status { code, .. } => *code == 429 || *code >= 500,
            StoreError::Decode(_) | StoreError::Config(_) => false,
        }
    }
}
