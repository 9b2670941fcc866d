//! Error types for powchain

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Malformed address, key, hash, signature or date.
    #[error("Format error: {0}")]
    Format(String),
    #[error("No response from {0} within {1:?}")]
    NetworkTimeout(String, Duration),
    /// The remote answered with a non-success HTTP status.
    #[error("Remote error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Block not found or already mined: {0}")]
    JobNotFound(String),
    #[error("Block hash mismatch: expected {expected}, got {submitted}")]
    HashMismatch { expected: String, submitted: String },
    #[error("Block hash {hash} does not have {difficulty} leading zeros")]
    DifficultyNotMet { difficulty: u32, hash: String },
    /// Another submission extended the chain first.
    #[error("Lost block race: {0}")]
    ConsensusRace(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl ChainError {
    /// Errors after which the mining peer is considered unreachable.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ChainError::NetworkTimeout(..) | ChainError::Transport(_)
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<hex::FromHexError> for ChainError {
    fn from(err: hex::FromHexError) -> Self {
        ChainError::Format(format!("Invalid hex: {}", err))
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Format(format!("Invalid JSON: {}", err))
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
