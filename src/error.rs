//! Error taxonomy: validation, gateway, storage, secrets, auth.
//!
//! Per-entry gateway failures are recovered inside a batch and never reach
//! this top-level `Error`; everything here fails a whole request.

use thiserror::Error;
use uuid::Uuid;

pub use crate::gateway::{GatewayError, GatewayErrorKind};

/// Client input faults. Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payroll file is empty")]
    EmptyFile,
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("line {line}: {reason}")]
    Line { line: usize, reason: String },
    #[error("unsupported payroll format: {0}")]
    Format(String),
}

/// Ledger faults, distinct from business failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage timed out")]
    Timeout,
    #[error("record {0} already exists")]
    Duplicate(Uuid),
    #[error("corrupt record at {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
    #[error("secret {0} is malformed")]
    Malformed(String),
}

/// Authentication failures. All fail closed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid wallet address")]
    InvalidAddress,
    #[error("challenge expired or already used")]
    ChallengeExpired,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid token")]
    InvalidToken,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("config: {0}")]
    Config(String),
    /// Faults in our own code paths, never caused by input or configuration.
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
