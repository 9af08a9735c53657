//! The module contains the error the engine can throw.
//!
//! The errors are grouped by how callers should react:
//!
//! - [`KeyNotFound`] when a referenced row does not exist.
//! - [`InvalidAmount`], [`InvalidInput`] and [`InvalidCsv`] for validation
//!   failures. Nothing is written when these are returned.
//! - [`Conflict`] when concurrent writers raced on the same ledger sequence
//!   and the retry budget was exhausted.
//! - [`Database`], [`Storage`] and [`Hashing`] for infrastructure failures.
//!   The enclosing transaction has been rolled back.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidInput`]: EngineError::InvalidInput
//!  [`InvalidCsv`]: EngineError::InvalidCsv
//!  [`Conflict`]: EngineError::Conflict
//!  [`Database`]: EngineError::Database
//!  [`Storage`]: EngineError::Storage
//!  [`Hashing`]: EngineError::Hashing
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid csv: {0}")]
    InvalidCsv(String),
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Credentials incorrect")]
    Unauthorized,
    #[error("Verify your account first")]
    EmailNotVerified,
    #[error("Conflict, retry later: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<std::io::Error> for EngineError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvalidCsv(a), Self::InvalidCsv(b)) => a == b,
            (Self::InsufficientStock(a), Self::InsufficientStock(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::Unauthorized, Self::Unauthorized) => true,
            (Self::EmailNotVerified, Self::EmailNotVerified) => true,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Storage(a), Self::Storage(b)) => a == b,
            (Self::Hashing(a), Self::Hashing(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
