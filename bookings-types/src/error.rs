//! Error types for the booking service.

use crate::domain::Currency;
use crate::ports::GatewayError;

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error("Amount arithmetic overflowed")]
    AmountOverflow,

    #[error("Invalid booking interval: {0}")]
    InvalidInterval(String),

    #[error("Start and end dates cannot be in the past")]
    PastDate,

    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => AppError::BadRequest(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(err.to_string())
    }
}
