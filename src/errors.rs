//! Unified error type for the card backend.
//!
//! Every failure carries a stable [`ErrorKind`] and a human-readable message. The
//! presentation layer maps kinds to HTTP-style status codes with
//! [`Error::status_code`].

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Coarse classification of an [`Error`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced card, user or request does not exist
    NotFound,
    /// The operation collides with existing state
    Conflict,
    /// The input itself is invalid
    BadRequest,
    /// The caller's role or ownership does not permit the operation
    Forbidden,
    /// A business rule rejected a transfer; an audit record was persisted
    DomainFailure,
    /// Storage, configuration or environment failure
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: i64 },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("Transfer allowed only between own cards")]
    OwnershipMismatch { transaction_id: i64 },

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds {
        transaction_id: i64,
        balance: i64,
        required: i64,
    },

    #[error("Transfer would overflow the destination balance")]
    BalanceOverflow { transaction_id: i64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return Self::Conflict {
                message: format!("Unique constraint violated: {detail}"),
            };
        }
        Self::Database(err)
    }
}

impl Error {
    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// NotFound for a card id, worded the same everywhere.
    pub(crate) fn card_not_found(card_id: i64) -> Self {
        Self::not_found(format!("Card with id {card_id} not found"))
    }

    /// NotFound for a user id.
    pub(crate) fn user_not_found(user_id: i64) -> Self {
        Self::not_found(format!("User with id {user_id} not found"))
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::BadRequest { .. } | Self::InvalidAmount { .. } => ErrorKind::BadRequest,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::OwnershipMismatch { .. }
            | Self::InsufficientFunds { .. }
            | Self::BalanceOverflow { .. } => ErrorKind::DomainFailure,
            Self::Config { .. } | Self::Database(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-style status code for the presentation layer.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::BadRequest | ErrorKind::DomainFailure => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::Internal => 500,
        }
    }

    /// Id of the audit transaction persisted before this error was raised, if any.
    #[must_use]
    pub const fn audit_transaction_id(&self) -> Option<i64> {
        match self {
            Self::OwnershipMismatch { transaction_id }
            | Self::InsufficientFunds { transaction_id, .. }
            | Self::BalanceOverflow { transaction_id } => Some(*transaction_id),
            _ => None,
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
