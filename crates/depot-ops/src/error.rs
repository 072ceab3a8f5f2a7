//! # Operation Errors
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CoreError ──┐                                                          │
//! │  DbError ────┼──► OpsError ──► code() for the UI collaborator           │
//! │  config I/O ─┘                                                          │
//! │                                                                         │
//! │  Unauthorized   admin secret did not match (audit `block` written)      │
//! │  Cancelled      the user dismissed a gate prompt (nothing written)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A dispatch refused by a pre-check is NOT an error: it comes back as
//! [`crate::DispatchOutcome::Blocked`].

use depot_core::{CoreError, ValidationError};
use depot_db::DbError;
use thiserror::Error;

pub type OpsResult<T> = Result<T, OpsError>;

#[derive(Debug, Error)]
pub enum OpsError {
    /// The presented credential matched no admin.
    #[error("Not authorized to {operation}")]
    Unauthorized { operation: String },

    /// A gate prompt was dismissed.
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read or write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl From<ValidationError> for OpsError {
    fn from(err: ValidationError) -> Self {
        OpsError::Core(CoreError::Validation(err))
    }
}

impl From<toml::de::Error> for OpsError {
    fn from(err: toml::de::Error) -> Self {
        OpsError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for OpsError {
    fn from(err: toml::ser::Error) -> Self {
        OpsError::Config(err.to_string())
    }
}

impl OpsError {
    pub fn unauthorized(operation: impl Into<String>) -> Self {
        OpsError::Unauthorized {
            operation: operation.into(),
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        OpsError::Cancelled {
            operation: operation.into(),
        }
    }

    /// Machine-readable code for the UI.
    pub fn code(&self) -> &'static str {
        match self {
            OpsError::Unauthorized { .. } => "UNAUTHORIZED",
            OpsError::Cancelled { .. } => "CANCELLED",
            OpsError::Core(CoreError::Validation(_)) => "VALIDATION_ERROR",
            OpsError::Core(_) => "BUSINESS_LOGIC",
            OpsError::Db(DbError::NotFound { .. }) => "NOT_FOUND",
            OpsError::Db(_) => "DATABASE_ERROR",
            OpsError::Config(_) | OpsError::Io(_) => "CONFIG_ERROR",
            OpsError::Hash(_) => "INTERNAL",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OpsError::Cancelled { .. })
    }
}
