//! # Error Types
//!
//! Domain-specific error types for depot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  depot-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  depot-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  depot-ops errors                                                      │
//! │  └── OpsError         - What the UI collaborator sees                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → OpsError → UI                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dispatch pre-check failures (stock, credit limit, overdue, inactive) are
//! NOT errors: they come back as [`crate::checks::DispatchBlock`] values.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An approval action was requested from a state that does not allow it.
    ///
    /// ## When This Occurs
    /// - Approving a document that is already approved
    /// - Rejecting a document that was already rejected
    #[error("{entity} {id} is {current}, cannot {action}")]
    InvalidTransition {
        entity: String,
        id: String,
        current: String,
        action: String,
    },

    /// A return asks for more units than are still out at the store.
    #[error("Return of {requested} exceeds outstanding {outstanding} for product {product_id}")]
    ReturnExceedsOutstanding {
        product_id: String,
        outstanding: i64,
        requested: i64,
    },

    /// The product is not a line of the dispatch.
    #[error("Product {product_id} is not part of dispatch {dispatch_id}")]
    ProductNotInDispatch {
        dispatch_id: String,
        product_id: String,
    },

    /// The document was cancelled and accepts no further changes.
    #[error("{entity} {id} is cancelled")]
    DocumentCancelled { entity: String, id: String },

    /// Deleting an entity that still carries a balance.
    ///
    /// ## When This Occurs
    /// - Deleting a supplier with outstanding debt
    /// - Deleting a store that still owes money
    /// - Deleting a product with units in stock
    #[error("{entity} {id} still has a balance of {balance}")]
    OutstandingBalance {
        entity: String,
        id: String,
        balance: String,
    },

    /// Reserved identities (e.g. `sup-local`) cannot be removed.
    #[error("{0} is reserved and cannot be deleted")]
    ReservedEntity(String),

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {amount}")]
    InvalidPaymentAmount { amount: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    NonZero { field: String },

    /// Invalid format (e.g., invalid UUID, bad colour).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate invoice number for a supplier).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
