//! # depot-core: Pure Ledger Logic for Depot
//!
//! This crate is the **heart** of Depot. It turns an append-mostly log of
//! business documents into point-in-time balances, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Depot Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI collaborator                              │   │
//! │  │   Dispatch form ──► Approvals inbox ──► Balances dashboards    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    depot-ops (mutations, gates)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ depot-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  ledger   │  │ approval  │  │  checks   │  │   │
//! │  │   │ Invoice   │  │  stock    │  │  Pending  │  │  stock    │  │   │
//! │  │   │ Dispatch  │  │  debt     │  │  Approved │  │  credit   │  │   │
//! │  │   │ Payment   │  │  profit   │  │  Rejected │  │  overdue  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO PROMPTS • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    depot-db (Document Store)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Documents (Invoice, StockDispatch, payments, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`ledger`] - Stock, invoice, supplier, store and profit projections
//! - [`approval`] - Approval state machine and policy
//! - [`checks`] - Ordered pre-checks for dispatch creation
//! - [`settings`] - Flat key→value business settings
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use depot_core::ledger::LedgerSnapshot;
//!
//! let snapshot = LedgerSnapshot::default();
//! let projections = snapshot.project();
//! assert!(projections.stock.is_empty());
//! assert!(projections.profit.net_profit.is_zero());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod approval;
pub mod checks;
pub mod error;
pub mod ledger;
pub mod money;
pub mod settings;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use approval::{ApprovalAction, ApprovalPolicy, ApprovalStatus, DocumentKind};
pub use checks::DispatchBlock;
pub use ledger::{LedgerSnapshot, Projections};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use settings::Settings;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Reserved supplier for internal production, loss and adjustment documents.
///
/// Must always exist; it can never be deleted.
pub const LOCAL_SUPPLIER_ID: &str = "sup-local";

/// Comparison tolerance for balances (0.05 currency units).
pub const BALANCE_TOLERANCE: Money = Money::from_cents(5);

/// Credit ceiling applied when a store has no `maxDebtLimit` configured (20000.00).
pub const DEFAULT_MAX_DEBT_LIMIT: Money = Money::from_cents(2_000_000);

/// Role token that may answer the authorization gate.
pub const ADMIN_ROLE: &str = "admin";

/// Invoice number prefix for manual stock gains (production, found stock).
pub const GAIN_INVOICE_PREFIX: &str = "VIRT-";

/// Invoice number prefix for losses. Every `sup-local` invoice starting with
/// this prefix feeds `totalLosses`.
pub const LOSS_INVOICE_PREFIX: &str = "BAJA";

/// Invoice number prefix for dispatches written off as lost/stolen.
pub const SINIESTRO_INVOICE_PREFIX: &str = "BAJA-SIN-";

/// Maximum quantity on a single document line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 100000 instead of 100).
pub const MAX_LINE_QUANTITY: i64 = 99_999;
