//! # depot-ops: Mutation Operations for Depot
//!
//! Everything that changes the ledger goes through a [`Depot`].
//!
//! ## Flow of a Guarded Operation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UI                           depot-ops                      depot-db   │
//! │                                                                         │
//! │  cancel_dispatch(d, siniestro) ──►  load dispatch ────────────► get     │
//! │                                          │                              │
//! │  GateRequest::Credential  ◄──────── authorize()                         │
//! │  reply (admin secret)     ────────►      │ argon2 verify                │
//! │                                          ▼                              │
//! │                                     write-off invoice ────────► add     │
//! │                                     status = cancelled ───────► put     │
//! │                                     audit `anular` ───────────► add     │
//! │                                          │                              │
//! │  LiveLedger ◄── watch ◄── recompute ◄── ChangeFeed ◄────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - The [`Depot`] handle, session, shared helpers
//! - [`operations`] - Dispatches, invoices, payments, adjustments, approvals, catalog, admin
//! - [`auth`] - Authorization gate, login, users
//! - [`gate`] - Request/response channel for interactive prompts
//! - [`audit`] - Append-only audit log
//! - [`live`] - Projections republished on every ledger change
//! - [`config`] - `depot.toml` + `DEPOT_*` overrides
//! - [`telemetry`] - tracing subscriber setup
//! - [`error`] - Operation errors

pub mod audit;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod live;
pub mod operations;
pub mod telemetry;

pub use audit::{Actor, AuditLog};
pub use auth::{hash_secret, verify_secret, NewUser, SESSION_KEY};
pub use config::EngineConfig;
pub use engine::Depot;
pub use error::{OpsError, OpsResult};
pub use gate::{channel as gate_channel, GateHandle, GateRequest, GATE_BUFFER};
pub use live::{LedgerView, LiveLedger};
pub use operations::approval::{Approvable, PendingApprovals};
pub use operations::catalog::{NewProduct, NewStore, NewSupplier};
pub use operations::dispatch::{DispatchOutcome, NewDispatch};
pub use operations::invoice::NewInvoice;
pub use operations::payment::{NewStorePayment, NewSupplierPayment};
pub use telemetry::init_tracing;
