//! # depot-db: Document Store for Depot
//!
//! Every Depot collection lives in one SQLite file, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Depot Data Flow                                  │
//! │                                                                         │
//! │  depot-ops mutation (create_dispatch, approve, ...)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     depot-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ documents.rs  │    │  (embedded)  │  │   │
//! │  │   │               │◄───│ settings.rs   │    │              │  │   │
//! │  │   │ SqlitePool    │    │ kv.rs         │    │ 001_docs.sql │  │   │
//! │  │   │ ChangeFeed    │    │ backup.rs     │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ ChangeEvent                                        │   │
//! │  └───────────┼─────────────────────────────────────────────────────┘   │
//! │              ▼                                                          │
//! │  LiveLedger (depot-ops) recomputes projections                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and repository accessors
//! - [`collection`] - Collection names and the [`Document`] trait
//! - [`changes`] - Broadcast feed of document changes
//! - [`repository`] - Documents, settings, key-value slots
//! - [`backup`] - Export/import and periodic snapshots
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("depot.db")).await?;
//! let mut changes = db.changes().subscribe();
//!
//! db.stores().add(&store).await?;
//! let ledger = db.load_ledger().await?;
//! let projections = ledger.project();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backup;
pub mod changes;
pub mod collection;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use backup::{
    BackupSnapshot, ImportSummary, SnapshotInfo, SnapshotRepository, SnapshotScheduler,
    SnapshotSchedulerHandle, DEFAULT_SNAPSHOT_RETAIN,
};
pub use changes::{ChangeEvent, ChangeFeed, ChangeKind};
pub use collection::{Collection, Document};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{DocumentRepository, KvRepository, SettingsRepository};
