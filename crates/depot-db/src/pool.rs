//! # Database Pool Management
//!
//! Connection pool creation and repository access for the SQLite store.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Handle                                    │
//! │                                                                         │
//! │  DbConfig::new(path)                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← pool + migrations                        │
//! │       │                                                                 │
//! │       ├── SqlitePool ───────────► documents / settings / kv / snapshots │
//! │       │                                                                 │
//! │       └── ChangeFeed ───────────► every write publishes a ChangeEvent   │
//! │                                                                         │
//! │  db.dispatches().add(&d) ──► INSERT ──► feed: dispatches/added/d.id     │
//! │  db.load_ledger()        ──► LedgerSnapshot for depot-core              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases run in WAL mode so the live ledger can read while a
//! mutation is writing. `:memory:` databases are a single connection that
//! never expires, since the data dies with it.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use depot_core::{
    AuditLogEntry, Invoice, LedgerSnapshot, Product, StockAdjustment, StockDispatch, Store,
    StorePayment, Supplier, SupplierPayment, User,
};

use crate::backup::SnapshotRepository;
use crate::changes::ChangeFeed;
use crate::collection::Document;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::documents::DocumentRepository;
use crate::repository::kv::KvRepository;
use crate::repository::settings::SettingsRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/depot.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Default: 5
    pub max_connections: u32,

    /// Default: 1
    pub min_connections: u32,

    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Capacity of the change feed buffer per subscriber.
    pub feed_capacity: usize,
}

impl DbConfig {
    /// Creates a configuration for a database file, created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            feed_capacity: crate::changes::DEFAULT_FEED_CAPACITY,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            feed_capacity: crate::changes::DEFAULT_FEED_CAPACITY,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone: the pool and the change feed are both shared handles.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl Database {
    /// Creates the connection pool and runs migrations if enabled.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        let connect_options = if config.is_in_memory() {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            pool_options = pool_options.idle_timeout(Some(config.idle_timeout));
            let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
            SqliteConnectOptions::from_str(&connect_url)
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true)
        };

        debug!("Connection options configured");

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            feed: ChangeFeed::new(config.feed_capacity),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// The raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The feed every repository publishes writes to.
    pub fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// Repository for any [`Document`] type.
    pub fn documents<T: Document>(&self) -> DocumentRepository<T> {
        DocumentRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn products(&self) -> DocumentRepository<Product> {
        self.documents()
    }

    pub fn suppliers(&self) -> DocumentRepository<Supplier> {
        self.documents()
    }

    pub fn stores(&self) -> DocumentRepository<Store> {
        self.documents()
    }

    pub fn invoices(&self) -> DocumentRepository<Invoice> {
        self.documents()
    }

    pub fn dispatches(&self) -> DocumentRepository<StockDispatch> {
        self.documents()
    }

    pub fn store_payments(&self) -> DocumentRepository<StorePayment> {
        self.documents()
    }

    pub fn supplier_payments(&self) -> DocumentRepository<SupplierPayment> {
        self.documents()
    }

    pub fn adjustments(&self) -> DocumentRepository<StockAdjustment> {
        self.documents()
    }

    pub fn audit_logs(&self) -> DocumentRepository<AuditLogEntry> {
        self.documents()
    }

    pub fn users(&self) -> DocumentRepository<User> {
        self.documents()
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn kv(&self) -> KvRepository {
        KvRepository::new(self.pool.clone())
    }

    pub fn snapshots(&self) -> SnapshotRepository {
        SnapshotRepository::new(self.pool.clone())
    }

    /// Reads every ledger collection into one snapshot for projection.
    pub async fn load_ledger(&self) -> DbResult<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            products: self.products().all().await?,
            suppliers: self.suppliers().all().await?,
            stores: self.stores().all().await?,
            invoices: self.invoices().all().await?,
            dispatches: self.dispatches().all().await?,
            store_payments: self.store_payments().all().await?,
            supplier_payments: self.supplier_payments().all().await?,
            stock_adjustments: self.adjustments().all().await?,
        })
    }

    /// Closes the pool. Repository calls fail afterwards.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::ledger::fixtures;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        assert!(config.is_in_memory());

        let db = Database::new(config).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .feed_capacity(16);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.feed_capacity, 16);
        assert!(!config.is_in_memory());
    }

    #[tokio::test]
    async fn test_load_ledger_reads_every_collection() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().add(&fixtures::product("p-1", 1_000, 0)).await.unwrap();
        db.stores().add(&fixtures::store("st-1", None)).await.unwrap();
        db.dispatches()
            .add(&fixtures::dispatch("d-1", "st-1", vec![fixtures::dispatch_line("p-1", 2, 1_500)]))
            .await
            .unwrap();

        let ledger = db.load_ledger().await.unwrap();
        assert_eq!(ledger.products.len(), 1);
        assert_eq!(ledger.stores.len(), 1);
        assert_eq!(ledger.dispatches.len(), 1);
        assert!(ledger.invoices.is_empty());
    }
}
