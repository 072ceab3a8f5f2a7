//! # Depot Engine
//!
//! The handle every operation hangs off.
//!
//! A [`Depot`] owns the database, the gate, the audit log, the signed-in
//! session and the default credit limit. [`Depot::open`] runs migrations,
//! makes sure the local supplier exists, then restores the session.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use depot_core::{ApprovalPolicy, LedgerSnapshot, Money, Projections, User, DEFAULT_MAX_DEBT_LIMIT};
use depot_db::{Database, SnapshotScheduler, SnapshotSchedulerHandle};
use tracing::info;

use crate::audit::{Actor, AuditLog};
use crate::auth::ensure_local_supplier;
use crate::config::EngineConfig;
use crate::error::OpsResult;
use crate::gate::GateHandle;
use crate::live::LiveLedger;

#[derive(Debug, Clone)]
pub struct Depot {
    pub(crate) db: Database,
    pub(crate) gate: GateHandle,
    pub(crate) audit: AuditLog,
    pub(crate) session: Arc<RwLock<Option<User>>>,
    pub(crate) default_limit: Money,
}

impl Depot {
    /// Wraps an open database. Creates the local supplier if missing and
    /// picks up a persisted session.
    pub async fn new(db: Database, gate: GateHandle) -> OpsResult<Self> {
        ensure_local_supplier(&db).await?;

        let depot = Depot {
            audit: AuditLog::new(db.clone()),
            db,
            gate,
            session: Arc::new(RwLock::new(None)),
            default_limit: DEFAULT_MAX_DEBT_LIMIT,
        };
        depot.restore_session().await?;

        Ok(depot)
    }

    /// Opens the configured database and builds the engine on it.
    pub async fn open(config: &EngineConfig, gate: GateHandle) -> OpsResult<Self> {
        let db = Database::new(config.db_config()).await?;
        let depot = Depot::new(db, gate)
            .await?
            .with_default_limit(config.credit.default_max_debt_limit());

        info!(
            default_limit = %depot.default_limit,
            user = %depot.current_user().map(|u| u.username).unwrap_or_default(),
            "Depot ready"
        );
        Ok(depot)
    }

    pub fn with_default_limit(mut self, limit: Money) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn default_limit(&self) -> Money {
        self.default_limit
    }

    /// Starts the live projection task.
    pub async fn live(&self) -> OpsResult<LiveLedger> {
        LiveLedger::spawn(self.db.clone()).await
    }

    /// Starts periodic snapshots if the config enables them.
    pub fn start_snapshots(&self, config: &EngineConfig) -> Option<SnapshotSchedulerHandle> {
        if !config.snapshots.enabled {
            return None;
        }
        let (scheduler, handle) = SnapshotScheduler::new(
            self.db.clone(),
            config.snapshots.interval(),
            config.snapshots.retain,
        );
        tokio::spawn(scheduler.run());
        Some(handle)
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub fn current_user(&self) -> Option<User> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn set_current_user(&self, user: Option<User>) {
        match self.session.write() {
            Ok(mut guard) => *guard = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }

    pub(crate) fn actor(&self) -> Actor {
        self.current_user()
            .map(|u| Actor::from_user(&u))
            .unwrap_or_else(Actor::system)
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    pub(crate) fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub(crate) async fn policy(&self) -> OpsResult<ApprovalPolicy> {
        Ok(self.db.settings().load().await?.approval_policy())
    }

    /// Fresh ledger and its projections.
    pub async fn ledger(&self) -> OpsResult<(LedgerSnapshot, Projections)> {
        let snapshot = self.db.load_ledger().await?;
        let projections = snapshot.project();
        Ok((snapshot, projections))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::auth::hash_secret;
    use crate::gate::scripted::{gate, Answer};
    use depot_core::{ledger::fixtures, ADMIN_ROLE};
    use depot_db::DbConfig;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    pub const ADMIN_SECRET: &str = "s3cret";

    /// In-memory engine with one hashed admin and a stocked product
    /// `p-x` (cost 1.00, supply 10.00, 10 units in).
    pub async fn depot(answers: Vec<Answer>) -> (Depot, Arc<Mutex<Vec<String>>>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let admin = User {
            id: "u-admin".to_string(),
            username: "admin".to_string(),
            name: "Admin".to_string(),
            roles: BTreeSet::from([ADMIN_ROLE.to_string()]),
            password: Some(hash_secret(ADMIN_SECRET).unwrap()),
        };
        db.users().add(&admin).await.unwrap();
        db.products().add(&fixtures::product("p-x", 100, 1_000)).await.unwrap();
        db.suppliers().add(&fixtures::supplier("s-1")).await.unwrap();
        db.invoices()
            .add(&fixtures::invoice("i-1", "s-1", "F-1", vec![fixtures::invoice_line("p-x", 10, 100)]))
            .await
            .unwrap();
        db.stores().add(&fixtures::store("st-1", None)).await.unwrap();

        let (gate, seen) = gate(answers);
        (Depot::new(db, gate).await.unwrap(), seen)
    }
}
