//! # Backup and Snapshots
//!
//! `export_all` dumps every collection as raw JSON. `import_all` clears and
//! refills each collection named in the snapshot inside one transaction and
//! leaves the others alone. [`SnapshotScheduler`] takes an internal snapshot
//! on an interval and keeps the newest few.
//!
//! Records travel as raw JSON, so fields this build does not know about
//! survive a round trip. Writing the snapshot to a file is the UI
//! collaborator's job.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::{Row, SqlitePool};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::changes::ChangeEvent;
use crate::collection::Collection;
use crate::error::{DbError, DbResult};
use crate::pool::Database;

/// `collection name → records`.
pub type BackupSnapshot = BTreeMap<String, Vec<Value>>;

/// Number of internal snapshots kept by default.
pub const DEFAULT_SNAPSHOT_RETAIN: usize = 5;

/// What an import replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub collections: usize,
    pub documents: usize,
}

fn record_key(collection: Collection, record: &Value, field: &str) -> DbResult<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DbError::Corrupt {
            collection: collection.name().to_string(),
            id: "?".to_string(),
            reason: format!("record without string `{field}`"),
        })
}

impl Database {
    /// Every collection as raw records, in insertion order.
    pub async fn export_all(&self) -> DbResult<BackupSnapshot> {
        let mut snapshot = BackupSnapshot::new();

        for collection in Collection::ALL {
            let records = if collection == Collection::Settings {
                self.settings()
                    .get_map()
                    .await?
                    .into_iter()
                    .map(|(key, value)| json!({ "key": key, "value": value }))
                    .collect()
            } else {
                let rows = sqlx::query(
                    "SELECT body FROM documents WHERE collection = ?1 ORDER BY rowid ASC",
                )
                .bind(collection.name())
                .fetch_all(self.pool())
                .await?;

                let mut records = Vec::with_capacity(rows.len());
                for row in rows {
                    let body: String = row.try_get("body")?;
                    records.push(serde_json::from_str(&body)?);
                }
                records
            };
            snapshot.insert(collection.name().to_string(), records);
        }

        debug!(collections = snapshot.len(), "Exported all collections");
        Ok(snapshot)
    }

    /// Clears and reloads every collection named in `snapshot`.
    ///
    /// ## Errors
    /// [`DbError::UnknownCollection`] or [`DbError::Corrupt`] before anything
    /// is written. The replacement itself is a single transaction.
    pub async fn import_all(&self, snapshot: &BackupSnapshot) -> DbResult<ImportSummary> {
        let mut plan: Vec<(Collection, Vec<(String, &Value)>)> = Vec::new();
        for (name, records) in snapshot {
            let collection: Collection = name.parse()?;
            let key_field = if collection == Collection::Settings { "key" } else { "id" };
            let mut keyed = Vec::with_capacity(records.len());
            for record in records {
                keyed.push((record_key(collection, record, key_field)?, record));
            }
            plan.push((collection, keyed));
        }

        let now = Utc::now();
        let mut summary = ImportSummary::default();
        let mut tx = self.pool().begin().await?;

        for (collection, records) in &plan {
            if *collection == Collection::Settings {
                sqlx::query("DELETE FROM settings").execute(&mut *tx).await?;
                for (key, record) in records {
                    let value = record.get("value").cloned().unwrap_or(Value::Null);
                    sqlx::query(
                        r#"
                        INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                        ON CONFLICT(key) DO UPDATE SET value = excluded.value
                        "#,
                    )
                    .bind(key)
                    .bind(serde_json::to_string(&value)?)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
            } else {
                sqlx::query("DELETE FROM documents WHERE collection = ?1")
                    .bind(collection.name())
                    .execute(&mut *tx)
                    .await?;
                for (id, record) in records {
                    sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, body, updated_at)
                        VALUES (?1, ?2, ?3, ?4)
                        ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body
                        "#,
                    )
                    .bind(collection.name())
                    .bind(id)
                    .bind(serde_json::to_string(record)?)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
            }
            summary.collections += 1;
            summary.documents += records.len();
        }

        tx.commit().await?;

        for (collection, _) in &plan {
            self.changes().publish(ChangeEvent::replaced(*collection));
        }

        info!(
            collections = summary.collections,
            documents = summary.documents,
            "Backup imported"
        );
        Ok(summary)
    }

    /// Exports everything into the snapshots table and prunes old ones.
    pub async fn take_snapshot(&self, retain: usize) -> DbResult<i64> {
        let snapshot = self.export_all().await?;
        self.snapshots().save(&snapshot, retain).await
    }
}

// =============================================================================
// Snapshot Repository
// =============================================================================

/// Metadata of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: SqlitePool,
}

impl SnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SnapshotRepository { pool }
    }

    /// Stores `snapshot`, then keeps only the newest `retain`.
    pub async fn save(&self, snapshot: &BackupSnapshot, retain: usize) -> DbResult<i64> {
        let id = sqlx::query("INSERT INTO snapshots (created_at, body) VALUES (?1, ?2)")
            .bind(Utc::now())
            .bind(serde_json::to_string(snapshot)?)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        let pruned = self.prune(retain).await?;
        debug!(id, pruned, "Snapshot saved");
        Ok(id)
    }

    /// Deletes all but the newest `retain` snapshots, oldest first.
    pub async fn prune(&self, retain: usize) -> DbResult<u64> {
        let removed = sqlx::query(
            r#"
            DELETE FROM snapshots
            WHERE id NOT IN (SELECT id FROM snapshots ORDER BY id DESC LIMIT ?1)
            "#,
        )
        .bind(retain as i64)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(removed)
    }

    /// Stored snapshots, newest first.
    pub async fn list(&self) -> DbResult<Vec<SnapshotInfo>> {
        let rows = sqlx::query("SELECT id, created_at FROM snapshots ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SnapshotInfo {
                    id: row.try_get("id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    pub async fn load(&self, id: i64) -> DbResult<Option<BackupSnapshot>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM snapshots WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match body {
            Some(body) => Some(serde_json::from_str(&body)?),
            None => None,
        })
    }

    pub async fn latest(&self) -> DbResult<Option<BackupSnapshot>> {
        match self.list().await?.first() {
            Some(info) => self.load(info.id).await,
            None => Ok(None),
        }
    }
}

// =============================================================================
// Snapshot Scheduler
// =============================================================================

/// Handle to stop a running [`SnapshotScheduler`].
#[derive(Debug, Clone)]
pub struct SnapshotSchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SnapshotSchedulerHandle {
    /// Asks the scheduler to stop after its current tick.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Background task taking periodic internal snapshots.
pub struct SnapshotScheduler {
    db: Database,
    every: Duration,
    retain: usize,
    shutdown_rx: mpsc::Receiver<()>,
}

impl SnapshotScheduler {
    pub fn new(db: Database, every: Duration, retain: usize) -> (Self, SnapshotSchedulerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let scheduler = SnapshotScheduler {
            db,
            every,
            retain,
            shutdown_rx,
        };
        (scheduler, SnapshotSchedulerHandle { shutdown_tx })
    }

    /// Runs until shut down. Spawn this as a background task.
    pub async fn run(mut self) {
        info!(every_secs = self.every.as_secs(), retain = self.retain, "Snapshot scheduler starting");

        let start = tokio::time::Instant::now() + self.every;
        let mut interval = tokio::time::interval_at(start, self.every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.db.take_snapshot(self.retain).await {
                        error!(?e, "Failed to take snapshot");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Snapshot scheduler shutting down");
                    break;
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use depot_core::settings::KEY_STORE_NAME;
    use depot_core::{Money, Supplier};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn supplier(id: &str) -> Supplier {
        Supplier {
            id: id.to_string(),
            name: format!("Supplier {id}"),
            tax_id: None,
            total_volume: Money::zero(),
            debt: Money::zero(),
        }
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = db().await;
        source.suppliers().add(&supplier("s-1")).await.unwrap();
        source.suppliers().add(&supplier("s-2")).await.unwrap();
        source
            .settings()
            .set(KEY_STORE_NAME, &json!("North"))
            .await
            .unwrap();

        let exported = source.export_all().await.unwrap();
        assert_eq!(exported["suppliers"].len(), 2);

        let target = db().await;
        target.suppliers().add(&supplier("stale")).await.unwrap();
        let summary = target.import_all(&exported).await.unwrap();

        assert_eq!(summary.collections, Collection::ALL.len());
        assert_eq!(target.export_all().await.unwrap(), exported);
        assert!(target.suppliers().get("stale").await.unwrap().is_none());
        assert_eq!(target.settings().load().await.unwrap().store_name, "North");
    }

    #[tokio::test]
    async fn test_import_leaves_unnamed_collections() {
        let db = db().await;
        db.suppliers().add(&supplier("s-1")).await.unwrap();

        let mut partial = BackupSnapshot::new();
        partial.insert("stores".to_string(), Vec::new());
        db.import_all(&partial).await.unwrap();

        assert_eq!(db.suppliers().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_import_rejects_bad_snapshot_without_writing() {
        let db = db().await;
        db.suppliers().add(&supplier("s-1")).await.unwrap();

        let mut bad = BackupSnapshot::new();
        bad.insert("suppliers".to_string(), vec![json!({ "name": "no id" })]);
        assert!(matches!(db.import_all(&bad).await, Err(DbError::Corrupt { .. })));

        let mut unknown = BackupSnapshot::new();
        unknown.insert("sales".to_string(), Vec::new());
        assert!(matches!(
            db.import_all(&unknown).await,
            Err(DbError::UnknownCollection(_))
        ));

        assert_eq!(db.suppliers().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_snapshots_keep_newest_five() {
        let db = db().await;

        let mut ids = Vec::new();
        for n in 0..7 {
            db.suppliers().add(&supplier(&format!("s-{n}"))).await.unwrap();
            ids.push(db.take_snapshot(DEFAULT_SNAPSHOT_RETAIN).await.unwrap());
        }

        let kept: Vec<i64> = db.snapshots().list().await.unwrap().iter().map(|s| s.id).collect();
        let expected: Vec<i64> = ids.iter().rev().take(5).copied().collect();
        assert_eq!(kept, expected);

        let latest = db.snapshots().latest().await.unwrap().unwrap();
        assert_eq!(latest["suppliers"].len(), 7);
        assert!(db.snapshots().load(ids[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let db = db().await;
        let (scheduler, handle) = SnapshotScheduler::new(db, Duration::from_secs(3600), 5);
        let task = tokio::spawn(scheduler.run());

        handle.shutdown().await;
        task.await.unwrap();
    }
}
