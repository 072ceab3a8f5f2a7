//! Settings and backups.

use std::collections::BTreeMap;

use depot_core::{AuditAction, Settings};
use depot_db::{BackupSnapshot, ImportSummary, SnapshotInfo};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::engine::Depot;
use crate::error::{OpsError, OpsResult};

impl Depot {
    pub async fn settings(&self) -> OpsResult<Settings> {
        Ok(self.db.settings().load().await?)
    }

    /// Writes each key of `changes`. Keys not named are left as they are.
    pub async fn update_settings(&self, changes: &BTreeMap<String, Value>) -> OpsResult<Settings> {
        let settings = self.db.settings();
        for (key, value) in changes {
            settings.set(key, value).await?;
        }

        info!(keys = ?changes.keys().collect::<Vec<_>>(), "Settings updated");
        self.log(AuditAction::Update, "settings", "settings", json!(changes))
            .await?;
        self.settings().await
    }

    pub async fn export_backup(&self) -> OpsResult<BackupSnapshot> {
        Ok(self.db.export_all().await?)
    }

    /// Replaces every collection named in `snapshot` after confirmation.
    ///
    /// The session is re-checked afterwards since the users may have changed.
    pub async fn restore_backup(&self, snapshot: &BackupSnapshot) -> OpsResult<ImportSummary> {
        let names: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        let confirmed = self
            .gate
            .confirm(
                "Restore backup",
                &format!("Replace {} with the backup contents?", names.join(", ")),
            )
            .await;
        if !confirmed {
            return Err(OpsError::cancelled("restore backup"));
        }

        let summary = self.db.import_all(snapshot).await?;
        self.restore_session().await?;

        info!(
            collections = summary.collections,
            documents = summary.documents,
            "Backup restored"
        );
        self.log(
            AuditAction::Update,
            "backup",
            "import",
            json!({
                "collections": names,
                "documents": summary.documents,
            }),
        )
        .await?;

        Ok(summary)
    }

    pub async fn snapshots(&self) -> OpsResult<Vec<SnapshotInfo>> {
        Ok(self.db.snapshots().list().await?)
    }

    /// Restores an internal snapshot. `Ok(None)` if it no longer exists.
    pub async fn restore_snapshot(&self, id: i64) -> OpsResult<Option<ImportSummary>> {
        let Some(snapshot) = self.db.snapshots().load(id).await? else {
            warn!(snapshot_id = id, "Snapshot not found");
            return Ok(None);
        };
        self.restore_backup(&snapshot).await.map(Some)
    }
}
