//! # Audit Log
//!
//! Append-only. Every mutation writes one entry; refused dispatches and
//! failed authorizations write a `block` entry.

use chrono::Utc;
use depot_core::{AuditAction, AuditLogEntry, User};
use depot_db::Database;
use tracing::debug;
use uuid::Uuid;

use crate::error::OpsResult;

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub user_name: String,
}

impl Actor {
    /// Used when nobody is signed in.
    pub fn system() -> Self {
        Actor {
            user_id: "system".to_string(),
            user_name: "System".to_string(),
        }
    }

    pub fn from_user(user: &User) -> Self {
        Actor {
            user_id: user.id.clone(),
            user_name: user.display_name().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    db: Database,
}

impl AuditLog {
    pub fn new(db: Database) -> Self {
        AuditLog { db }
    }

    pub async fn record(
        &self,
        actor: &Actor,
        action: AuditAction,
        entity: &str,
        entity_id: &str,
        details: impl Into<String>,
    ) -> OpsResult<AuditLogEntry> {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
            action,
            entity: entity.to_string(),
            entity_id: entity_id.to_string(),
            details: details.into(),
            timestamp: Utc::now(),
        };

        debug!(
            action = action.as_str(),
            entity = %entry.entity,
            entity_id = %entry.entity_id,
            user = %entry.user_name,
            "Audit"
        );

        self.db.audit_logs().add(&entry).await?;
        Ok(entry)
    }

    /// All entries, oldest first.
    pub async fn entries(&self) -> OpsResult<Vec<AuditLogEntry>> {
        Ok(self.db.audit_logs().all().await?)
    }

    pub async fn for_entity(&self, entity: &str, entity_id: &str) -> OpsResult<Vec<AuditLogEntry>> {
        Ok(self
            .db
            .audit_logs()
            .filter(|e| e.entity == entity && e.entity_id == entity_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_db::DbConfig;

    #[tokio::test]
    async fn test_record_and_query() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let log = AuditLog::new(db);
        let actor = Actor::system();

        log.record(&actor, AuditAction::Create, "dispatch", "d-1", "created")
            .await
            .unwrap();
        log.record(&actor, AuditAction::Block, "dispatch", "st-1", "stock")
            .await
            .unwrap();
        log.record(&actor, AuditAction::Void, "dispatch", "d-1", "administrative")
            .await
            .unwrap();

        assert_eq!(log.entries().await.unwrap().len(), 3);

        let d1 = log.for_entity("dispatch", "d-1").await.unwrap();
        assert_eq!(d1.len(), 2);
        assert_eq!(d1[1].action, AuditAction::Void);
        assert_eq!(d1[0].user_name, "System");
    }
}
