//! # Settings Repository
//!
//! Flat key → JSON value map backing [`depot_core::Settings`].

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use depot_core::Settings;

use crate::changes::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::collection::Collection;
use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        SettingsRepository { pool, feed }
    }

    /// The raw map. Values that are not valid JSON are skipped.
    pub async fn get_map(&self) -> DbResult<BTreeMap<String, Value>> {
        let rows = sqlx::query("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        let mut map = BTreeMap::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let raw: String = row.try_get("value")?;
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    map.insert(key, value);
                }
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable setting"),
            }
        }
        Ok(map)
    }

    /// Typed settings, with defaults for anything missing.
    pub async fn load(&self) -> DbResult<Settings> {
        Ok(Settings::from_map(&self.get_map().await?))
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<Value>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match raw {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        })
    }

    pub async fn set(&self, key: &str, value: &Value) -> DbResult<()> {
        debug!(key = %key, "Saving setting");

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.feed
            .publish(ChangeEvent::document(Collection::Settings, ChangeKind::Updated, key));
        Ok(())
    }

    /// Writes every key of `settings`.
    pub async fn save(&self, settings: &Settings) -> DbResult<()> {
        for (key, value) in settings.to_map() {
            self.set(&key, &value).await?;
        }
        Ok(())
    }
}
