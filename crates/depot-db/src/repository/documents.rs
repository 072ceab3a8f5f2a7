//! # Document Repository
//!
//! Generic keyed collection over the `documents` table.
//!
//! `add` fails on a duplicate id and `put` replaces the whole body. `update`
//! is a shallow merge of a JSON object. Missing ids give `Ok(None)` from
//! `update` and `get`, and `Ok(false)` from `delete`. `all` and `filter`
//! return rows in insertion order.
//!
//! Every successful write publishes a [`ChangeEvent`].

use std::marker::PhantomData;

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::changes::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::collection::Document;
use crate::error::{DbError, DbResult};

/// Repository for one collection of `T`.
#[derive(Debug, Clone)]
pub struct DocumentRepository<T: Document> {
    pool: SqlitePool,
    feed: ChangeFeed,
    _marker: PhantomData<fn() -> T>,
}

/// Shallow merge: top-level keys of `patch` replace those of `target`.
///
/// `null` values are written as `null`, they do not remove the key.
pub fn shallow_merge(target: &mut Value, patch: &Value) -> bool {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
            true
        }
        _ => false,
    }
}

impl<T: Document> DocumentRepository<T> {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        DocumentRepository {
            pool,
            feed,
            _marker: PhantomData,
        }
    }

    fn collection(&self) -> &'static str {
        T::COLLECTION.name()
    }

    fn decode(&self, id: &str, body: &str) -> DbResult<T> {
        serde_json::from_str(body).map_err(|e| DbError::Corrupt {
            collection: self.collection().to_string(),
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Inserts a new document.
    ///
    /// ## Errors
    /// [`DbError::UniqueViolation`] if the id is taken.
    pub async fn add(&self, doc: &T) -> DbResult<()> {
        let body = serde_json::to_string(doc)?;

        debug!(collection = self.collection(), id = %doc.id(), "Adding document");

        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(self.collection())
        .bind(doc.id())
        .bind(&body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) => {
                return Err(match DbError::from(e) {
                    DbError::UniqueViolation { .. } => {
                        DbError::duplicate(format!("{}.id", self.collection()), doc.id())
                    }
                    other => other,
                })
            }
        }

        self.feed
            .publish(ChangeEvent::document(T::COLLECTION, ChangeKind::Added, doc.id()));
        Ok(())
    }

    /// Inserts or fully replaces a document, keeping its position if it
    /// already existed.
    pub async fn put(&self, doc: &T) -> DbResult<()> {
        let body = serde_json::to_string(doc)?;

        let existed = sqlx::query(
            r#"
            UPDATE documents SET body = ?3, updated_at = ?4
            WHERE collection = ?1 AND id = ?2
            "#,
        )
        .bind(self.collection())
        .bind(doc.id())
        .bind(&body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;

        if existed {
            self.feed
                .publish(ChangeEvent::document(T::COLLECTION, ChangeKind::Updated, doc.id()));
            Ok(())
        } else {
            self.add(doc).await
        }
    }

    /// Merges `patch` into the stored body.
    ///
    /// ## Returns
    /// * `Ok(Some(doc))` - The merged document
    /// * `Ok(None)` - No document with this id
    ///
    /// ## Errors
    /// [`DbError::InvalidPatch`] when `patch` is not an object or the merged
    /// body no longer decodes as `T`. Nothing is written in that case.
    pub async fn update(&self, id: &str, patch: &Value) -> DbResult<Option<T>> {
        let Some(mut body) = self.get_raw(id).await? else {
            debug!(collection = self.collection(), id = %id, "Update of missing document ignored");
            return Ok(None);
        };

        if !shallow_merge(&mut body, patch) {
            return Err(DbError::InvalidPatch {
                collection: self.collection().to_string(),
                id: id.to_string(),
                reason: "patch must be a JSON object".to_string(),
            });
        }

        let merged: T = serde_json::from_value(body.clone()).map_err(|e| DbError::InvalidPatch {
            collection: self.collection().to_string(),
            id: id.to_string(),
            reason: e.to_string(),
        })?;

        sqlx::query(
            r#"
            UPDATE documents SET body = ?3, updated_at = ?4
            WHERE collection = ?1 AND id = ?2
            "#,
        )
        .bind(self.collection())
        .bind(id)
        .bind(serde_json::to_string(&body)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.feed
            .publish(ChangeEvent::document(T::COLLECTION, ChangeKind::Updated, id));
        Ok(Some(merged))
    }

    /// Deletes a document. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let deleted = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(self.collection())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;

        if deleted {
            self.feed
                .publish(ChangeEvent::document(T::COLLECTION, ChangeKind::Deleted, id));
        }
        Ok(deleted)
    }

    /// Raw JSON body, without decoding into `T`.
    pub async fn get_raw(&self, id: &str) -> DbResult<Option<Value>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(self.collection())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let body: String = row.try_get("body")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<T>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(self.collection())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let body: String = row.try_get("body")?;
                Ok(Some(self.decode(id, &body)?))
            }
            None => Ok(None),
        }
    }

    /// Every document, oldest first.
    ///
    /// Bodies that no longer decode are skipped with a warning so one bad
    /// record cannot take the whole ledger down.
    pub async fn all(&self) -> DbResult<Vec<T>> {
        let rows = sqlx::query(
            "SELECT id, body FROM documents WHERE collection = ?1 ORDER BY rowid ASC",
        )
        .bind(self.collection())
        .fetch_all(&self.pool)
        .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let body: String = row.try_get("body")?;
            match self.decode(&id, &body) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(error = %e, "Skipping undecodable document"),
            }
        }
        Ok(docs)
    }

    /// Documents matching `predicate`, oldest first.
    pub async fn filter<F>(&self, predicate: F) -> DbResult<Vec<T>>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.all().await?.into_iter().filter(|d| predicate(d)).collect())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
            .bind(self.collection())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Subscribes to the store's change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::pool::{Database, DbConfig};
    use depot_core::{Money, Product, Store, StoreConfig};
    use serde_json::json;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            purchase_cost: Money::from_cents(100),
            purchase_tax: Money::zero(),
            purchase_freight: Money::zero(),
            supply_price: Money::from_cents(150),
            retail_price: Money::from_cents(200),
            stock: 0,
            min_stock: 0,
            max_stock: 0,
            supplier_id: None,
        }
    }

    #[tokio::test]
    async fn test_add_get_all_in_order() {
        let db = db().await;
        let repo = db.products();

        repo.add(&product("p-2")).await.unwrap();
        repo.add(&product("p-1")).await.unwrap();

        assert_eq!(repo.get("p-1").await.unwrap().map(|p| p.id), Some("p-1".to_string()));
        assert!(repo.get("missing").await.unwrap().is_none());

        let ids: Vec<String> = repo.all().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p-2", "p-1"]);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let db = db().await;
        let repo = db.products();

        repo.add(&product("p-1")).await.unwrap();
        let err = repo.add(&product("p-1")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_is_shallow_merge() {
        let db = db().await;
        let repo = db.stores();
        let store = Store {
            id: "st-1".to_string(),
            name: "Corner".to_string(),
            color: Some("#112233".to_string()),
            config: StoreConfig {
                allows_credit: true,
                max_debt_limit: Some(Money::from_cents(50_000)),
                payment_term_days: 15,
            },
            total_debt: Money::zero(),
            active: true,
        };
        repo.add(&store).await.unwrap();

        let updated = repo
            .update("st-1", &json!({ "config": { "paymentTermDays": 30 } }))
            .await
            .unwrap()
            .unwrap();

        // `config` is replaced as a whole, not merged.
        assert_eq!(updated.config.payment_term_days, 30);
        assert_eq!(updated.config.max_debt_limit, None);
        assert_eq!(updated.name, "Corner");
        assert_eq!(repo.get("st-1").await.unwrap().unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_is_noop() {
        let db = db().await;
        let result = db.products().update("nope", &json!({ "name": "x" })).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_invalid_patch_writes_nothing() {
        let db = db().await;
        let repo = db.products();
        repo.add(&product("p-1")).await.unwrap();

        let err = repo.update("p-1", &json!("name")).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidPatch { .. }));

        let err = repo.update("p-1", &json!({ "name": 42 })).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidPatch { .. }));

        assert_eq!(repo.get("p-1").await.unwrap().unwrap().name, "Product p-1");
    }

    #[tokio::test]
    async fn test_delete_and_filter() {
        let db = db().await;
        let repo = db.products();
        repo.add(&product("p-1")).await.unwrap();
        repo.add(&product("p-2")).await.unwrap();

        assert!(repo.delete("p-1").await.unwrap());
        assert!(!repo.delete("p-1").await.unwrap());

        let left = repo.filter(|p| p.id.ends_with('2')).await.unwrap();
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn test_writes_publish_changes() {
        let db = db().await;
        let repo = db.products();
        let mut rx = repo.subscribe();

        repo.add(&product("p-1")).await.unwrap();
        repo.update("p-1", &json!({ "name": "Renamed" })).await.unwrap();
        repo.delete("p-1").await.unwrap();

        let kinds: Vec<ChangeKind> = vec![
            rx.recv().await.unwrap().kind,
            rx.recv().await.unwrap().kind,
            rx.recv().await.unwrap().kind,
        ];
        assert_eq!(kinds, vec![ChangeKind::Added, ChangeKind::Updated, ChangeKind::Deleted]);
    }

    #[tokio::test]
    async fn test_corrupt_rows_skipped_by_all() {
        let db = db().await;
        let repo = db.products();
        repo.add(&product("p-1")).await.unwrap();

        sqlx::query("INSERT INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(Collection::Products.name())
            .bind("bad")
            .bind("{\"id\": \"bad\"}")
            .bind(Utc::now())
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(repo.all().await.unwrap().len(), 1);
        assert!(matches!(repo.get("bad").await, Err(DbError::Corrupt { .. })));
    }
}
