//! # Mutation Operations
//!
//! Every write to the ledger collections goes through one of these.
//!
//! | Module         | Operations                                                  |
//! |----------------|-------------------------------------------------------------|
//! | [`dispatch`]   | create (pre-checks), return, cancel, mark printed           |
//! | [`invoice`]    | create                                                      |
//! | [`payment`]    | record / cancel store and supplier payments, mark printed   |
//! | [`adjustment`] | manual stock gain or loss with its mirror invoice           |
//! | [`approval`]   | approve / reject pending documents                          |
//! | [`catalog`]    | products, suppliers, stores with delete guards              |
//! | [`admin`]      | settings, backup export and restore                         |
//!
//! Conventions:
//! - an id that does not exist is `Ok(None)` and writes nothing
//! - each write is independently valid; a sequence stops at the first error
//! - the audit entry is written after the mutation it describes

pub mod adjustment;
pub mod admin;
pub mod approval;
pub mod catalog;
pub mod dispatch;
pub mod invoice;
pub mod payment;

use depot_core::Money;
use depot_db::Document;
use serde_json::Value;

use crate::engine::Depot;
use crate::error::OpsResult;

impl Depot {
    /// Writes the audit entry for a mutation made by the current actor.
    pub(crate) async fn log(
        &self,
        action: depot_core::AuditAction,
        entity: &str,
        entity_id: &str,
        details: Value,
    ) -> OpsResult<()> {
        self.audit
            .record(&self.actor(), action, entity, entity_id, details.to_string())
            .await?;
        Ok(())
    }

    /// Loads `id`, applies `change`, stores the whole document back.
    pub(crate) async fn modify<T, F>(&self, id: &str, change: F) -> OpsResult<Option<T>>
    where
        T: Document + Clone,
        F: FnOnce(&mut T),
    {
        let repo = self.db.documents::<T>();
        let Some(mut doc) = repo.get(id).await? else {
            return Ok(None);
        };
        change(&mut doc);
        repo.put(&doc).await?;
        Ok(Some(doc))
    }
}

/// Money as a JSON number of cents for audit details.
pub(crate) fn cents(amount: Money) -> Value {
    Value::from(amount.cents())
}
