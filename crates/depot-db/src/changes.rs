//! # Change Feed
//!
//! Every write to the store is announced on a broadcast channel. Readers that
//! derive state (the live ledger in depot-ops) subscribe and recompute.
//!
//! ```text
//!   DocumentRepository::add ──┐
//!   DocumentRepository::update┤
//!   DocumentRepository::delete├──► ChangeFeed ──► broadcast ──► subscriber 1
//!   SettingsRepository::set   │                              └─► subscriber 2
//!   Database::import_all ─────┘
//! ```
//!
//! Delivery is best effort. A subscriber that falls behind receives
//! `RecvError::Lagged` and should recompute from scratch, which is always
//! correct because projections never depend on individual events.

use tokio::sync::broadcast;
use tracing::debug;

use crate::collection::Collection;

/// Default broadcast capacity.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// What happened to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
    /// The whole collection was cleared and reloaded (backup import).
    Replaced,
}

/// One store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    /// Document id, absent for whole-collection changes.
    pub id: Option<String>,
}

impl ChangeEvent {
    pub fn document(collection: Collection, kind: ChangeKind, id: impl Into<String>) -> Self {
        Self {
            collection,
            kind,
            id: Some(id.into()),
        }
    }

    pub fn replaced(collection: Collection) -> Self {
        Self {
            collection,
            kind: ChangeKind::Replaced,
            id: None,
        }
    }
}

/// Publisher side of the change feed. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Announces a change. Having no subscribers is fine.
    pub fn publish(&self, event: ChangeEvent) {
        debug!(
            collection = event.collection.name(),
            kind = ?event.kind,
            id = event.id.as_deref().unwrap_or("*"),
            "Store changed"
        );
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
