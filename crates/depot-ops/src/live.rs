//! # Live Ledger
//!
//! Keeps the projections current for the UI.
//!
//! A background task listens on the change feed. Events for ledger
//! collections trigger a fresh projection, published through a `watch`
//! channel. Queued events are drained first, so a burst of writes costs one
//! recompute. Audit and user changes are ignored.
//!
//! The task ends when every [`LiveLedger`] is dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use depot_core::{LedgerSnapshot, Projections};
use depot_db::{ChangeEvent, Database};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::error::OpsResult;

/// One consistent computation over the whole ledger.
#[derive(Debug, Clone)]
pub struct LedgerView {
    /// Records with their derived fields filled in.
    pub ledger: LedgerSnapshot,
    pub projections: Projections,
    pub computed_at: DateTime<Utc>,
}

impl LedgerView {
    async fn compute(db: &Database) -> OpsResult<Self> {
        let raw = db.load_ledger().await?;
        let projections = raw.project();
        Ok(LedgerView {
            ledger: raw.hydrate(&projections),
            projections,
            computed_at: Utc::now(),
        })
    }
}

/// Subscriber side of the live projections.
#[derive(Debug, Clone)]
pub struct LiveLedger {
    rx: watch::Receiver<Arc<LedgerView>>,
}

impl LiveLedger {
    /// Computes the first view and starts the recompute task.
    pub async fn spawn(db: Database) -> OpsResult<Self> {
        // Subscribe first so nothing written during the first load is missed.
        let changes = db.changes().subscribe();
        let initial = LedgerView::compute(&db).await?;
        let (tx, rx) = watch::channel(Arc::new(initial));

        tokio::spawn(run(db, changes, tx));
        info!("Live ledger started");

        Ok(LiveLedger { rx })
    }

    /// The latest view.
    pub fn current(&self) -> Arc<LedgerView> {
        self.rx.borrow().clone()
    }

    /// Waits for the next recomputation. `None` once the task has stopped.
    pub async fn changed(&mut self) -> Option<Arc<LedgerView>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

fn is_relevant(event: &ChangeEvent) -> bool {
    event.collection.affects_ledger()
}

async fn run(
    db: Database,
    mut changes: broadcast::Receiver<ChangeEvent>,
    tx: watch::Sender<Arc<LedgerView>>,
) {
    loop {
        let trigger = tokio::select! {
            event = changes.recv() => event,
            _ = tx.closed() => {
                debug!("Live ledger has no subscribers, stopping");
                break;
            }
        };

        match trigger {
            Ok(event) if !is_relevant(&event) => continue,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Live ledger lagged, recomputing");
            }
            Err(RecvError::Closed) => break,
        }

        // One recomputation covers everything already queued.
        loop {
            match changes.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        match LedgerView::compute(&db).await {
            Ok(view) => {
                if tx.send(Arc::new(view)).is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "Failed to recompute ledger"),
        }
    }
}
