//! # Dispatch Operations
//!
//! ## Creation
//! The four pre-checks run against a fresh projection. A failure is
//! recorded as an audit `block` and returned as `Blocked`, with nothing
//! persisted. Otherwise lines sharing product and price are merged, the
//! dispatch gets the next `DSP-` number and a due date `paymentTermDays`
//! out, and it starts `pending` if approval is required.
//!
//! ## Cancellation
//! Both modes need an admin secret. A siniestro (loss or theft) also books
//! a `BAJA-SIN-<number>` write-off invoice on the local supplier for every
//! unit that had not come back in good condition.

use chrono::{DateTime, Duration, Utc};
use depot_core::checks::{aggregate_lines, check_dispatch};
use depot_core::ledger::mirror::siniestro_invoice;
use depot_core::validation::{validate_lines, validate_price, validate_quantity};
use depot_core::{
    AuditAction, Cancellation, CancellationMode, CoreError, DispatchBlock, DispatchItem,
    DispatchStatus, DocumentKind, ProductReturn, ReturnReason, StockDispatch,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use super::cents;
use crate::engine::Depot;
use crate::error::OpsResult;

pub const DISPATCH_NUMBER_PREFIX: &str = "DSP-";

/// A cart to dispatch to a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDispatch {
    pub store_id: String,
    pub items: Vec<DispatchItem>,

    /// Defaults to now.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Result of [`Depot::create_dispatch`].
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Created(StockDispatch),
    /// A pre-check refused the cart. Nothing was persisted.
    Blocked(DispatchBlock),
}

impl DispatchOutcome {
    pub fn created(&self) -> Option<&StockDispatch> {
        match self {
            DispatchOutcome::Created(dispatch) => Some(dispatch),
            DispatchOutcome::Blocked(_) => None,
        }
    }

    pub fn blocked(&self) -> Option<&DispatchBlock> {
        match self {
            DispatchOutcome::Blocked(block) => Some(block),
            DispatchOutcome::Created(_) => None,
        }
    }
}

/// `DSP-000001` after the highest existing number.
pub fn next_dispatch_number(dispatches: &[StockDispatch]) -> String {
    let last = dispatches
        .iter()
        .filter_map(|d| d.dispatch_number.strip_prefix(DISPATCH_NUMBER_PREFIX))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{DISPATCH_NUMBER_PREFIX}{:06}", last + 1)
}

impl Depot {
    /// Runs the pre-checks and, if they pass, creates the dispatch.
    ///
    /// Returns `Ok(None)` if the store does not exist.
    pub async fn create_dispatch(&self, new: NewDispatch) -> OpsResult<Option<DispatchOutcome>> {
        validate_lines(&new.items)?;
        for line in &new.items {
            validate_quantity(line.quantity)?;
            validate_price("unitSupplyPrice", line.unit_supply_price)?;
        }

        let (ledger, projections) = self.ledger().await?;
        let Some(store) = ledger.store(&new.store_id).cloned() else {
            debug!(store_id = %new.store_id, "Dispatch for unknown store");
            return Ok(None);
        };

        let now = self.now();
        if let Err(block) =
            check_dispatch(&ledger, &projections, &store, &new.items, now, self.default_limit)
        {
            info!(store_id = %store.id, reason = block.code(), "Dispatch blocked");
            self.log(
                AuditAction::Block,
                "dispatch",
                &store.id,
                json!({ "message": block.message(), "block": block }),
            )
            .await?;
            return Ok(Some(DispatchOutcome::Blocked(block)));
        }

        let timestamp = new.timestamp.unwrap_or(now);
        let approval_status = self.policy().await?.initial_status(DocumentKind::Dispatch);

        let mut dispatch = StockDispatch {
            id: Uuid::new_v4().to_string(),
            dispatch_number: next_dispatch_number(&ledger.dispatches),
            store_id: store.id.clone(),
            timestamp,
            due_date: Some(timestamp + Duration::days(store.config.payment_term_days)),
            items: aggregate_lines(&new.items),
            returns: Vec::new(),
            total_amount: None,
            status: DispatchStatus::Active,
            approval_status,
            print_count: 0,
            authorized_by: None,
            authorized_at: None,
            cancellation: None,
            rejection_reason: None,
        };
        dispatch.total_amount = Some(dispatch.lines_total());

        self.db.dispatches().add(&dispatch).await?;

        info!(
            number = %dispatch.dispatch_number,
            store = %store.name,
            total = %dispatch.effective_total(),
            approval = approval_status.as_str(),
            "Dispatch created"
        );
        self.log(
            AuditAction::Create,
            "dispatch",
            &dispatch.id,
            json!({
                "dispatchNumber": dispatch.dispatch_number,
                "storeId": dispatch.store_id,
                "totalAmount": cents(dispatch.effective_total()),
                "approvalStatus": approval_status.as_str(),
            }),
        )
        .await?;

        Ok(Some(DispatchOutcome::Created(dispatch)))
    }

    /// Records units coming back from the store.
    ///
    /// ## Errors
    /// - the dispatch is cancelled
    /// - the product is not on the dispatch
    /// - `quantity` exceeds what is still out
    pub async fn register_return(
        &self,
        dispatch_id: &str,
        product_id: &str,
        quantity: i64,
        reason: ReturnReason,
    ) -> OpsResult<Option<StockDispatch>> {
        validate_quantity(quantity)?;

        let Some(mut dispatch) = self.db.dispatches().get(dispatch_id).await? else {
            return Ok(None);
        };

        if dispatch.status == DispatchStatus::Cancelled {
            return Err(CoreError::DocumentCancelled {
                entity: "dispatch".to_string(),
                id: dispatch_id.to_string(),
            }
            .into());
        }

        if dispatch.dispatched_quantity(product_id) == 0 {
            return Err(CoreError::ProductNotInDispatch {
                dispatch_id: dispatch_id.to_string(),
                product_id: product_id.to_string(),
            }
            .into());
        }

        let outstanding = dispatch.outstanding_quantity(product_id);
        if quantity > outstanding {
            return Err(CoreError::ReturnExceedsOutstanding {
                product_id: product_id.to_string(),
                outstanding,
                requested: quantity,
            }
            .into());
        }

        dispatch.returns.push(ProductReturn {
            id: Uuid::new_v4().to_string(),
            dispatch_id: dispatch_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            reason,
            timestamp: self.now(),
        });
        dispatch.status = if dispatch.fully_returned() {
            DispatchStatus::Returned
        } else {
            DispatchStatus::PartialReturn
        };

        self.db.dispatches().put(&dispatch).await?;

        info!(
            number = %dispatch.dispatch_number,
            product_id = %product_id,
            quantity,
            reason = reason.as_str(),
            "Return registered"
        );
        self.log(
            AuditAction::Update,
            "dispatch",
            dispatch_id,
            json!({
                "return": { "productId": product_id, "quantity": quantity, "reason": reason.as_str() },
                "status": dispatch.status.as_str(),
            }),
        )
        .await?;

        Ok(Some(dispatch))
    }

    /// Cancels a dispatch after an admin secret.
    pub async fn cancel_dispatch(
        &self,
        dispatch_id: &str,
        mode: CancellationMode,
    ) -> OpsResult<Option<StockDispatch>> {
        let Some(mut dispatch) = self.db.dispatches().get(dispatch_id).await? else {
            return Ok(None);
        };

        if dispatch.status == DispatchStatus::Cancelled {
            return Err(CoreError::DocumentCancelled {
                entity: "dispatch".to_string(),
                id: dispatch_id.to_string(),
            }
            .into());
        }

        self.authorize(
            &format!("cancel dispatch {}", dispatch.dispatch_number),
            "dispatch",
            dispatch_id,
        )
        .await?;

        let now = self.now();

        if mode == CancellationMode::Siniestro {
            let products = self.db.products().all().await?;
            let write_off = siniestro_invoice(&Uuid::new_v4().to_string(), &dispatch, &products, now);

            if write_off.items.is_empty() {
                debug!(number = %dispatch.dispatch_number, "Nothing left out, no write-off");
            } else {
                self.db.invoices().add(&write_off).await?;
                self.log(
                    AuditAction::Create,
                    "invoice",
                    &write_off.id,
                    json!({
                        "invoiceNumber": write_off.invoice_number,
                        "dispatchId": dispatch_id,
                        "totalAmount": cents(write_off.total_amount),
                    }),
                )
                .await?;
            }
        }

        dispatch.status = DispatchStatus::Cancelled;
        dispatch.cancellation = Some(Cancellation {
            mode,
            by: self.actor().user_name,
            at: now,
        });
        self.db.dispatches().put(&dispatch).await?;

        info!(number = %dispatch.dispatch_number, mode = mode.as_str(), "Dispatch cancelled");
        self.log(
            AuditAction::Void,
            "dispatch",
            dispatch_id,
            json!({ "dispatchNumber": dispatch.dispatch_number, "mode": mode.as_str() }),
        )
        .await?;

        Ok(Some(dispatch))
    }

    /// Bumps the print counter. Returns the new count.
    pub async fn mark_dispatch_printed(&self, dispatch_id: &str) -> OpsResult<Option<u32>> {
        let Some(dispatch) = self
            .modify::<StockDispatch, _>(dispatch_id, |d| d.print_count += 1)
            .await?
        else {
            return Ok(None);
        };

        self.log(
            AuditAction::Update,
            "dispatch",
            dispatch_id,
            json!({ "printCount": dispatch.print_count }),
        )
        .await?;
        Ok(Some(dispatch.print_count))
    }
}
