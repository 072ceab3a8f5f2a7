//! # Approval Inbox
//!
//! ```text
//!   pending ──approve──► approved   stamps authorizedBy / authorizedAt
//!      │
//!      └────reject────► rejected   records the reason; dispatches and
//!                                  payments are also forced to cancelled
//! ```
//!
//! Anything else is [`CoreError::InvalidTransition`] and changes nothing.
//! A rejection without a reason asks for one through the gate.
//!
//! [`CoreError::InvalidTransition`]: depot_core::CoreError::InvalidTransition

use chrono::{DateTime, Utc};
use depot_core::{
    ApprovalAction, ApprovalStatus, AuditAction, DispatchStatus, DocumentKind, Invoice,
    PaymentStatus, StockDispatch, StorePayment, SupplierPayment,
};
use depot_db::Document;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::engine::Depot;
use crate::error::{OpsError, OpsResult};

/// A document that goes through the approval workflow.
pub trait Approvable: Document + Clone {
    const KIND: DocumentKind;

    fn approval_status(&self) -> ApprovalStatus;
    fn set_approval_status(&mut self, status: ApprovalStatus);
    fn stamp_authorization(&mut self, by: String, at: DateTime<Utc>);
    fn set_rejection_reason(&mut self, reason: String);

    /// Lifecycle cancellation forced by a rejection. No-op for kinds
    /// without a lifecycle status.
    fn cancel_on_rejection(&mut self, _by: &str, _at: DateTime<Utc>) {}
}

impl Approvable for StockDispatch {
    const KIND: DocumentKind = DocumentKind::Dispatch;

    fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }
    fn set_approval_status(&mut self, status: ApprovalStatus) {
        self.approval_status = status;
    }
    fn stamp_authorization(&mut self, by: String, at: DateTime<Utc>) {
        self.authorized_by = Some(by);
        self.authorized_at = Some(at);
    }
    fn set_rejection_reason(&mut self, reason: String) {
        self.rejection_reason = Some(reason);
    }
    fn cancel_on_rejection(&mut self, _by: &str, _at: DateTime<Utc>) {
        self.status = DispatchStatus::Cancelled;
    }
}

impl Approvable for Invoice {
    const KIND: DocumentKind = DocumentKind::Invoice;

    fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }
    fn set_approval_status(&mut self, status: ApprovalStatus) {
        self.approval_status = status;
    }
    fn stamp_authorization(&mut self, by: String, at: DateTime<Utc>) {
        self.authorized_by = Some(by);
        self.authorized_at = Some(at);
    }
    fn set_rejection_reason(&mut self, reason: String) {
        self.rejection_reason = Some(reason);
    }
}

impl Approvable for StorePayment {
    const KIND: DocumentKind = DocumentKind::StorePayment;

    fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }
    fn set_approval_status(&mut self, status: ApprovalStatus) {
        self.approval_status = status;
    }
    fn stamp_authorization(&mut self, by: String, at: DateTime<Utc>) {
        self.authorized_by = Some(by);
        self.authorized_at = Some(at);
    }
    fn set_rejection_reason(&mut self, reason: String) {
        self.rejection_reason = Some(reason);
    }
    fn cancel_on_rejection(&mut self, by: &str, at: DateTime<Utc>) {
        self.status = PaymentStatus::Cancelled;
        self.cancelled_by = Some(by.to_string());
        self.cancelled_at = Some(at);
    }
}

impl Approvable for SupplierPayment {
    const KIND: DocumentKind = DocumentKind::SupplierPayment;

    fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }
    fn set_approval_status(&mut self, status: ApprovalStatus) {
        self.approval_status = status;
    }
    fn stamp_authorization(&mut self, by: String, at: DateTime<Utc>) {
        self.authorized_by = Some(by);
        self.authorized_at = Some(at);
    }
    fn set_rejection_reason(&mut self, reason: String) {
        self.rejection_reason = Some(reason);
    }
    fn cancel_on_rejection(&mut self, by: &str, at: DateTime<Utc>) {
        self.status = PaymentStatus::Cancelled;
        self.cancelled_by = Some(by.to_string());
        self.cancelled_at = Some(at);
    }
}

/// Everything waiting for a decision.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApprovals {
    pub dispatches: Vec<StockDispatch>,
    pub invoices: Vec<Invoice>,
    pub store_payments: Vec<StorePayment>,
    pub supplier_payments: Vec<SupplierPayment>,
}

impl PendingApprovals {
    pub fn len(&self) -> usize {
        self.dispatches.len()
            + self.invoices.len()
            + self.store_payments.len()
            + self.supplier_payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Depot {
    pub async fn pending_approvals(&self) -> OpsResult<PendingApprovals> {
        Ok(PendingApprovals {
            dispatches: self.db.dispatches().filter(|d| d.approval_status.is_pending()).await?,
            invoices: self.db.invoices().filter(|i| i.approval_status.is_pending()).await?,
            store_payments: self
                .db
                .store_payments()
                .filter(|p| p.approval_status.is_pending())
                .await?,
            supplier_payments: self
                .db
                .supplier_payments()
                .filter(|p| p.approval_status.is_pending())
                .await?,
        })
    }

    /// Approves a pending document. Returns the new state, or `Ok(None)` if
    /// there is no such document.
    pub async fn approve(&self, kind: DocumentKind, id: &str) -> OpsResult<Option<ApprovalStatus>> {
        self.decide(kind, id, ApprovalAction::Approve, None).await
    }

    /// Rejects a pending document. Without a `reason`, one is asked for
    /// through the gate; dismissing that prompt cancels the rejection.
    pub async fn reject(
        &self,
        kind: DocumentKind,
        id: &str,
        reason: Option<String>,
    ) -> OpsResult<Option<ApprovalStatus>> {
        self.decide(kind, id, ApprovalAction::Reject, reason).await
    }

    async fn decide(
        &self,
        kind: DocumentKind,
        id: &str,
        action: ApprovalAction,
        reason: Option<String>,
    ) -> OpsResult<Option<ApprovalStatus>> {
        let status = match kind {
            DocumentKind::Dispatch => self
                .transition::<StockDispatch>(id, action, reason)
                .await?
                .map(|d| d.approval_status),
            DocumentKind::Invoice => self
                .transition::<Invoice>(id, action, reason)
                .await?
                .map(|i| i.approval_status),
            DocumentKind::StorePayment => self
                .transition::<StorePayment>(id, action, reason)
                .await?
                .map(|p| p.approval_status),
            DocumentKind::SupplierPayment => self
                .transition::<SupplierPayment>(id, action, reason)
                .await?
                .map(|p| p.approval_status),
        };
        Ok(status)
    }

    /// Typed approval transition on one document.
    pub async fn transition<T: Approvable>(
        &self,
        id: &str,
        action: ApprovalAction,
        reason: Option<String>,
    ) -> OpsResult<Option<T>> {
        let repo = self.db.documents::<T>();
        let Some(mut doc) = repo.get(id).await? else {
            return Ok(None);
        };

        let next = doc.approval_status().transition(action, T::KIND, id)?;
        let entity = T::KIND.entity_name();
        let actor = self.actor();
        let now = self.now();

        let details = match action {
            ApprovalAction::Approve => {
                doc.set_approval_status(next);
                doc.stamp_authorization(actor.user_name.clone(), now);
                json!({ "approvalStatus": next.as_str(), "authorizedBy": actor.user_name })
            }
            ApprovalAction::Reject => {
                let reason = match reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()) {
                    Some(reason) => reason,
                    None => self
                        .gate
                        .text(&format!("Reject {entity}"), "Reason for rejection")
                        .await
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .ok_or_else(|| OpsError::cancelled(format!("reject {entity}")))?,
                };
                doc.set_approval_status(next);
                if T::KIND.cancels_on_rejection() {
                    doc.cancel_on_rejection(&actor.user_name, now);
                }
                doc.set_rejection_reason(reason.clone());
                json!({ "approvalStatus": next.as_str(), "reason": reason })
            }
        };

        repo.put(&doc).await?;

        info!(entity, id = %id, action = action.as_str(), "Approval decision");
        self.log(AuditAction::Update, entity, id, details).await?;

        Ok(Some(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::depot;
    use crate::gate::scripted::Answer;
    use crate::operations::dispatch::NewDispatch;
    use crate::operations::payment::{NewStorePayment, NewSupplierPayment};
    use depot_core::ledger::fixtures;
    use depot_core::settings::{
        KEY_REQUIRE_DISPATCH_APPROVAL, KEY_REQUIRE_INVOICE_APPROVAL, KEY_REQUIRE_PAYMENT_APPROVAL,
    };
    use depot_core::{CoreError, Money};

    async fn require_everything(depot: &Depot) {
        for key in [
            KEY_REQUIRE_DISPATCH_APPROVAL,
            KEY_REQUIRE_INVOICE_APPROVAL,
            KEY_REQUIRE_PAYMENT_APPROVAL,
        ] {
            depot.db().settings().set(key, &json!(true)).await.unwrap();
        }
    }

    async fn pending_dispatch(depot: &Depot, quantity: i64) -> StockDispatch {
        depot
            .create_dispatch(NewDispatch {
                store_id: "st-1".to_string(),
                items: vec![fixtures::dispatch_line("p-x", quantity, 1_000)],
                timestamp: None,
            })
            .await
            .unwrap()
            .unwrap()
            .created()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_approve_makes_dispatch_count() {
        let (depot, _) = depot(vec![]).await;
        require_everything(&depot).await;
        let dispatch = pending_dispatch(&depot, 4).await;

        assert_eq!(depot.pending_approvals().await.unwrap().len(), 1);

        let status = depot.approve(DocumentKind::Dispatch, &dispatch.id).await.unwrap();
        assert_eq!(status, Some(ApprovalStatus::Approved));

        let stored = depot.db().dispatches().get(&dispatch.id).await.unwrap().unwrap();
        assert_eq!(stored.authorized_by.as_deref(), Some("System"));
        assert!(stored.authorized_at.is_some());

        let (_, projections) = depot.ledger().await.unwrap();
        assert_eq!(projections.stock_of("p-x"), 6);
        assert_eq!(projections.store_debt("st-1"), Money::from_cents(4_000));
        assert!(depot.pending_approvals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_dispatch_matches_cancelled() {
        let (depot, _) = depot(vec![]).await;
        require_everything(&depot).await;
        let dispatch = pending_dispatch(&depot, 4).await;

        let status = depot
            .reject(DocumentKind::Dispatch, &dispatch.id, Some("wrong store".to_string()))
            .await
            .unwrap();
        assert_eq!(status, Some(ApprovalStatus::Rejected));

        let stored = depot.db().dispatches().get(&dispatch.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DispatchStatus::Cancelled);
        assert_eq!(stored.rejection_reason.as_deref(), Some("wrong store"));

        let (_, projections) = depot.ledger().await.unwrap();
        assert_eq!(projections.stock_of("p-x"), 10);
        assert_eq!(projections.store_debt("st-1"), Money::zero());
        assert_eq!(projections.profit.gross_profit, Money::zero());
    }

    #[tokio::test]
    async fn test_reject_prompts_for_reason() {
        let (depot, seen) = depot(vec![Answer::Text("duplicate"), Answer::Dismiss]).await;
        require_everything(&depot).await;

        let first = depot
            .record_store_payment(NewStorePayment {
                store_id: "st-1".to_string(),
                amount: Money::from_cents(500),
                date: None,
                method: None,
                reference: None,
            })
            .await
            .unwrap()
            .unwrap();
        let second = depot
            .record_supplier_payment(NewSupplierPayment {
                supplier_id: "s-1".to_string(),
                invoice_id: Some("i-1".to_string()),
                amount: Money::from_cents(1_000),
                date: None,
                method: None,
                reference: None,
            })
            .await
            .unwrap()
            .unwrap();

        depot.reject(DocumentKind::StorePayment, &first.id, None).await.unwrap();
        let rejected = depot.db().store_payments().get(&first.id).await.unwrap().unwrap();
        assert_eq!(rejected.status, PaymentStatus::Cancelled);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("duplicate"));
        assert_eq!(seen.lock().unwrap().as_slice(), ["Reject store_payment"]);

        let dismissed = depot
            .reject(DocumentKind::SupplierPayment, &second.id, None)
            .await
            .unwrap_err();
        assert!(dismissed.is_cancelled());
        let untouched = depot.db().supplier_payments().get(&second.id).await.unwrap().unwrap();
        assert_eq!(untouched.approval_status, ApprovalStatus::Pending);
        assert_eq!(untouched.status, PaymentStatus::Active);
    }

    #[tokio::test]
    async fn test_rejected_invoice_keeps_stock_and_debt() {
        let (depot, _) = depot(vec![]).await;
        let mut invoice = fixtures::invoice("i-2", "s-1", "F-2", vec![fixtures::invoice_line("p-x", 5, 100)]);
        invoice.approval_status = ApprovalStatus::Pending;
        depot.db().invoices().add(&invoice).await.unwrap();

        depot
            .reject(DocumentKind::Invoice, "i-2", Some("not ordered".to_string()))
            .await
            .unwrap();

        let (_, projections) = depot.ledger().await.unwrap();
        assert_eq!(projections.supplier_debt("s-1"), Money::from_cents(1_500));
        assert_eq!(projections.stock_of("p-x"), 15);
    }

    #[tokio::test]
    async fn test_only_pending_can_move() {
        let (depot, _) = depot(vec![]).await;

        let err = depot.approve(DocumentKind::Invoice, "i-1").await.unwrap_err();
        assert!(matches!(err, OpsError::Core(CoreError::InvalidTransition { .. })));

        let err = depot
            .reject(DocumentKind::Invoice, "i-1", Some("late".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::Core(CoreError::InvalidTransition { .. })));

        assert_eq!(depot.approve(DocumentKind::Dispatch, "missing").await.unwrap(), None);
        assert!(depot.audit().for_entity("invoice", "i-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decision_is_audited() {
        let (depot, _) = depot(vec![]).await;
        require_everything(&depot).await;
        let dispatch = pending_dispatch(&depot, 1).await;

        depot.approve(DocumentKind::Dispatch, &dispatch.id).await.unwrap();

        let audit = depot.audit().for_entity("dispatch", &dispatch.id).await.unwrap();
        let last = audit.last().unwrap();
        assert_eq!(last.action, AuditAction::Update);
        assert!(last.details.contains("\"approvalStatus\":\"approved\""));
    }
}
