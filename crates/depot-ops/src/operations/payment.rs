//! Store and supplier payments.
//!
//! Payments are never deleted. Cancelling one keeps the record, stamps who
//! and when, and takes it out of every balance.

use chrono::{DateTime, Utc};
use depot_core::validation::validate_payment_amount;
use depot_core::{
    AuditAction, CoreError, DocumentKind, Money, PaymentStatus, StorePayment, SupplierPayment,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::cents;
use crate::engine::Depot;
use crate::error::OpsResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStorePayment {
    pub store_id: String,
    pub amount: Money,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupplierPayment {
    pub supplier_id: String,
    /// Payment on account when absent.
    #[serde(default)]
    pub invoice_id: Option<String>,
    pub amount: Money,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl Depot {
    // =========================================================================
    // Store Payments
    // =========================================================================

    /// Returns `Ok(None)` if the store does not exist.
    pub async fn record_store_payment(&self, new: NewStorePayment) -> OpsResult<Option<StorePayment>> {
        validate_payment_amount(new.amount)?;

        if self.db.stores().get(&new.store_id).await?.is_none() {
            return Ok(None);
        }

        let kind = DocumentKind::StorePayment;
        let approval_status = self.policy().await?.initial_status(kind);
        let payment = StorePayment {
            id: Uuid::new_v4().to_string(),
            store_id: new.store_id,
            amount: new.amount,
            date: new.date.unwrap_or_else(|| self.now()),
            method: new.method,
            reference: new.reference,
            status: PaymentStatus::Active,
            approval_status,
            print_count: 0,
            authorized_by: None,
            authorized_at: None,
            cancelled_by: None,
            cancelled_at: None,
            rejection_reason: None,
        };

        self.db.store_payments().add(&payment).await?;

        info!(store_id = %payment.store_id, amount = %payment.amount, "Store payment recorded");
        self.log(
            AuditAction::Create,
            kind.entity_name(),
            &payment.id,
            json!({
                "storeId": payment.store_id,
                "amount": cents(payment.amount),
                "approvalStatus": approval_status.as_str(),
            }),
        )
        .await?;

        Ok(Some(payment))
    }

    /// Cancels a store payment after an admin secret.
    pub async fn cancel_store_payment(&self, payment_id: &str) -> OpsResult<Option<StorePayment>> {
        let kind = DocumentKind::StorePayment;
        let Some(mut payment) = self.db.store_payments().get(payment_id).await? else {
            return Ok(None);
        };
        ensure_active(payment.status, kind, payment_id)?;

        self.authorize("cancel store payment", kind.entity_name(), payment_id)
            .await?;

        payment.status = PaymentStatus::Cancelled;
        payment.cancelled_by = Some(self.actor().user_name);
        payment.cancelled_at = Some(self.now());
        self.db.store_payments().put(&payment).await?;

        info!(payment_id = %payment_id, amount = %payment.amount, "Store payment cancelled");
        self.log(
            AuditAction::Void,
            kind.entity_name(),
            payment_id,
            json!({ "storeId": payment.store_id, "amount": cents(payment.amount) }),
        )
        .await?;

        Ok(Some(payment))
    }

    /// Bumps the receipt print counter. Returns the new count.
    pub async fn mark_store_payment_printed(&self, payment_id: &str) -> OpsResult<Option<u32>> {
        let Some(payment) = self
            .modify::<StorePayment, _>(payment_id, |p| p.print_count += 1)
            .await?
        else {
            return Ok(None);
        };

        self.log(
            AuditAction::Update,
            DocumentKind::StorePayment.entity_name(),
            payment_id,
            json!({ "printCount": payment.print_count }),
        )
        .await?;
        Ok(Some(payment.print_count))
    }

    // =========================================================================
    // Supplier Payments
    // =========================================================================

    /// Returns `Ok(None)` if the supplier, or the invoice when one is given,
    /// does not exist.
    pub async fn record_supplier_payment(
        &self,
        new: NewSupplierPayment,
    ) -> OpsResult<Option<SupplierPayment>> {
        validate_payment_amount(new.amount)?;

        if self.db.suppliers().get(&new.supplier_id).await?.is_none() {
            return Ok(None);
        }

        if let Some(invoice_id) = &new.invoice_id {
            let Some(invoice) = self.db.invoices().get(invoice_id).await? else {
                return Ok(None);
            };
            if invoice.supplier_id != new.supplier_id {
                return Err(ValidationError::InvalidFormat {
                    field: "invoiceId".to_string(),
                    reason: format!("invoice {} belongs to another supplier", invoice.invoice_number),
                }
                .into());
            }
        }

        let kind = DocumentKind::SupplierPayment;
        let approval_status = self.policy().await?.initial_status(kind);
        let payment = SupplierPayment {
            id: Uuid::new_v4().to_string(),
            supplier_id: new.supplier_id,
            invoice_id: new.invoice_id,
            amount: new.amount,
            date: new.date.unwrap_or_else(|| self.now()),
            method: new.method,
            reference: new.reference,
            status: PaymentStatus::Active,
            approval_status,
            authorized_by: None,
            authorized_at: None,
            cancelled_by: None,
            cancelled_at: None,
            rejection_reason: None,
        };

        self.db.supplier_payments().add(&payment).await?;

        info!(
            supplier_id = %payment.supplier_id,
            invoice_id = ?payment.invoice_id,
            amount = %payment.amount,
            "Supplier payment recorded"
        );
        self.log(
            AuditAction::Create,
            kind.entity_name(),
            &payment.id,
            json!({
                "supplierId": payment.supplier_id,
                "invoiceId": payment.invoice_id,
                "amount": cents(payment.amount),
                "approvalStatus": approval_status.as_str(),
            }),
        )
        .await?;

        Ok(Some(payment))
    }

    /// Cancels a supplier payment after an admin secret. The invoice it
    /// paid goes back to `partial` or `pending` on the next projection.
    pub async fn cancel_supplier_payment(
        &self,
        payment_id: &str,
    ) -> OpsResult<Option<SupplierPayment>> {
        let kind = DocumentKind::SupplierPayment;
        let Some(mut payment) = self.db.supplier_payments().get(payment_id).await? else {
            return Ok(None);
        };
        ensure_active(payment.status, kind, payment_id)?;

        self.authorize("cancel supplier payment", kind.entity_name(), payment_id)
            .await?;

        payment.status = PaymentStatus::Cancelled;
        payment.cancelled_by = Some(self.actor().user_name);
        payment.cancelled_at = Some(self.now());
        self.db.supplier_payments().put(&payment).await?;

        info!(payment_id = %payment_id, amount = %payment.amount, "Supplier payment cancelled");
        self.log(
            AuditAction::Void,
            kind.entity_name(),
            payment_id,
            json!({
                "supplierId": payment.supplier_id,
                "invoiceId": payment.invoice_id,
                "amount": cents(payment.amount),
            }),
        )
        .await?;

        Ok(Some(payment))
    }
}

fn ensure_active(status: PaymentStatus, kind: DocumentKind, id: &str) -> OpsResult<()> {
    if status == PaymentStatus::Cancelled {
        return Err(CoreError::DocumentCancelled {
            entity: kind.entity_name().to_string(),
            id: id.to_string(),
        }
        .into());
    }
    Ok(())
}
