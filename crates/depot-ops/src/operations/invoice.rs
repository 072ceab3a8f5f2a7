//! Supplier invoices.
//!
//! Line totals are always recomputed from the unit parts; whatever the
//! caller put in `totalItemCost` is ignored.

use chrono::{DateTime, Utc};
use depot_core::validation::{validate_lines, validate_name, validate_price, validate_quantity};
use depot_core::{
    AuditAction, DocumentKind, Invoice, InvoiceItem, InvoiceStatus, Money, ValidationError,
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
pub struct NewInvoice {
    pub supplier_id: String,
    pub invoice_number: String,

    /// Defaults to now.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    pub items: Vec<InvoiceItem>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl Depot {
    /// Records a supplier invoice.
    ///
    /// Returns `Ok(None)` if the supplier does not exist.
    ///
    /// ## Errors
    /// [`ValidationError::Duplicate`] if the supplier already has an invoice
    /// with this number.
    pub async fn create_invoice(&self, new: NewInvoice) -> OpsResult<Option<Invoice>> {
        let number = new.invoice_number.trim().to_string();
        validate_name("invoiceNumber", &number)?;
        validate_lines(&new.items)?;
        for line in &new.items {
            validate_quantity(line.quantity)?;
            validate_price("unitCost", line.unit_cost)?;
            validate_price("unitTax", line.unit_tax)?;
            validate_price("unitFreight", line.unit_freight)?;
        }

        if self.db.suppliers().get(&new.supplier_id).await?.is_none() {
            return Ok(None);
        }

        let taken = self
            .db
            .invoices()
            .filter(|i| i.supplier_id == new.supplier_id && i.invoice_number == number)
            .await?;
        if !taken.is_empty() {
            return Err(ValidationError::Duplicate {
                field: "invoiceNumber".to_string(),
                value: number,
            }
            .into());
        }

        let items: Vec<InvoiceItem> = new
            .items
            .iter()
            .map(|l| InvoiceItem::new(&l.product_id, l.quantity, l.unit_cost, l.unit_tax, l.unit_freight))
            .collect();
        let total_amount: Money = items.iter().map(InvoiceItem::line_cost).sum();
        let approval_status = self.policy().await?.initial_status(DocumentKind::Invoice);

        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            supplier_id: new.supplier_id,
            invoice_number: number,
            date: new.date.unwrap_or_else(|| self.now()),
            due_date: new.due_date,
            items,
            total_amount,
            amount_paid: Money::zero(),
            status: InvoiceStatus::Pending,
            approval_status,
            notes: new.notes,
            authorized_by: None,
            authorized_at: None,
            rejection_reason: None,
            adjustment_id: None,
        };

        self.db.invoices().add(&invoice).await?;

        info!(
            number = %invoice.invoice_number,
            supplier_id = %invoice.supplier_id,
            total = %invoice.total_amount,
            approval = approval_status.as_str(),
            "Invoice created"
        );
        self.log(
            AuditAction::Create,
            "invoice",
            &invoice.id,
            json!({
                "invoiceNumber": invoice.invoice_number,
                "supplierId": invoice.supplier_id,
                "totalAmount": cents(invoice.total_amount),
                "approvalStatus": approval_status.as_str(),
            }),
        )
        .await?;

        Ok(Some(invoice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::depot;
    use crate::error::OpsError;
    use depot_core::settings::KEY_REQUIRE_INVOICE_APPROVAL;
    use depot_core::{ApprovalStatus, CoreError};

    fn new_invoice(number: &str, items: Vec<InvoiceItem>) -> NewInvoice {
        NewInvoice {
            supplier_id: "s-1".to_string(),
            invoice_number: number.to_string(),
            date: None,
            due_date: None,
            items,
            notes: None,
        }
    }

    fn line(quantity: i64, cost: i64, tax: i64, freight: i64) -> InvoiceItem {
        InvoiceItem {
            product_id: "p-x".to_string(),
            quantity,
            unit_cost: Money::from_cents(cost),
            unit_tax: Money::from_cents(tax),
            unit_freight: Money::from_cents(freight),
            total_item_cost: Money::from_cents(1),
        }
    }

    #[tokio::test]
    async fn test_totals_recomputed_and_stock_added() {
        let (depot, _) = depot(vec![]).await;

        let invoice = depot
            .create_invoice(new_invoice(" F-2 ", vec![line(4, 100, 20, 5), line(1, 50, 0, 0)]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(invoice.invoice_number, "F-2");
        assert_eq!(invoice.items[0].total_item_cost, Money::from_cents(500));
        assert_eq!(invoice.total_amount, Money::from_cents(550));
        assert_eq!(invoice.approval_status, ApprovalStatus::Approved);

        let (_, projections) = depot.ledger().await.unwrap();
        assert_eq!(projections.stock_of("p-x"), 15);
        assert_eq!(projections.supplier_debt("s-1"), Money::from_cents(1_550));
    }

    #[tokio::test]
    async fn test_duplicate_number_per_supplier() {
        let (depot, _) = depot(vec![]).await;

        let err = depot
            .create_invoice(new_invoice("F-1", vec![line(1, 100, 0, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OpsError::Core(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));

        let mut other = new_invoice("F-1", vec![line(1, 100, 0, 0)]);
        other.supplier_id = depot_core::LOCAL_SUPPLIER_ID.to_string();
        assert!(depot.create_invoice(other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_supplier_and_bad_lines() {
        let (depot, _) = depot(vec![]).await;

        let mut orphan = new_invoice("F-9", vec![line(1, 100, 0, 0)]);
        orphan.supplier_id = "nobody".to_string();
        assert!(depot.create_invoice(orphan).await.unwrap().is_none());

        assert!(depot.create_invoice(new_invoice("F-9", vec![])).await.is_err());
        assert!(depot
            .create_invoice(new_invoice("F-9", vec![line(1, -100, 0, 0)]))
            .await
            .is_err());
        assert!(depot.create_invoice(new_invoice("  ", vec![line(1, 100, 0, 0)])).await.is_err());
    }

    #[tokio::test]
    async fn test_pending_invoice_stocks_but_owes_nothing() {
        let (depot, _) = depot(vec![]).await;
        depot
            .db()
            .settings()
            .set(KEY_REQUIRE_INVOICE_APPROVAL, &json!(true))
            .await
            .unwrap();

        let invoice = depot
            .create_invoice(new_invoice("F-2", vec![line(5, 100, 0, 0)]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invoice.approval_status, ApprovalStatus::Pending);

        // Stock counts invoice lines whatever their approval state.
        let (_, projections) = depot.ledger().await.unwrap();
        assert_eq!(projections.stock_of("p-x"), 15);
        assert_eq!(projections.supplier_debt("s-1"), Money::from_cents(1_000));
    }
}
