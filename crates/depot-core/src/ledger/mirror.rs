//! Synthetic `sup-local` invoices.
//!
//! Two kinds of internal invoice keep stock movements traceable:
//!
//! - `VIRT-…` / `BAJA-…` mirrors of manual stock adjustments. They carry
//!   `adjustmentId`, so the stock projection skips them.
//! - `BAJA-SIN-<dispatchNumber>` write-offs of dispatches lost or stolen.
//!   These DO reduce stock, and feed `totalLosses`.
//!
//! Both are priced at the product's landed unit cost.

use chrono::{DateTime, Utc};

use crate::approval::ApprovalStatus;
use crate::money::Money;
use crate::types::{Invoice, InvoiceItem, InvoiceStatus, Product, StockAdjustment, StockDispatch};
use crate::{GAIN_INVOICE_PREFIX, LOCAL_SUPPLIER_ID, LOSS_INVOICE_PREFIX, SINIESTRO_INVOICE_PREFIX};

fn costed_line(product_id: &str, quantity: i64, product: Option<&Product>) -> InvoiceItem {
    match product {
        Some(p) => InvoiceItem::new(
            product_id,
            quantity,
            p.purchase_cost,
            p.purchase_tax,
            p.purchase_freight,
        ),
        None => InvoiceItem::new(product_id, quantity, Money::zero(), Money::zero(), Money::zero()),
    }
}

fn local_invoice(id: &str, number: String, items: Vec<InvoiceItem>, at: DateTime<Utc>) -> Invoice {
    let total_amount = items.iter().map(InvoiceItem::line_cost).sum();
    Invoice {
        id: id.to_string(),
        supplier_id: LOCAL_SUPPLIER_ID.to_string(),
        invoice_number: number,
        date: at,
        due_date: None,
        items,
        total_amount,
        amount_paid: Money::zero(),
        status: InvoiceStatus::Pending,
        approval_status: ApprovalStatus::Approved,
        notes: None,
        authorized_by: None,
        authorized_at: None,
        rejection_reason: None,
        adjustment_id: None,
    }
}

/// Write-off invoice for a dispatch cancelled as lost or stolen.
///
/// One negative line per dispatch line, for the units that had not come back
/// in good condition. Lines with nothing left out are dropped.
pub fn siniestro_invoice(
    id: &str,
    dispatch: &StockDispatch,
    products: &[Product],
    at: DateTime<Utc>,
) -> Invoice {
    let items = dispatch
        .items
        .iter()
        .zip(dispatch.restocked_per_line())
        .filter_map(|(item, restocked)| {
            let lost = item.quantity - restocked;
            if lost <= 0 {
                return None;
            }
            let product = products.iter().find(|p| p.id == item.product_id);
            Some(costed_line(&item.product_id, -lost, product))
        })
        .collect();

    let mut invoice = local_invoice(
        id,
        format!("{}{}", SINIESTRO_INVOICE_PREFIX, dispatch.dispatch_number),
        items,
        at,
    );
    invoice.notes = Some(format!("Write-off of dispatch {}", dispatch.dispatch_number));
    invoice
}

/// Number for an adjustment mirror: `VIRT-XXXXXXXX` for gains,
/// `BAJA-XXXXXXXX` for losses.
pub fn adjustment_invoice_number(adjustment: &StockAdjustment) -> String {
    let suffix: String = adjustment
        .id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_uppercase();

    if adjustment.quantity < 0 {
        format!("{LOSS_INVOICE_PREFIX}-{suffix}")
    } else {
        format!("{GAIN_INVOICE_PREFIX}{suffix}")
    }
}

/// Mirror invoice for a manual stock adjustment.
pub fn adjustment_invoice(id: &str, adjustment: &StockAdjustment, product: &Product) -> Invoice {
    let line = costed_line(&adjustment.product_id, adjustment.quantity, Some(product));
    let mut invoice = local_invoice(
        id,
        adjustment_invoice_number(adjustment),
        vec![line],
        adjustment.timestamp,
    );
    invoice.notes = Some(adjustment.reason.clone());
    invoice.adjustment_id = Some(adjustment.id.clone());
    invoice
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fixtures::*;

    #[test]
    fn test_gain_and_loss_numbers() {
        let gain = adjustment("3f2a9c1e-0000-4000-8000-000000000000", "p-x", 4);
        assert_eq!(adjustment_invoice_number(&gain), "VIRT-3F2A9C1E");

        let loss = adjustment("3f2a9c1e-0000-4000-8000-000000000000", "p-x", -4);
        assert_eq!(adjustment_invoice_number(&loss), "BAJA-3F2A9C1E");
    }

    #[test]
    fn test_loss_mirror_feeds_losses_but_not_stock() {
        let p = product("p-x", 250, 400);
        let loss = adjustment("a-1", "p-x", -4);
        let mirror = adjustment_invoice("i-1", &loss, &p);

        assert!(mirror.is_loss());
        assert!(mirror.mirrors_adjustment());
        assert_eq!(mirror.total_amount.cents(), -1_000);
        assert_eq!(crate::ledger::profit::total_losses(&[mirror.clone()]).cents(), 1_000);
        assert_eq!(
            crate::ledger::stock::product_stock("p-x", &[mirror], &[loss], &[]),
            0
        );
    }

    #[test]
    fn test_siniestro_number_and_supplier() {
        let d = dispatch("d-1", "st-1", vec![dispatch_line("p-x", 2, 300)]);
        let inv = siniestro_invoice("i-9", &d, &[product("p-x", 100, 300)], d.timestamp);

        assert_eq!(inv.invoice_number, "BAJA-SIN-DSP-d-1");
        assert_eq!(inv.supplier_id, LOCAL_SUPPLIER_ID);
        assert!(inv.is_loss());
        assert!(!inv.mirrors_adjustment());
    }
}
