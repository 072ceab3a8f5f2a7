//! # Invoice Balance Projection
//!
//! `amountPaid` is the sum of counted supplier payments linked to the
//! invoice. Status follows with a 0.05 tolerance:
//!
//! ```text
//!   amountPaid ≥ total − 0.05  → paid
//!   amountPaid > 0.05          → partial
//!   otherwise                  → pending
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::money::Money;
use crate::types::{Invoice, InvoiceStatus, SupplierPayment};
use crate::BALANCE_TOLERANCE;

/// Derived payment state of one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceBalance {
    pub amount_paid: Money,
    pub status: InvoiceStatus,
}

/// Σ counted payments against `invoice_id`.
pub fn amount_paid(invoice_id: &str, payments: &[SupplierPayment]) -> Money {
    payments
        .iter()
        .filter(|p| p.invoice_id.as_deref() == Some(invoice_id) && p.counts_toward_balances())
        .map(|p| p.amount)
        .sum()
}

/// Maps a total and an amount paid to a status.
///
/// ```rust
/// use depot_core::ledger::invoice::invoice_status;
/// use depot_core::{InvoiceStatus, Money};
///
/// let total = Money::from_cents(50_000);
/// assert_eq!(invoice_status(total, Money::from_cents(49_996)), InvoiceStatus::Paid);
/// assert_eq!(invoice_status(total, Money::from_cents(100)), InvoiceStatus::Partial);
/// assert_eq!(invoice_status(total, Money::from_cents(5)), InvoiceStatus::Pending);
/// ```
pub fn invoice_status(total: Money, paid: Money) -> InvoiceStatus {
    if paid >= total - BALANCE_TOLERANCE {
        InvoiceStatus::Paid
    } else if paid > BALANCE_TOLERANCE {
        InvoiceStatus::Partial
    } else {
        InvoiceStatus::Pending
    }
}

pub fn invoice_balance(invoice: &Invoice, payments: &[SupplierPayment]) -> InvoiceBalance {
    let paid = amount_paid(&invoice.id, payments);
    InvoiceBalance {
        amount_paid: paid,
        status: invoice_status(invoice.total_amount, paid),
    }
}

pub fn invoice_balances(
    invoices: &[Invoice],
    payments: &[SupplierPayment],
) -> BTreeMap<String, InvoiceBalance> {
    invoices
        .iter()
        .map(|invoice| (invoice.id.clone(), invoice_balance(invoice, payments)))
        .collect()
}
