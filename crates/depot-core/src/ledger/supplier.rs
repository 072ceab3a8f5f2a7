//! # Supplier Debt Projection
//!
//! Every invoice that is not waiting for approval builds supplier volume.
//! Rejection does not cancel an invoice, so a rejected invoice still counts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::money::Money;
use crate::types::{Invoice, Supplier, SupplierPayment};

/// Derived balance of one supplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierBalance {
    pub total_volume: Money,
    pub total_paid: Money,
    pub debt: Money,
}

/// Whether an invoice adds to its supplier's volume.
pub fn invoice_counts_toward_debt(invoice: &Invoice) -> bool {
    invoice.approval_status.counts_toward_balances()
}

pub fn supplier_balance(
    supplier_id: &str,
    invoices: &[Invoice],
    payments: &[SupplierPayment],
) -> SupplierBalance {
    let total_volume: Money = invoices
        .iter()
        .filter(|inv| inv.supplier_id == supplier_id && invoice_counts_toward_debt(inv))
        .map(|inv| inv.total_amount)
        .sum();

    let total_paid: Money = payments
        .iter()
        .filter(|p| p.supplier_id == supplier_id && p.counts_toward_balances())
        .map(|p| p.amount)
        .sum();

    SupplierBalance {
        total_volume,
        total_paid,
        debt: (total_volume - total_paid).clamp_non_negative(),
    }
}

pub fn supplier_balances(
    suppliers: &[Supplier],
    invoices: &[Invoice],
    payments: &[SupplierPayment],
) -> BTreeMap<String, SupplierBalance> {
    suppliers
        .iter()
        .map(|s| (s.id.clone(), supplier_balance(&s.id, invoices, payments)))
        .collect()
}
