//! # Stock Projection
//!
//! ```text
//! stock(p) = max(0, invoiceIn + manualIn − dispatchOut)
//!
//!   invoiceIn   Σ line qty over ALL invoices, whatever their approval state,
//!               except adjustment mirrors (the adjustment row already counts)
//!   manualIn    Σ signed qty over stock adjustments
//!   dispatchOut Σ (qty − good-condition returns) over dispatches that are
//!               not cancelled and not pending
//! ```
//!
//! A cancelled dispatch gives its stock back by exclusion. There is no
//! reversal entry.

use std::collections::{BTreeMap, HashMap};

use crate::types::{Invoice, Product, StockAdjustment, StockDispatch};

use super::dispatch_counts;

/// Net unfloored movement per product id.
pub fn stock_movements(
    invoices: &[Invoice],
    adjustments: &[StockAdjustment],
    dispatches: &[StockDispatch],
) -> HashMap<String, i64> {
    let mut movements: HashMap<String, i64> = HashMap::new();

    // Departs from "every invoice": a mirror carries the same units as its
    // adjustment row, which `manualIn` already counts.
    for invoice in invoices.iter().filter(|inv| !inv.mirrors_adjustment()) {
        for item in &invoice.items {
            *movements.entry(item.product_id.clone()).or_default() += item.quantity;
        }
    }

    for adjustment in adjustments {
        *movements.entry(adjustment.product_id.clone()).or_default() += adjustment.quantity;
    }

    for dispatch in dispatches.iter().filter(|d| dispatch_counts(d)) {
        for item in &dispatch.items {
            *movements.entry(item.product_id.clone()).or_default() -= item.quantity;
        }
        for ret in dispatch.returns.iter().filter(|r| r.reason.restores_stock()) {
            *movements.entry(ret.product_id.clone()).or_default() += ret.quantity;
        }
    }

    movements
}

/// Stock of a single product.
pub fn product_stock(
    product_id: &str,
    invoices: &[Invoice],
    adjustments: &[StockAdjustment],
    dispatches: &[StockDispatch],
) -> i64 {
    stock_movements(invoices, adjustments, dispatches)
        .get(product_id)
        .copied()
        .unwrap_or(0)
        .max(0)
}

/// Stock for every known product, floored at 0.
pub fn stock_levels(
    products: &[Product],
    invoices: &[Invoice],
    adjustments: &[StockAdjustment],
    dispatches: &[StockDispatch],
) -> BTreeMap<String, i64> {
    let movements = stock_movements(invoices, adjustments, dispatches);
    products
        .iter()
        .map(|product| {
            let level = movements.get(&product.id).copied().unwrap_or(0).max(0);
            (product.id.clone(), level)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalStatus;
    use crate::ledger::fixtures::*;
    use crate::types::{DispatchStatus, ReturnReason};

    #[test]
    fn test_scenario_a_invoice_then_dispatch() {
        let invoices = vec![invoice("i-1", "sup-1", "F-1", vec![invoice_line("p-x", 100, 100)])];
        let dispatches = vec![dispatch("d-1", "st-1", vec![dispatch_line("p-x", 30, 150)])];

        assert_eq!(product_stock("p-x", &invoices, &[], &dispatches), 70);
    }

    #[test]
    fn test_stock_never_negative() {
        let invoices = vec![invoice("i-1", "sup-1", "F-1", vec![invoice_line("p-x", 5, 100)])];
        let adjustments = vec![adjustment("a-1", "p-x", -50)];

        assert_eq!(product_stock("p-x", &invoices, &adjustments, &[]), 0);
    }

    #[test]
    fn test_pending_and_cancelled_dispatches_do_not_consume() {
        let invoices = vec![invoice("i-1", "sup-1", "F-1", vec![invoice_line("p-x", 100, 100)])];
        let mut pending = dispatch("d-1", "st-1", vec![dispatch_line("p-x", 30, 150)]);
        pending.approval_status = ApprovalStatus::Pending;
        let mut cancelled = dispatch("d-2", "st-1", vec![dispatch_line("p-x", 20, 150)]);
        cancelled.status = DispatchStatus::Cancelled;

        assert_eq!(
            product_stock("p-x", &invoices, &[], &[pending, cancelled]),
            100
        );
    }

    #[test]
    fn test_only_good_condition_returns_restock() {
        let invoices = vec![invoice("i-1", "sup-1", "F-1", vec![invoice_line("p-x", 100, 100)])];

        let mut good = dispatch("d-1", "st-1", vec![dispatch_line("p-x", 30, 150)]);
        good.returns.push(product_return("d-1", "p-x", 10, ReturnReason::GoodCondition));
        assert_eq!(product_stock("p-x", &invoices, &[], &[good]), 80);

        let mut damaged = dispatch("d-1", "st-1", vec![dispatch_line("p-x", 30, 150)]);
        damaged.returns.push(product_return("d-1", "p-x", 10, ReturnReason::Damaged));
        assert_eq!(product_stock("p-x", &invoices, &[], &[damaged]), 70);
    }

    /// `invoiceIn` skips invoices that mirror an adjustment. Every other
    /// invoice counts, local write-offs included.
    #[test]
    fn test_invoice_in_skips_adjustment_mirrors_only() {
        let adjustments = vec![adjustment("a-1", "p-x", 12)];
        let mut mirror = invoice("i-1", "sup-local", "VIRT-1", vec![invoice_line("p-x", 12, 100)]);
        mirror.adjustment_id = Some("a-1".to_string());

        // counting the mirror as well would give 24
        assert_eq!(product_stock("p-x", &[mirror.clone()], &adjustments, &[]), 12);

        let write_off = invoice("i-2", "sup-local", "BAJA-SIN-DSP-1", vec![invoice_line("p-x", -5, 100)]);
        assert_eq!(product_stock("p-x", &[mirror, write_off], &adjustments, &[]), 7);
    }

    /// Invoices raise stock even while their own approval is pending.
    /// Dispatches and payments do not behave this way.
    #[test]
    fn test_pending_invoice_still_counts_toward_stock() {
        let mut pending = invoice("i-1", "sup-1", "F-1", vec![invoice_line("p-x", 40, 100)]);
        pending.approval_status = ApprovalStatus::Pending;

        assert_eq!(product_stock("p-x", &[pending], &[], &[]), 40);
    }

    #[test]
    fn test_stock_levels_cover_every_product() {
        let products = vec![product("p-x", 100, 150), product("p-y", 100, 150)];
        let invoices = vec![invoice("i-1", "sup-1", "F-1", vec![invoice_line("p-x", 3, 100)])];

        let levels = stock_levels(&products, &invoices, &[], &[]);
        assert_eq!(levels.get("p-x"), Some(&3));
        assert_eq!(levels.get("p-y"), Some(&0));
    }
}
