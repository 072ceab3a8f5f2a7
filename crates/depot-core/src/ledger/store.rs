//! # Store Debt Projection
//!
//! ```text
//!   per open dispatch:   effective total − Σ returned qty × dispatch unit price
//!   gross debt        =  Σ over open dispatches
//!   total debt        =  max(0, gross debt − Σ counted store payments)
//! ```
//!
//! An open dispatch is approved (or rejected-and-cancelled, which the status
//! filter removes anyway) and neither `returned` nor `cancelled`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::approval::ApprovalStatus;
use crate::money::Money;
use crate::types::{DispatchStatus, StockDispatch, Store, StorePayment};

/// Derived balance of one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreBalance {
    pub gross_debt: Money,
    pub total_paid: Money,
    pub total_debt: Money,
}

/// Whether a dispatch still carries debt.
pub fn dispatch_is_open(dispatch: &StockDispatch) -> bool {
    !matches!(dispatch.status, DispatchStatus::Returned | DispatchStatus::Cancelled)
        && dispatch.approval_status != ApprovalStatus::Pending
}

/// What the store owes for one dispatch, before payments.
///
/// Returns are valued at the dispatch line's unit price, not at anything
/// recorded on the return. A product on several lines is returned against
/// its lines in order.
pub fn dispatch_debt(dispatch: &StockDispatch) -> Money {
    let returned: Money = dispatch
        .items
        .iter()
        .zip(dispatch.returned_per_line())
        .map(|(item, qty)| item.unit_supply_price * qty)
        .sum();

    dispatch.effective_total() - returned
}

/// Σ open dispatch debt for `store_id`, unclamped and before payments.
pub fn gross_store_debt(store_id: &str, dispatches: &[StockDispatch]) -> Money {
    dispatches
        .iter()
        .filter(|d| d.store_id == store_id && dispatch_is_open(d))
        .map(dispatch_debt)
        .sum()
}

pub fn store_balance(
    store_id: &str,
    dispatches: &[StockDispatch],
    payments: &[StorePayment],
) -> StoreBalance {
    let gross_debt = gross_store_debt(store_id, dispatches);
    let total_paid: Money = payments
        .iter()
        .filter(|p| p.store_id == store_id && p.counts_toward_balances())
        .map(|p| p.amount)
        .sum();

    StoreBalance {
        gross_debt,
        total_paid,
        total_debt: (gross_debt - total_paid).clamp_non_negative(),
    }
}

/// Shortcut for the number the credit check needs.
pub fn store_debt(store_id: &str, dispatches: &[StockDispatch], payments: &[StorePayment]) -> Money {
    store_balance(store_id, dispatches, payments).total_debt
}

pub fn store_balances(
    stores: &[Store],
    dispatches: &[StockDispatch],
    payments: &[StorePayment],
) -> BTreeMap<String, StoreBalance> {
    stores
        .iter()
        .map(|s| (s.id.clone(), store_balance(&s.id, dispatches, payments)))
        .collect()
}
