//! # Dispatch Pre-checks
//!
//! Before a dispatch is written, four checks run in a fixed order and the
//! first failure wins:
//!
//! ```text
//!   cart ──► (1) stock ──► (2) inactive ──► (3) credit_limit ──► (4) overdue ──► OK
//!              │              │                   │                  │
//!              ▼              ▼                   ▼                  ▼
//!                         DispatchBlock { reason, ... }
//! ```
//!
//! A block is an outcome, not an error: the caller records it in the audit
//! log and writes nothing else.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ledger::{LedgerSnapshot, Projections};
use crate::money::Money;
use crate::types::{DispatchItem, Store};

/// Why a dispatch was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DispatchBlock {
    /// Not enough projected stock for a cart line.
    Stock {
        product_id: String,
        requested: i64,
        available: i64,
    },
    /// The store is flagged inactive.
    Inactive { store_id: String },
    /// Current debt plus the cart would exceed the store's limit.
    CreditLimit {
        current_debt: Money,
        cart_total: Money,
        limit: Money,
    },
    /// The store has an active dispatch past its due date.
    Overdue {
        dispatch_number: String,
        due_date: DateTime<Utc>,
    },
}

impl DispatchBlock {
    /// Stable reason code: `stock`, `inactive`, `credit_limit`, `overdue`.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchBlock::Stock { .. } => "stock",
            DispatchBlock::Inactive { .. } => "inactive",
            DispatchBlock::CreditLimit { .. } => "credit_limit",
            DispatchBlock::Overdue { .. } => "overdue",
        }
    }

    /// Human-readable explanation, also used as audit details.
    pub fn message(&self) -> String {
        match self {
            DispatchBlock::Stock {
                product_id,
                requested,
                available,
            } => format!(
                "Insufficient stock for {product_id}: requested {requested}, available {available}"
            ),
            DispatchBlock::Inactive { store_id } => format!("Store {store_id} is inactive"),
            DispatchBlock::CreditLimit {
                current_debt,
                cart_total,
                limit,
            } => format!(
                "Credit limit exceeded: debt {current_debt} + cart {cart_total} > limit {limit}"
            ),
            DispatchBlock::Overdue {
                dispatch_number,
                due_date,
            } => format!(
                "Dispatch {dispatch_number} was due {}",
                due_date.format("%Y-%m-%d")
            ),
        }
    }
}

/// Merges cart lines that share both product and unit price.
///
/// Lines of one product at different prices stay apart, so the merged cart
/// totals exactly what the cart did.
pub fn aggregate_lines(cart: &[DispatchItem]) -> Vec<DispatchItem> {
    let mut merged: Vec<DispatchItem> = Vec::with_capacity(cart.len());
    for line in cart {
        match merged.iter_mut().find(|m| {
            m.product_id == line.product_id && m.unit_supply_price == line.unit_supply_price
        }) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line.clone()),
        }
    }
    merged
}

/// Units requested per product, in order of first appearance.
pub fn requested_quantities(cart: &[DispatchItem]) -> Vec<(&str, i64)> {
    let mut requested: Vec<(&str, i64)> = Vec::new();
    for line in cart {
        match requested.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, quantity)) => *quantity += line.quantity,
            None => requested.push((line.product_id.as_str(), line.quantity)),
        }
    }
    requested
}

/// Runs the four pre-checks for a new dispatch of `cart` to `store`.
///
/// `projections` must come from `snapshot`. `default_limit` applies when the
/// store has no limit of its own.
pub fn check_dispatch(
    snapshot: &LedgerSnapshot,
    projections: &Projections,
    store: &Store,
    cart: &[DispatchItem],
    now: DateTime<Utc>,
    default_limit: Money,
) -> Result<(), DispatchBlock> {
    // (1) stock
    for (product_id, requested) in requested_quantities(cart) {
        let available = projections.stock_of(product_id);
        if requested > available {
            return Err(DispatchBlock::Stock {
                product_id: product_id.to_string(),
                requested,
                available,
            });
        }
    }

    // (2) inactive
    if !store.active {
        return Err(DispatchBlock::Inactive {
            store_id: store.id.clone(),
        });
    }

    // (3) credit_limit
    let current_debt = projections.store_debt(&store.id);
    let cart_total: Money = cart.iter().map(DispatchItem::line_total).sum();
    let limit = store.config.effective_max_debt_limit_or(default_limit);
    if current_debt + cart_total > limit {
        return Err(DispatchBlock::CreditLimit {
            current_debt,
            cart_total,
            limit,
        });
    }

    // (4) overdue
    if let Some(late) = snapshot
        .dispatches_of(&store.id)
        .filter(|d| d.is_overdue_at(now))
        .min_by_key(|d| d.due_date)
    {
        if let Some(due_date) = late.due_date {
            return Err(DispatchBlock::Overdue {
                dispatch_number: late.dispatch_number.clone(),
                due_date,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalStatus;
    use crate::ledger::fixtures::*;
    use crate::DEFAULT_MAX_DEBT_LIMIT;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    fn stocked(store_limit: Option<i64>) -> LedgerSnapshot {
        LedgerSnapshot {
            products: vec![product("p-x", 100, 1_000)],
            stores: vec![store("st-1", store_limit)],
            invoices: vec![invoice("i-1", "sup-1", "F-1", vec![invoice_line("p-x", 1_000, 100)])],
            ..LedgerSnapshot::default()
        }
    }

    fn run(snapshot: &LedgerSnapshot, cart: &[DispatchItem]) -> Result<(), DispatchBlock> {
        let projections = snapshot.project();
        let store = snapshot.store("st-1").unwrap();
        check_dispatch(snapshot, &projections, store, cart, now(), DEFAULT_MAX_DEBT_LIMIT)
    }

    #[test]
    fn test_passes_when_all_clear() {
        let snapshot = stocked(None);
        assert_eq!(run(&snapshot, &[dispatch_line("p-x", 5, 1_000)]), Ok(()));
    }

    #[test]
    fn test_stock_aggregates_same_product() {
        let snapshot = stocked(None);
        let cart = [dispatch_line("p-x", 600, 1), dispatch_line("p-x", 500, 2)];

        let block = run(&snapshot, &cart).unwrap_err();
        assert_eq!(block.code(), "stock");
        assert_eq!(
            block,
            DispatchBlock::Stock {
                product_id: "p-x".to_string(),
                requested: 1_100,
                available: 1_000,
            }
        );
    }

    #[test]
    fn test_aggregate_keeps_distinct_prices() {
        let cart = [
            dispatch_line("p-x", 2, 1_000),
            dispatch_line("p-y", 1, 500),
            dispatch_line("p-x", 3, 1_200),
            dispatch_line("p-x", 4, 1_000),
        ];

        let merged = aggregate_lines(&cart);
        assert_eq!(
            merged,
            vec![
                dispatch_line("p-x", 6, 1_000),
                dispatch_line("p-y", 1, 500),
                dispatch_line("p-x", 3, 1_200),
            ]
        );
        let total = |lines: &[DispatchItem]| -> Money { lines.iter().map(DispatchItem::line_total).sum() };
        assert_eq!(total(&merged), total(&cart));
        assert_eq!(requested_quantities(&cart), vec![("p-x", 9), ("p-y", 1)]);
    }

    #[test]
    fn test_scenario_c_credit_limit() {
        // limit 1000.00, existing debt 900.00, cart 150.00
        let mut snapshot = stocked(Some(100_000));
        snapshot
            .dispatches
            .push(dispatch("d-1", "st-1", vec![dispatch_line("p-x", 90, 1_000)]));

        let block = run(&snapshot, &[dispatch_line("p-x", 15, 1_000)]).unwrap_err();
        assert_eq!(block.code(), "credit_limit");
        assert_eq!(
            block,
            DispatchBlock::CreditLimit {
                current_debt: Money::from_cents(90_000),
                cart_total: Money::from_cents(15_000),
                limit: Money::from_cents(100_000),
            }
        );
    }

    #[test]
    fn test_limit_reached_exactly_is_allowed() {
        let mut snapshot = stocked(Some(100_000));
        snapshot
            .dispatches
            .push(dispatch("d-1", "st-1", vec![dispatch_line("p-x", 90, 1_000)]));

        assert_eq!(run(&snapshot, &[dispatch_line("p-x", 10, 1_000)]), Ok(()));
    }

    #[test]
    fn test_order_stock_before_inactive_before_credit() {
        let mut snapshot = stocked(Some(1));
        snapshot.stores[0].active = false;

        let too_many = [dispatch_line("p-x", 5_000, 1_000)];
        assert_eq!(run(&snapshot, &too_many).unwrap_err().code(), "stock");

        let fine = [dispatch_line("p-x", 1, 1_000)];
        assert_eq!(run(&snapshot, &fine).unwrap_err().code(), "inactive");

        snapshot.stores[0].active = true;
        assert_eq!(run(&snapshot, &fine).unwrap_err().code(), "credit_limit");
    }

    #[test]
    fn test_overdue_active_dispatch_blocks() {
        let mut snapshot = stocked(None);
        let mut late = dispatch("d-1", "st-1", vec![dispatch_line("p-x", 1, 1_000)]);
        late.due_date = Some(now() - Duration::days(2));
        snapshot.dispatches.push(late);

        let block = run(&snapshot, &[dispatch_line("p-x", 1, 1_000)]).unwrap_err();
        assert_eq!(block.code(), "overdue");
        assert!(block.message().contains("DSP-d-1"));
    }

    #[test]
    fn test_pending_overdue_dispatch_still_blocks() {
        // Overdue looks at lifecycle status only.
        let mut snapshot = stocked(None);
        let mut late = dispatch("d-1", "st-1", vec![dispatch_line("p-x", 1, 1_000)]);
        late.due_date = Some(now() - Duration::days(2));
        late.approval_status = ApprovalStatus::Pending;
        snapshot.dispatches.push(late);

        assert_eq!(
            run(&snapshot, &[dispatch_line("p-x", 1, 1_000)]).unwrap_err().code(),
            "overdue"
        );
    }

    #[test]
    fn test_block_serializes_with_reason_tag() {
        let block = DispatchBlock::Inactive {
            store_id: "st-1".to_string(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["reason"], "inactive");
        assert_eq!(json["storeId"], "st-1");
    }
}
