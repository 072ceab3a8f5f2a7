//! # Profit Projection
//!
//! ```text
//!   gross profit = Σ over counted dispatches, per line:
//!                    (unitSupplyPrice − product.unit_cost) × (qty − returns of any reason)
//!   total losses = Σ |line cost| over sup-local invoices numbered BAJA...
//!   net profit   = gross profit − total losses
//! ```
//!
//! Returns of any reason reduce profit, but only good-condition returns put
//! units back in stock. Damaged goods are lost revenue without being
//! resalable.
//!
//! Unit cost comes from the CURRENT product record. A product that no longer
//! exists is costed at zero.

use std::collections::HashMap;

use serde::Serialize;

use crate::money::Money;
use crate::types::{Invoice, Product, StockDispatch};

use super::dispatch_counts;

/// Profit figures for the whole ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitSummary {
    pub gross_profit: Money,
    pub total_losses: Money,
    pub net_profit: Money,
}

/// Margin realised on one dispatch.
pub fn dispatch_profit(dispatch: &StockDispatch, products: &HashMap<&str, &Product>) -> Money {
    dispatch
        .items
        .iter()
        .zip(dispatch.returned_per_line())
        .map(|(item, returned)| {
            let unit_cost = products
                .get(item.product_id.as_str())
                .map(|p| p.unit_cost())
                .unwrap_or_default();
            (item.unit_supply_price - unit_cost) * (item.quantity - returned)
        })
        .sum()
}

pub fn gross_profit(dispatches: &[StockDispatch], products: &[Product]) -> Money {
    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();
    dispatches
        .iter()
        .filter(|d| dispatch_counts(d))
        .map(|d| dispatch_profit(d, &by_id))
        .sum()
}

pub fn total_losses(invoices: &[Invoice]) -> Money {
    invoices
        .iter()
        .filter(|inv| inv.is_loss())
        .flat_map(|inv| inv.items.iter())
        .map(|item| item.line_cost().abs())
        .sum()
}

pub fn profit_summary(
    dispatches: &[StockDispatch],
    products: &[Product],
    invoices: &[Invoice],
) -> ProfitSummary {
    let gross_profit = gross_profit(dispatches, products);
    let total_losses = total_losses(invoices);
    ProfitSummary {
        gross_profit,
        total_losses,
        net_profit: gross_profit - total_losses,
    }
}
