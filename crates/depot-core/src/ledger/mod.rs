//! # Ledger Projections
//!
//! Pure functions that turn the raw document collections into balances.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       LedgerSnapshot (raw documents)                    │
//! │   invoices  dispatches  adjustments  storePayments  supplierPayments   │
//! └───────┬──────────┬───────────┬─────────────┬────────────────┬───────────┘
//!         │          │           │             │                │
//!         ▼          ▼           ▼             ▼                ▼
//!    ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌──────────────┐
//!    │  stock  │ │ profit  │ │  store  │ │ supplier  │ │   invoice    │
//!    └────┬────┘ └────┬────┘ └────┬────┘ └─────┬─────┘ └──────┬───────┘
//!         └───────────┴───────────┴────────────┴──────────────┘
//!                                 │
//!                                 ▼
//!                     Projections (point-in-time balances)
//! ```
//!
//! Nothing here caches or updates in place. Every call recomputes from the
//! documents, so projecting an unchanged snapshot twice gives the same result.
//!
//! ## Exclusion Rules
//! | Document        | Excluded when                                        |
//! |-----------------|------------------------------------------------------|
//! | Dispatch        | `approvalStatus = pending` or `status = cancelled`   |
//! | Payment         | `approvalStatus = pending` or `status = cancelled`   |
//! | Invoice (debt)  | `approvalStatus = pending`                           |
//! | Invoice (stock) | never, except adjustment mirrors                     |

pub mod invoice;
pub mod mirror;
pub mod profit;
pub mod stock;
pub mod store;
pub mod supplier;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{
    DispatchStatus, Invoice, Product, StockAdjustment, StockDispatch, Store, StorePayment,
    Supplier, SupplierPayment,
};

pub use invoice::InvoiceBalance;
pub use profit::ProfitSummary;
pub use store::StoreBalance;
pub use supplier::SupplierBalance;

/// Whether a dispatch moves stock and earns margin.
pub(crate) fn dispatch_counts(dispatch: &StockDispatch) -> bool {
    dispatch.status != DispatchStatus::Cancelled && dispatch.approval_status.counts_toward_balances()
}

// =============================================================================
// Snapshot
// =============================================================================

/// Every collection the projections read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub suppliers: Vec<Supplier>,
    #[serde(default)]
    pub stores: Vec<Store>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub dispatches: Vec<StockDispatch>,
    #[serde(default)]
    pub store_payments: Vec<StorePayment>,
    #[serde(default)]
    pub supplier_payments: Vec<SupplierPayment>,
    #[serde(default)]
    pub stock_adjustments: Vec<StockAdjustment>,
}

impl LedgerSnapshot {
    /// Computes every projection.
    pub fn project(&self) -> Projections {
        Projections {
            stock: stock::stock_levels(
                &self.products,
                &self.invoices,
                &self.stock_adjustments,
                &self.dispatches,
            ),
            invoices: invoice::invoice_balances(&self.invoices, &self.supplier_payments),
            suppliers: supplier::supplier_balances(
                &self.suppliers,
                &self.invoices,
                &self.supplier_payments,
            ),
            stores: store::store_balances(&self.stores, &self.dispatches, &self.store_payments),
            profit: profit::profit_summary(&self.dispatches, &self.products, &self.invoices),
        }
    }

    /// Copy of the snapshot with every derived field filled in from
    /// `projections`.
    pub fn hydrate(&self, projections: &Projections) -> LedgerSnapshot {
        let mut out = self.clone();

        for product in &mut out.products {
            product.stock = projections.stock_of(&product.id);
        }
        for supplier in &mut out.suppliers {
            if let Some(balance) = projections.suppliers.get(&supplier.id) {
                supplier.total_volume = balance.total_volume;
                supplier.debt = balance.debt;
            }
        }
        for store in &mut out.stores {
            store.total_debt = projections.store_debt(&store.id);
        }
        for invoice in &mut out.invoices {
            if let Some(balance) = projections.invoices.get(&invoice.id) {
                invoice.amount_paid = balance.amount_paid;
                invoice.status = balance.status;
            }
        }

        out
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn store(&self, id: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.id == id)
    }

    /// Dispatches of one store, in any state.
    pub fn dispatches_of<'a>(&'a self, store_id: &'a str) -> impl Iterator<Item = &'a StockDispatch> + 'a {
        self.dispatches.iter().filter(move |d| d.store_id == store_id)
    }
}

// =============================================================================
// Projections
// =============================================================================

/// Point-in-time balances derived from a [`LedgerSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projections {
    /// Units on hand per product id.
    pub stock: BTreeMap<String, i64>,
    /// Payment state per invoice id.
    pub invoices: BTreeMap<String, InvoiceBalance>,
    /// Volume and debt per supplier id.
    pub suppliers: BTreeMap<String, SupplierBalance>,
    /// Debt per store id.
    pub stores: BTreeMap<String, StoreBalance>,
    pub profit: ProfitSummary,
}

impl Projections {
    pub fn stock_of(&self, product_id: &str) -> i64 {
        self.stock.get(product_id).copied().unwrap_or(0)
    }

    pub fn store_debt(&self, store_id: &str) -> Money {
        self.stores
            .get(store_id)
            .map(|b| b.total_debt)
            .unwrap_or_default()
    }

    pub fn supplier_debt(&self, supplier_id: &str) -> Money {
        self.suppliers
            .get(supplier_id)
            .map(|b| b.debt)
            .unwrap_or_default()
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// Small builders shared by the test suites of every crate.
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures {
    use chrono::{TimeZone, Utc};

    use crate::approval::ApprovalStatus;
    use crate::money::Money;
    use crate::types::*;

    pub fn product(id: &str, cost_cents: i64, supply_cents: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            purchase_cost: Money::from_cents(cost_cents),
            purchase_tax: Money::zero(),
            purchase_freight: Money::zero(),
            supply_price: Money::from_cents(supply_cents),
            retail_price: Money::from_cents(supply_cents * 2),
            stock: 0,
            min_stock: 0,
            max_stock: 0,
            supplier_id: None,
        }
    }

    pub fn supplier(id: &str) -> Supplier {
        Supplier {
            id: id.to_string(),
            name: format!("Supplier {id}"),
            tax_id: None,
            total_volume: Money::zero(),
            debt: Money::zero(),
        }
    }

    pub fn store(id: &str, max_debt_limit_cents: Option<i64>) -> Store {
        Store {
            id: id.to_string(),
            name: format!("Store {id}"),
            color: None,
            config: StoreConfig {
                allows_credit: true,
                max_debt_limit: max_debt_limit_cents.map(Money::from_cents),
                payment_term_days: 30,
            },
            total_debt: Money::zero(),
            active: true,
        }
    }

    pub fn invoice_line(product_id: &str, quantity: i64, unit_cost_cents: i64) -> InvoiceItem {
        InvoiceItem::new(
            product_id,
            quantity,
            Money::from_cents(unit_cost_cents),
            Money::zero(),
            Money::zero(),
        )
    }

    pub fn invoice(id: &str, supplier_id: &str, number: &str, items: Vec<InvoiceItem>) -> Invoice {
        let total_amount = items.iter().map(InvoiceItem::line_cost).sum();
        Invoice {
            id: id.to_string(),
            supplier_id: supplier_id.to_string(),
            invoice_number: number.to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().unwrap_or_default(),
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

    pub fn dispatch_line(product_id: &str, quantity: i64, price_cents: i64) -> DispatchItem {
        DispatchItem {
            product_id: product_id.to_string(),
            quantity,
            unit_supply_price: Money::from_cents(price_cents),
        }
    }

    pub fn dispatch(id: &str, store_id: &str, items: Vec<DispatchItem>) -> StockDispatch {
        StockDispatch {
            id: id.to_string(),
            dispatch_number: format!("DSP-{id}"),
            store_id: store_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).single().unwrap_or_default(),
            due_date: None,
            items,
            returns: Vec::new(),
            total_amount: None,
            status: DispatchStatus::Active,
            approval_status: ApprovalStatus::Approved,
            print_count: 0,
            authorized_by: None,
            authorized_at: None,
            cancellation: None,
            rejection_reason: None,
        }
    }

    pub fn product_return(
        dispatch_id: &str,
        product_id: &str,
        quantity: i64,
        reason: ReturnReason,
    ) -> ProductReturn {
        ProductReturn {
            id: format!("r-{dispatch_id}-{product_id}-{quantity}"),
            dispatch_id: dispatch_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            reason,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).single().unwrap_or_default(),
        }
    }

    pub fn adjustment(id: &str, product_id: &str, quantity: i64) -> StockAdjustment {
        StockAdjustment {
            id: id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            reason: "count".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 3, 9, 0, 0).single().unwrap_or_default(),
            invoice_id: None,
        }
    }

    pub fn store_payment(id: &str, store_id: &str, amount_cents: i64) -> StorePayment {
        StorePayment {
            id: id.to_string(),
            store_id: store_id.to_string(),
            amount: Money::from_cents(amount_cents),
            date: Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).single().unwrap_or_default(),
            method: Some("cash".to_string()),
            reference: None,
            status: PaymentStatus::Active,
            approval_status: ApprovalStatus::Approved,
            print_count: 0,
            authorized_by: None,
            authorized_at: None,
            cancelled_by: None,
            cancelled_at: None,
            rejection_reason: None,
        }
    }

    pub fn supplier_payment(
        id: &str,
        supplier_id: &str,
        invoice_id: Option<&str>,
        amount_cents: i64,
    ) -> SupplierPayment {
        SupplierPayment {
            id: id.to_string(),
            supplier_id: supplier_id.to_string(),
            invoice_id: invoice_id.map(str::to_string),
            amount: Money::from_cents(amount_cents),
            date: Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).single().unwrap_or_default(),
            method: Some("transfer".to_string()),
            reference: None,
            status: PaymentStatus::Active,
            approval_status: ApprovalStatus::Approved,
            authorized_by: None,
            authorized_at: None,
            cancelled_by: None,
            cancelled_at: None,
            rejection_reason: None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::approval::ApprovalStatus;
    use crate::types::{CancellationMode, ReturnReason};
    use crate::LOCAL_SUPPLIER_ID;
    use chrono::{TimeZone, Utc};

    fn base_snapshot() -> LedgerSnapshot {
        LedgerSnapshot {
            products: vec![product("p-x", 200, 300), product("p-y", 100, 180)],
            suppliers: vec![supplier("sup-1"), supplier(LOCAL_SUPPLIER_ID)],
            stores: vec![store("st-1", None), store("st-2", Some(100_000))],
            invoices: vec![invoice(
                "i-1",
                "sup-1",
                "F-1",
                vec![invoice_line("p-x", 100, 200), invoice_line("p-y", 50, 100)],
            )],
            dispatches: vec![dispatch(
                "d-1",
                "st-1",
                vec![dispatch_line("p-x", 10, 300), dispatch_line("p-y", 5, 180)],
            )],
            store_payments: vec![store_payment("pay-1", "st-1", 1_000)],
            supplier_payments: vec![supplier_payment("sp-1", "sup-1", Some("i-1"), 5_000)],
            stock_adjustments: vec![adjustment("a-1", "p-y", 3)],
        }
    }

    #[test]
    fn test_project_all_balances() {
        let projections = base_snapshot().project();

        assert_eq!(projections.stock_of("p-x"), 90);
        assert_eq!(projections.stock_of("p-y"), 48);
        // 10×3.00 + 5×1.80 − 10.00
        assert_eq!(projections.store_debt("st-1").cents(), 2_900);
        assert!(projections.store_debt("st-2").is_zero());
        // 100×2.00 + 50×1.00 − 50.00
        assert_eq!(projections.supplier_debt("sup-1").cents(), 20_000);
        assert_eq!(
            projections.invoices["i-1"].status,
            crate::types::InvoiceStatus::Partial
        );
        // 10×1.00 + 5×0.80
        assert_eq!(projections.profit.gross_profit.cents(), 1_400);
        assert_eq!(projections.profit.net_profit.cents(), 1_400);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let snapshot = base_snapshot();
        assert_eq!(snapshot.project(), snapshot.project());

        let hydrated = snapshot.hydrate(&snapshot.project());
        assert_eq!(hydrated.project(), snapshot.project());
    }

    #[test]
    fn test_hydrate_fills_derived_fields() {
        let snapshot = base_snapshot();
        let hydrated = snapshot.hydrate(&snapshot.project());

        assert_eq!(hydrated.product("p-x").map(|p| p.stock), Some(90));
        assert_eq!(hydrated.store("st-1").map(|s| s.total_debt.cents()), Some(2_900));
        assert_eq!(hydrated.invoices[0].amount_paid.cents(), 5_000);
        assert_eq!(hydrated.suppliers[0].debt.cents(), 20_000);
    }

    #[test]
    fn test_pending_dispatch_has_no_effect() {
        let before = base_snapshot().project();

        let mut snapshot = base_snapshot();
        let mut pending = dispatch("d-2", "st-2", vec![dispatch_line("p-x", 40, 300)]);
        pending.approval_status = ApprovalStatus::Pending;
        snapshot.dispatches.push(pending);

        assert_eq!(snapshot.project(), before);
    }

    #[test]
    fn test_rejected_dispatch_equivalent_to_absent() {
        let before = base_snapshot().project();

        let mut snapshot = base_snapshot();
        let mut rejected = dispatch("d-2", "st-2", vec![dispatch_line("p-x", 40, 300)]);
        rejected.approval_status = ApprovalStatus::Rejected;
        rejected.status = DispatchStatus::Cancelled;
        rejected.rejection_reason = Some("wrong store".to_string());
        snapshot.dispatches.push(rejected);

        assert_eq!(snapshot.project(), before);
    }

    #[test]
    fn test_stock_never_negative_after_heavy_losses() {
        let mut snapshot = base_snapshot();
        snapshot.stock_adjustments.push(adjustment("a-2", "p-x", -5_000));
        snapshot.invoices.push(invoice(
            "i-loss",
            LOCAL_SUPPLIER_ID,
            "BAJA-SIN-DSP-9",
            vec![invoice_line("p-y", -5_000, 100)],
        ));

        let projections = snapshot.project();
        assert!(projections.stock.values().all(|level| *level >= 0));
        assert_eq!(projections.stock_of("p-x"), 0);
        assert_eq!(projections.stock_of("p-y"), 0);
    }

    #[test]
    fn test_scenario_e_siniestro_vs_administrative() {
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).single().unwrap_or_default();
        let x = product("p-x", 200, 300);
        let mut snapshot = LedgerSnapshot {
            products: vec![x.clone()],
            invoices: vec![invoice("i-1", "sup-1", "F-1", vec![invoice_line("p-x", 100, 200)])],
            dispatches: vec![dispatch("d-1", "st-1", vec![dispatch_line("p-x", 20, 300)])],
            ..LedgerSnapshot::default()
        };
        snapshot.dispatches[0].status = DispatchStatus::Cancelled;

        let administrative = snapshot.project();

        let write_off = mirror::siniestro_invoice(
            "i-sin",
            &snapshot.dispatches[0],
            &snapshot.products,
            at,
        );
        snapshot.dispatches[0].cancellation = Some(crate::types::Cancellation {
            mode: CancellationMode::Siniestro,
            by: "admin".to_string(),
            at,
        });
        snapshot.invoices.push(write_off);
        let siniestro = snapshot.project();

        assert_eq!(
            siniestro.profit.total_losses - administrative.profit.total_losses,
            Money::from_cents(4_000)
        );
        assert_eq!(
            administrative.profit.net_profit - siniestro.profit.net_profit,
            Money::from_cents(4_000)
        );
        assert_eq!(administrative.stock_of("p-x") - siniestro.stock_of("p-x"), 20);
    }

    #[test]
    fn test_siniestro_only_writes_off_units_still_out() {
        let x = product("p-x", 200, 300);
        let mut d = dispatch("d-1", "st-1", vec![dispatch_line("p-x", 20, 300)]);
        d.returns.push(product_return("d-1", "p-x", 5, ReturnReason::GoodCondition));
        d.returns.push(product_return("d-1", "p-x", 3, ReturnReason::Damaged));

        let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).single().unwrap_or_default();
        let write_off = mirror::siniestro_invoice("i-sin", &d, &[x], at);
        assert_eq!(write_off.items[0].quantity, -15);
        assert_eq!(write_off.total_amount.cents(), -3_000);
    }

    #[test]
    fn test_snapshot_deserializes_with_missing_collections() {
        let snapshot: LedgerSnapshot =
            serde_json::from_value(serde_json::json!({ "products": [] })).unwrap();
        assert_eq!(snapshot, LedgerSnapshot::default());
    }
}
