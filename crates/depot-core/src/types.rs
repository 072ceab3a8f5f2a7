//! # Domain Types
//!
//! The documents Depot keeps, and the small enums that describe their state.
//!
//! ## Document Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Depot Documents                                │
//! │                                                                         │
//! │   Supplier ──── Invoice ─────────────┐          ┌──── StockDispatch     │
//! │      │          (stock in,           │          │     (stock out,       │
//! │      │           supplier debt)      ▼          │      store debt)      │
//! │      │                           ┌────────┐     │          │            │
//! │      └─ SupplierPayment          │Product │◄────┘          ├─ returns[] │
//! │                                  └────────┘                │            │
//! │                                      ▲                     ▼            │
//! │   StockAdjustment ───(mirror)──► Invoice @ sup-local     Store          │
//! │                                                            │            │
//! │                                              StorePayment ─┘            │
//! │                                                                         │
//! │   AuditLogEntry: one per mutation, never updated or deleted             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Derived Fields
//! Fields such as `Product::stock`, `Supplier::debt` and `Store::total_debt`
//! are NOT authoritative. They are filled in by [`crate::ledger`] from the
//! raw documents and may be stale on anything read straight from storage.
//!
//! ## Explicit Defaults
//! Every status field has a default variant and `#[serde(default)]`, so a
//! document written without one reads back as `approved` / `active`.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::approval::ApprovalStatus;
use crate::money::Money;
use crate::{ADMIN_ROLE, DEFAULT_MAX_DEBT_LIMIT, LOCAL_SUPPLIER_ID, LOSS_INVOICE_PREFIX};

// =============================================================================
// Product
// =============================================================================

/// A product the business buys from suppliers and supplies to stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,

    /// Purchase cost per unit, before tax and freight.
    #[serde(default)]
    pub purchase_cost: Money,
    #[serde(default)]
    pub purchase_tax: Money,
    #[serde(default)]
    pub purchase_freight: Money,

    /// Price charged to stores on dispatch.
    #[serde(default)]
    pub supply_price: Money,

    /// Suggested shelf price at the store.
    #[serde(default)]
    pub retail_price: Money,

    /// Derived. See [`crate::ledger::stock`].
    #[serde(default)]
    #[ts(type = "number")]
    pub stock: i64,

    #[serde(default)]
    #[ts(type = "number")]
    pub min_stock: i64,

    #[serde(default)]
    #[ts(type = "number")]
    pub max_stock: i64,

    #[serde(default)]
    pub supplier_id: Option<String>,
}

impl Product {
    /// Landed cost of one unit: cost + tax + freight.
    #[inline]
    pub fn unit_cost(&self) -> Money {
        self.purchase_cost + self.purchase_tax + self.purchase_freight
    }

    /// Margin earned on one unit dispatched at `supply_price`.
    pub fn margin_at(&self, supply_price: Money) -> Money {
        supply_price - self.unit_cost()
    }
}

// =============================================================================
// Supplier
// =============================================================================

/// A supplier the business buys from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub tax_id: Option<String>,

    /// Derived: Σ totalAmount of counted invoices.
    #[serde(default)]
    pub total_volume: Money,

    /// Derived: totalVolume − counted payments, floored at 0.
    #[serde(default)]
    pub debt: Money,
}

impl Supplier {
    /// The reserved internal supplier that owns production, loss and
    /// adjustment invoices.
    pub fn local() -> Self {
        Self {
            id: LOCAL_SUPPLIER_ID.to_string(),
            name: "Local production".to_string(),
            tax_id: None,
            total_volume: Money::zero(),
            debt: Money::zero(),
        }
    }

    /// Whether this is the reserved `sup-local` supplier.
    pub fn is_local(&self) -> bool {
        self.id == LOCAL_SUPPLIER_ID
    }
}

// =============================================================================
// Store
// =============================================================================

/// Credit terms for a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default)]
    pub allows_credit: bool,

    /// Ceiling for `totalDebt + new cart`. Unset or zero means
    /// [`DEFAULT_MAX_DEBT_LIMIT`].
    #[serde(default)]
    pub max_debt_limit: Option<Money>,

    /// Days between dispatch and its due date.
    #[serde(default)]
    pub payment_term_days: i64,
}

impl StoreConfig {
    /// The limit that actually applies to this store.
    pub fn effective_max_debt_limit(&self) -> Money {
        self.effective_max_debt_limit_or(DEFAULT_MAX_DEBT_LIMIT)
    }

    /// Same as [`Self::effective_max_debt_limit`] with a caller-chosen fallback.
    pub fn effective_max_debt_limit_or(&self, fallback: Money) -> Money {
        match self.max_debt_limit {
            Some(limit) if !limit.is_zero() => limit,
            _ => fallback,
        }
    }
}

fn default_active() -> bool {
    true
}

/// A retail store that receives dispatches on credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: String,
    pub name: String,

    /// Display colour for the UI (e.g. `#3366ff`).
    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub config: StoreConfig,

    /// Derived. See [`crate::ledger::store`].
    #[serde(default)]
    pub total_debt: Money,

    /// Absent means active.
    #[serde(default = "default_active")]
    pub active: bool,
}

// =============================================================================
// Invoice
// =============================================================================

/// Derived payment state of an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum InvoiceStatus {
    Paid,
    Partial,
    #[default]
    Pending,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Pending => "pending",
        }
    }
}

/// One line of a supplier invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvoiceItem {
    pub product_id: String,

    /// Signed: loss invoices carry negative quantities.
    #[ts(type = "number")]
    pub quantity: i64,

    #[serde(default)]
    pub unit_cost: Money,
    #[serde(default)]
    pub unit_tax: Money,
    #[serde(default)]
    pub unit_freight: Money,

    /// `quantity × (unitCost + unitTax + unitFreight)`.
    #[serde(default)]
    pub total_item_cost: Money,
}

impl InvoiceItem {
    /// Builds a line and computes its total.
    pub fn new(
        product_id: impl Into<String>,
        quantity: i64,
        unit_cost: Money,
        unit_tax: Money,
        unit_freight: Money,
    ) -> Self {
        let total_item_cost = (unit_cost + unit_tax + unit_freight) * quantity;
        Self {
            product_id: product_id.into(),
            quantity,
            unit_cost,
            unit_tax,
            unit_freight,
            total_item_cost,
        }
    }

    /// Stored line total, or recomputed from the unit parts when it is zero.
    pub fn line_cost(&self) -> Money {
        if self.total_item_cost.is_zero() {
            (self.unit_cost + self.unit_tax + self.unit_freight) * self.quantity
        } else {
            self.total_item_cost
        }
    }
}

/// A supplier → business stock-in document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub supplier_id: String,
    pub invoice_number: String,

    #[ts(as = "String")]
    pub date: DateTime<Utc>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,

    pub items: Vec<InvoiceItem>,

    pub total_amount: Money,

    /// Derived. See [`crate::ledger::invoice`].
    #[serde(default)]
    pub amount_paid: Money,

    /// Derived. See [`crate::ledger::invoice`].
    #[serde(default)]
    pub status: InvoiceStatus,

    #[serde(default)]
    pub approval_status: ApprovalStatus,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub authorized_by: Option<String>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub authorized_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub rejection_reason: Option<String>,

    /// Set only on the mirror invoice of a manual stock adjustment.
    #[serde(default)]
    pub adjustment_id: Option<String>,
}

impl Invoice {
    /// Σ line costs.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(InvoiceItem::line_cost).sum()
    }

    /// Internal loss document: a `sup-local` invoice numbered `BAJA...`.
    pub fn is_loss(&self) -> bool {
        self.supplier_id == LOCAL_SUPPLIER_ID && self.invoice_number.starts_with(LOSS_INVOICE_PREFIX)
    }

    /// Whether this invoice mirrors a [`StockAdjustment`].
    pub fn mirrors_adjustment(&self) -> bool {
        self.adjustment_id.is_some()
    }
}

// =============================================================================
// Stock Dispatch
// =============================================================================

/// Lifecycle state of a dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DispatchStatus {
    #[default]
    Active,
    PartialReturn,
    Returned,
    Cancelled,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Active => "active",
            DispatchStatus::PartialReturn => "partial_return",
            DispatchStatus::Returned => "returned",
            DispatchStatus::Cancelled => "cancelled",
        }
    }
}

/// Why goods came back from a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReturnReason {
    /// Resalable. The only reason that puts units back in stock.
    GoodCondition,
    Damaged,
    Expired,
    Other,
}

impl ReturnReason {
    /// Only `good_condition` returns restore physical stock.
    pub fn restores_stock(&self) -> bool {
        matches!(self, ReturnReason::GoodCondition)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnReason::GoodCondition => "good_condition",
            ReturnReason::Damaged => "damaged",
            ReturnReason::Expired => "expired",
            ReturnReason::Other => "other",
        }
    }
}

/// One line of a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DispatchItem {
    pub product_id: String,

    #[ts(type = "number")]
    pub quantity: i64,

    pub unit_supply_price: Money,
}

impl DispatchItem {
    pub fn line_total(&self) -> Money {
        self.unit_supply_price * self.quantity
    }
}

/// Goods sent back from a store against a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductReturn {
    pub id: String,
    pub dispatch_id: String,
    pub product_id: String,

    #[ts(type = "number")]
    pub quantity: i64,

    pub reason: ReturnReason,

    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

/// How a dispatch was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationMode {
    /// Error reversal. The goods never left, stock comes back by exclusion.
    Administrative,
    /// Loss or theft write-off. Stock is removed for good.
    Siniestro,
}

impl CancellationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationMode::Administrative => "administrative",
            CancellationMode::Siniestro => "siniestro",
        }
    }
}

/// Who cancelled a dispatch, how and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub mode: CancellationMode,
    pub by: String,
    pub at: DateTime<Utc>,
}

/// A business → store stock-out document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDispatch {
    pub id: String,

    /// Human-readable sequential number (`DSP-000001`).
    pub dispatch_number: String,

    pub store_id: String,
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    pub items: Vec<DispatchItem>,

    #[serde(default)]
    pub returns: Vec<ProductReturn>,

    /// Stored total. Lenient: anything non-numeric reads back as `None`.
    #[serde(default, deserialize_with = "crate::money::deserialize_lenient")]
    pub total_amount: Option<Money>,

    #[serde(default)]
    pub status: DispatchStatus,

    #[serde(default)]
    pub approval_status: ApprovalStatus,

    #[serde(default)]
    pub print_count: u32,

    #[serde(default)]
    pub authorized_by: Option<String>,

    #[serde(default)]
    pub authorized_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub cancellation: Option<Cancellation>,

    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl StockDispatch {
    /// Σ quantity × unit supply price.
    pub fn lines_total(&self) -> Money {
        self.items.iter().map(DispatchItem::line_total).sum()
    }

    /// The stored total when it is present and non-zero, else the lines.
    pub fn effective_total(&self) -> Money {
        match self.total_amount {
            Some(total) if !total.is_zero() => total,
            _ => self.lines_total(),
        }
    }

    /// Units of `product_id` on the dispatch, over every line.
    pub fn dispatched_quantity(&self, product_id: &str) -> i64 {
        self.items
            .iter()
            .filter(|item| item.product_id == product_id)
            .map(|item| item.quantity)
            .sum()
    }

    /// Units of `product_id` returned, for any reason.
    pub fn returned_quantity(&self, product_id: &str) -> i64 {
        self.returns
            .iter()
            .filter(|ret| ret.product_id == product_id)
            .map(|ret| ret.quantity)
            .sum()
    }

    /// Units of `product_id` returned in good condition.
    pub fn restocked_quantity(&self, product_id: &str) -> i64 {
        self.returns
            .iter()
            .filter(|ret| ret.product_id == product_id && ret.reason.restores_stock())
            .map(|ret| ret.quantity)
            .sum()
    }

    /// Units of `product_id` still at the store.
    pub fn outstanding_quantity(&self, product_id: &str) -> i64 {
        self.dispatched_quantity(product_id) - self.returned_quantity(product_id)
    }

    /// Units returned for any reason, split over the lines in line order.
    pub fn returned_per_line(&self) -> Vec<i64> {
        self.allocate_per_line(|product_id| self.returned_quantity(product_id))
    }

    /// Units returned in good condition, split over the lines in line order.
    pub fn restocked_per_line(&self) -> Vec<i64> {
        self.allocate_per_line(|product_id| self.restocked_quantity(product_id))
    }

    /// Spreads a per-product count over the lines carrying that product.
    ///
    /// Earlier lines fill up to their own quantity first. Anything beyond the
    /// product's dispatched units stays on its last line.
    fn allocate_per_line(&self, total_of: impl Fn(&str) -> i64) -> Vec<i64> {
        let mut remaining: HashMap<&str, i64> = HashMap::new();
        let mut last_line: HashMap<&str, usize> = HashMap::new();
        let mut allocated = vec![0; self.items.len()];

        for (idx, item) in self.items.iter().enumerate() {
            let product_id = item.product_id.as_str();
            let left = remaining
                .entry(product_id)
                .or_insert_with(|| total_of(product_id));
            let take = (*left).min(item.quantity).max(0);
            allocated[idx] = take;
            *left -= take;
            last_line.insert(product_id, idx);
        }

        for (product_id, idx) in last_line {
            allocated[idx] += remaining.get(product_id).copied().unwrap_or(0).max(0);
        }
        allocated
    }

    /// True when every line has been returned in full.
    pub fn fully_returned(&self) -> bool {
        !self.items.is_empty()
            && self
                .items
                .iter()
                .all(|item| self.outstanding_quantity(&item.product_id) <= 0)
    }

    /// Whether the dispatch is past due at `now`.
    ///
    /// Only `active` dispatches can be overdue. Partially returned ones are
    /// treated as settled for this purpose.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status == DispatchStatus::Active
            && self.due_date.map(|due| due < now).unwrap_or(false)
    }
}

// =============================================================================
// Payments
// =============================================================================

/// Whether a payment still counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentStatus {
    #[default]
    Active,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Active => "active",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

/// Money received from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StorePayment {
    pub id: String,
    pub store_id: String,
    pub amount: Money,

    #[ts(as = "String")]
    pub date: DateTime<Utc>,

    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub reference: Option<String>,

    #[serde(default)]
    pub status: PaymentStatus,

    #[serde(default)]
    pub approval_status: ApprovalStatus,

    #[serde(default)]
    pub print_count: u32,

    #[serde(default)]
    pub authorized_by: Option<String>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub authorized_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub cancelled_by: Option<String>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Money paid to a supplier, optionally against one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SupplierPayment {
    pub id: String,
    pub supplier_id: String,

    #[serde(default)]
    pub invoice_id: Option<String>,

    pub amount: Money,

    #[ts(as = "String")]
    pub date: DateTime<Utc>,

    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub reference: Option<String>,

    #[serde(default)]
    pub status: PaymentStatus,

    #[serde(default)]
    pub approval_status: ApprovalStatus,

    #[serde(default)]
    pub authorized_by: Option<String>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub authorized_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub cancelled_by: Option<String>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// A payment counts when it is neither cancelled nor awaiting approval.
pub(crate) fn payment_counts(status: PaymentStatus, approval: ApprovalStatus) -> bool {
    status != PaymentStatus::Cancelled && approval.counts_toward_balances()
}

impl StorePayment {
    pub fn counts_toward_balances(&self) -> bool {
        payment_counts(self.status, self.approval_status)
    }
}

impl SupplierPayment {
    pub fn counts_toward_balances(&self) -> bool {
        payment_counts(self.status, self.approval_status)
    }
}

// =============================================================================
// Stock Adjustment
// =============================================================================

/// Manual stock correction. Positive is production/found stock, negative is
/// shrinkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockAdjustment {
    pub id: String,
    pub product_id: String,

    #[ts(type = "number")]
    pub quantity: i64,

    pub reason: String,

    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,

    /// The `sup-local` mirror invoice.
    #[serde(default)]
    pub invoice_id: Option<String>,
}

// =============================================================================
// Audit Log
// =============================================================================

/// What kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    /// Void of a dispatch or payment.
    #[serde(rename = "anular")]
    Void,
    /// A refused operation: failed pre-check or bad credential.
    Block,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Void => "anular",
            AuditAction::Block => "block",
        }
    }
}

/// Append-only record of a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuditLogEntry {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub action: AuditAction,
    pub entity: String,
    pub entity_id: String,
    pub details: String,

    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// Shape of a user record as it may be found in storage.
///
/// Older records carry a single `role` string instead of a `roles` list.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    id: String,
    username: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl From<StoredUser> for User {
    fn from(stored: StoredUser) -> Self {
        let mut roles = normalize_roles(stored.roles);
        if let Some(role) = stored.role {
            roles.extend(normalize_roles([role]));
        }
        User {
            id: stored.id,
            username: stored.username,
            name: stored.name,
            roles,
            password: stored.password.filter(|p| !p.is_empty()),
        }
    }
}

/// Trims and lowercases role tokens, dropping empty ones.
pub fn normalize_roles<I, S>(roles: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    roles
        .into_iter()
        .map(|role| role.as_ref().trim().to_lowercase())
        .filter(|role| !role.is_empty())
        .collect()
}

/// An operator of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredUser")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub roles: BTreeSet<String>,

    /// Plaintext (legacy) or an argon2 PHC string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Copy safe to persist in the session slot: no password.
    pub fn sanitized(&self) -> Self {
        Self {
            password: None,
            ..self.clone()
        }
    }

    /// Name to show in audit entries and stamps.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn dispatch(items: Vec<DispatchItem>) -> StockDispatch {
        StockDispatch {
            id: "d-1".to_string(),
            dispatch_number: "DSP-000001".to_string(),
            store_id: "st-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
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

    fn item(product_id: &str, quantity: i64, price: i64) -> DispatchItem {
        DispatchItem {
            product_id: product_id.to_string(),
            quantity,
            unit_supply_price: Money::from_cents(price),
        }
    }

    #[test]
    fn test_store_active_defaults_to_true() {
        let store: Store = serde_json::from_value(json!({
            "id": "st-1",
            "name": "Corner",
        }))
        .unwrap();
        assert!(store.active);
        assert_eq!(store.config.effective_max_debt_limit(), DEFAULT_MAX_DEBT_LIMIT);

        let store: Store = serde_json::from_value(json!({
            "id": "st-2",
            "name": "Closed",
            "active": false,
            "config": { "maxDebtLimit": 100000, "paymentTermDays": 15 }
        }))
        .unwrap();
        assert!(!store.active);
        assert_eq!(store.config.effective_max_debt_limit().cents(), 100000);
        assert_eq!(store.config.payment_term_days, 15);
    }

    #[test]
    fn test_missing_statuses_decode_as_defaults() {
        let payment: StorePayment = serde_json::from_value(json!({
            "id": "sp-1",
            "storeId": "st-1",
            "amount": 500,
            "date": "2024-03-01T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(payment.status, PaymentStatus::Active);
        assert_eq!(payment.approval_status, ApprovalStatus::Approved);
        assert!(payment.counts_toward_balances());
    }

    #[test]
    fn test_dispatch_total_lenient() {
        let mut value = serde_json::to_value(dispatch(vec![item("p-1", 3, 250)])).unwrap();
        value["totalAmount"] = json!("garbage");
        let decoded: StockDispatch = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(decoded.total_amount, None);
        assert_eq!(decoded.effective_total().cents(), 750);

        value["totalAmount"] = json!(0);
        let decoded: StockDispatch = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.effective_total().cents(), 750);
    }

    #[test]
    fn test_dispatch_quantities() {
        let mut d = dispatch(vec![item("p-1", 10, 100), item("p-2", 4, 50)]);
        d.returns.push(ProductReturn {
            id: "r-1".to_string(),
            dispatch_id: d.id.clone(),
            product_id: "p-1".to_string(),
            quantity: 3,
            reason: ReturnReason::GoodCondition,
            timestamp: d.timestamp,
        });
        d.returns.push(ProductReturn {
            id: "r-2".to_string(),
            dispatch_id: d.id.clone(),
            product_id: "p-1".to_string(),
            quantity: 2,
            reason: ReturnReason::Damaged,
            timestamp: d.timestamp,
        });

        assert_eq!(d.returned_quantity("p-1"), 5);
        assert_eq!(d.restocked_quantity("p-1"), 3);
        assert_eq!(d.outstanding_quantity("p-1"), 5);
        assert_eq!(d.outstanding_quantity("p-2"), 4);
        assert!(!d.fully_returned());
        assert_eq!(d.returned_per_line(), vec![5, 0]);
        assert_eq!(d.restocked_per_line(), vec![3, 0]);
    }

    #[test]
    fn test_returns_fill_split_lines_in_order() {
        let mut d = dispatch(vec![item("p-1", 2, 1_000), item("p-2", 1, 50), item("p-1", 3, 1_200)]);
        d.returns.push(ProductReturn {
            id: "r-1".to_string(),
            dispatch_id: d.id.clone(),
            product_id: "p-1".to_string(),
            quantity: 4,
            reason: ReturnReason::GoodCondition,
            timestamp: d.timestamp,
        });

        assert_eq!(d.returned_per_line(), vec![2, 0, 2]);
        assert_eq!(d.restocked_per_line(), vec![2, 0, 2]);
        assert_eq!(d.outstanding_quantity("p-1"), 1);
    }

    #[test]
    fn test_overdue_only_for_active() {
        let mut d = dispatch(vec![item("p-1", 1, 100)]);
        let now = d.timestamp + Duration::days(40);
        d.due_date = Some(d.timestamp + Duration::days(30));
        assert!(d.is_overdue_at(now));

        d.status = DispatchStatus::PartialReturn;
        assert!(!d.is_overdue_at(now));

        d.status = DispatchStatus::Active;
        d.due_date = None;
        assert!(!d.is_overdue_at(now));
    }

    #[test]
    fn test_audit_action_void_is_anular() {
        assert_eq!(serde_json::to_string(&AuditAction::Void).unwrap(), "\"anular\"");
        let action: AuditAction = serde_json::from_str("\"block\"").unwrap();
        assert_eq!(action, AuditAction::Block);
    }

    #[test]
    fn test_legacy_role_migrates_to_roles() {
        let user: User = serde_json::from_value(json!({
            "id": "u-1",
            "username": "ana",
            "name": "Ana",
            "role": " Admin ",
            "password": "1234"
        }))
        .unwrap();
        assert!(user.is_admin());
        assert_eq!(user.roles.len(), 1);

        let sanitized = user.sanitized();
        let value = serde_json::to_value(&sanitized).unwrap();
        assert!(value.get("password").is_none());
        assert!(value.get("role").is_none());
        assert_eq!(value["roles"], json!(["admin"]));
    }

    #[test]
    fn test_invoice_loss_detection() {
        let invoice = Invoice {
            id: "i-1".to_string(),
            supplier_id: LOCAL_SUPPLIER_ID.to_string(),
            invoice_number: "BAJA-SIN-DSP-000001".to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            due_date: None,
            items: vec![InvoiceItem::new(
                "p-1",
                -20,
                Money::from_cents(200),
                Money::zero(),
                Money::zero(),
            )],
            total_amount: Money::from_cents(-4000),
            amount_paid: Money::zero(),
            status: InvoiceStatus::Pending,
            approval_status: ApprovalStatus::Approved,
            notes: None,
            authorized_by: None,
            authorized_at: None,
            rejection_reason: None,
            adjustment_id: None,
        };
        assert!(invoice.is_loss());
        assert_eq!(invoice.items_total().cents(), -4000);
    }
}
