//! # Collections
//!
//! Names of the keyed collections and the [`Document`] trait that binds a
//! core type to its collection.
//!
//! | Collection         | Document type       | Deletable? |
//! |--------------------|---------------------|------------|
//! | `products`         | `Product`           | stock 0    |
//! | `suppliers`        | `Supplier`          | debt 0     |
//! | `stores`           | `Store`             | debt 0     |
//! | `invoices`         | `Invoice`           | no         |
//! | `dispatches`       | `StockDispatch`     | no         |
//! | `storePayments`    | `StorePayment`      | no         |
//! | `supplierPayments` | `SupplierPayment`   | no         |
//! | `stockAdjustments` | `StockAdjustment`   | no         |
//! | `auditLogs`        | `AuditLogEntry`     | no         |
//! | `users`            | `User`              | yes        |
//! | `settings`         | key → value map     | n/a        |
//!
//! The deletion rules are enforced by depot-ops, not here.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use depot_core::{
    AuditLogEntry, Invoice, Product, StockAdjustment, StockDispatch, Store, StorePayment,
    Supplier, SupplierPayment, User,
};

use crate::error::DbError;

/// A named collection in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Products,
    Suppliers,
    Stores,
    Invoices,
    Dispatches,
    StorePayments,
    SupplierPayments,
    StockAdjustments,
    AuditLogs,
    Users,
    Settings,
}

impl Collection {
    /// Every collection, in backup order.
    pub const ALL: [Collection; 11] = [
        Collection::Products,
        Collection::Suppliers,
        Collection::Stores,
        Collection::Invoices,
        Collection::Dispatches,
        Collection::StorePayments,
        Collection::SupplierPayments,
        Collection::StockAdjustments,
        Collection::AuditLogs,
        Collection::Users,
        Collection::Settings,
    ];

    /// Collections the ledger projections read.
    pub const LEDGER: [Collection; 8] = [
        Collection::Products,
        Collection::Suppliers,
        Collection::Stores,
        Collection::Invoices,
        Collection::Dispatches,
        Collection::StorePayments,
        Collection::SupplierPayments,
        Collection::StockAdjustments,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Suppliers => "suppliers",
            Collection::Stores => "stores",
            Collection::Invoices => "invoices",
            Collection::Dispatches => "dispatches",
            Collection::StorePayments => "storePayments",
            Collection::SupplierPayments => "supplierPayments",
            Collection::StockAdjustments => "stockAdjustments",
            Collection::AuditLogs => "auditLogs",
            Collection::Users => "users",
            Collection::Settings => "settings",
        }
    }

    /// Whether a change here invalidates the ledger projections.
    pub fn affects_ledger(&self) -> bool {
        Self::LEDGER.contains(self)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| DbError::UnknownCollection(s.to_string()))
    }
}

// =============================================================================
// Document Trait
// =============================================================================

/// A type stored as a JSON body in one collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

macro_rules! document {
    ($ty:ty, $collection:expr) => {
        impl Document for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

document!(Product, Collection::Products);
document!(Supplier, Collection::Suppliers);
document!(Store, Collection::Stores);
document!(Invoice, Collection::Invoices);
document!(StockDispatch, Collection::Dispatches);
document!(StorePayment, Collection::StorePayments);
document!(SupplierPayment, Collection::SupplierPayments);
document!(StockAdjustment, Collection::StockAdjustments);
document!(AuditLogEntry, Collection::AuditLogs);
document!(User, Collection::Users);
