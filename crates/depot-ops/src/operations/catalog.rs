//! # Catalog
//!
//! Products, suppliers and stores.
//!
//! ## Updates
//! A patch is a JSON object merged key by key over the stored record. The
//! merged record is validated before anything is written. `id` and derived
//! fields (`stock`, `debt`, `totalVolume`, `totalDebt`) are never taken
//! from a patch.
//!
//! ## Delete Guards
//! | Entity   | Refused when                         |
//! |----------|--------------------------------------|
//! | product  | projected stock is not zero          |
//! | supplier | it is `sup-local`, or still owed     |
//! | store    | it still owes anything               |
//!
//! A delete that passes its guard still asks for confirmation.

use depot_core::validation::{
    validate_color, validate_name, validate_payment_term_days, validate_price,
};
use depot_core::{
    AuditAction, CoreError, Money, Product, Store, StoreConfig, Supplier, LOCAL_SUPPLIER_ID,
};
use depot_db::repository::documents::shallow_merge;
use depot_db::Document;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::engine::Depot;
use crate::error::{OpsError, OpsResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub purchase_cost: Money,
    #[serde(default)]
    pub purchase_tax: Money,
    #[serde(default)]
    pub purchase_freight: Money,
    #[serde(default)]
    pub supply_price: Money,
    #[serde(default)]
    pub retail_price: Money,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub max_stock: i64,
    #[serde(default)]
    pub supplier_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStore {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub config: StoreConfig,
}

fn validate_product(product: &Product) -> OpsResult<()> {
    validate_name("name", &product.name)?;
    validate_price("purchaseCost", product.purchase_cost)?;
    validate_price("purchaseTax", product.purchase_tax)?;
    validate_price("purchaseFreight", product.purchase_freight)?;
    validate_price("supplyPrice", product.supply_price)?;
    validate_price("retailPrice", product.retail_price)?;
    Ok(())
}

fn validate_supplier(supplier: &Supplier) -> OpsResult<()> {
    validate_name("name", &supplier.name)?;
    Ok(())
}

fn validate_store(store: &Store) -> OpsResult<()> {
    validate_name("name", &store.name)?;
    validate_color(store.color.as_deref())?;
    validate_payment_term_days(store.config.payment_term_days)?;
    if let Some(limit) = store.config.max_debt_limit {
        validate_price("maxDebtLimit", limit)?;
    }
    Ok(())
}

impl Depot {
    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(&self, new: NewProduct) -> OpsResult<Product> {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            purchase_cost: new.purchase_cost,
            purchase_tax: new.purchase_tax,
            purchase_freight: new.purchase_freight,
            supply_price: new.supply_price,
            retail_price: new.retail_price,
            stock: 0,
            min_stock: new.min_stock,
            max_stock: new.max_stock,
            supplier_id: new.supplier_id,
        };
        validate_product(&product)?;

        self.db.products().add(&product).await?;
        info!(product = %product.name, "Product created");
        self.log(AuditAction::Create, "product", &product.id, json!({ "name": product.name }))
            .await?;
        Ok(product)
    }

    pub async fn update_product(&self, id: &str, patch: &Value) -> OpsResult<Option<Product>> {
        self.patch_record(id, patch, &["stock"], validate_product).await
    }

    /// Returns `Ok(false)` if there is no such product.
    pub async fn delete_product(&self, id: &str) -> OpsResult<bool> {
        let Some(product) = self.db.products().get(id).await? else {
            return Ok(false);
        };

        let (_, projections) = self.ledger().await?;
        let stock = projections.stock_of(id);
        if stock != 0 {
            return Err(CoreError::OutstandingBalance {
                entity: "product".to_string(),
                id: id.to_string(),
                balance: format!("{stock} units"),
            }
            .into());
        }

        self.confirm_delete("product", &product.name).await?;
        self.remove_record::<Product>(id, &product.name).await
    }

    // =========================================================================
    // Suppliers
    // =========================================================================

    pub async fn create_supplier(&self, new: NewSupplier) -> OpsResult<Supplier> {
        let supplier = Supplier {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            tax_id: new.tax_id,
            total_volume: Money::zero(),
            debt: Money::zero(),
        };
        validate_supplier(&supplier)?;

        self.db.suppliers().add(&supplier).await?;
        info!(supplier = %supplier.name, "Supplier created");
        self.log(AuditAction::Create, "supplier", &supplier.id, json!({ "name": supplier.name }))
            .await?;
        Ok(supplier)
    }

    pub async fn update_supplier(&self, id: &str, patch: &Value) -> OpsResult<Option<Supplier>> {
        self.patch_record(id, patch, &["totalVolume", "debt"], validate_supplier)
            .await
    }

    /// Returns `Ok(false)` if there is no such supplier.
    ///
    /// ## Errors
    /// - [`CoreError::ReservedEntity`] for `sup-local`
    /// - [`CoreError::OutstandingBalance`] while the supplier is still owed
    pub async fn delete_supplier(&self, id: &str) -> OpsResult<bool> {
        if id == LOCAL_SUPPLIER_ID {
            return Err(CoreError::ReservedEntity(LOCAL_SUPPLIER_ID.to_string()).into());
        }
        let Some(supplier) = self.db.suppliers().get(id).await? else {
            return Ok(false);
        };

        let (_, projections) = self.ledger().await?;
        let debt = projections.supplier_debt(id);
        if !debt.is_zero() {
            return Err(CoreError::OutstandingBalance {
                entity: "supplier".to_string(),
                id: id.to_string(),
                balance: debt.to_string(),
            }
            .into());
        }

        self.confirm_delete("supplier", &supplier.name).await?;
        self.remove_record::<Supplier>(id, &supplier.name).await
    }

    // =========================================================================
    // Stores
    // =========================================================================

    pub async fn create_store(&self, new: NewStore) -> OpsResult<Store> {
        let store = Store {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            color: new.color,
            config: new.config,
            total_debt: Money::zero(),
            active: true,
        };
        validate_store(&store)?;

        self.db.stores().add(&store).await?;
        info!(store = %store.name, "Store created");
        self.log(
            AuditAction::Create,
            "store",
            &store.id,
            json!({ "name": store.name, "config": store.config }),
        )
        .await?;
        Ok(store)
    }

    pub async fn update_store(&self, id: &str, patch: &Value) -> OpsResult<Option<Store>> {
        self.patch_record(id, patch, &["totalDebt"], validate_store).await
    }

    /// Returns `Ok(false)` if there is no such store.
    pub async fn delete_store(&self, id: &str) -> OpsResult<bool> {
        let Some(store) = self.db.stores().get(id).await? else {
            return Ok(false);
        };

        let (_, projections) = self.ledger().await?;
        let debt = projections.store_debt(id);
        if !debt.is_zero() {
            return Err(CoreError::OutstandingBalance {
                entity: "store".to_string(),
                id: id.to_string(),
                balance: debt.to_string(),
            }
            .into());
        }

        self.confirm_delete("store", &store.name).await?;
        self.remove_record::<Store>(id, &store.name).await
    }

    // =========================================================================
    // Shared
    // =========================================================================

    async fn patch_record<T, V>(
        &self,
        id: &str,
        patch: &Value,
        derived: &[&str],
        validate: V,
    ) -> OpsResult<Option<T>>
    where
        T: Document,
        V: Fn(&T) -> OpsResult<()>,
    {
        let repo = self.db.documents::<T>();
        let Some(mut body) = repo.get_raw(id).await? else {
            return Ok(None);
        };

        let mut patch = patch.clone();
        if let Some(fields) = patch.as_object_mut() {
            fields.remove("id");
            for key in derived {
                fields.remove(*key);
            }
        }
        if !shallow_merge(&mut body, &patch) {
            return Err(depot_db::DbError::InvalidPatch {
                collection: T::COLLECTION.to_string(),
                id: id.to_string(),
                reason: "patch must be a JSON object".to_string(),
            }
            .into());
        }

        let record: T = serde_json::from_value(body).map_err(|e| depot_db::DbError::InvalidPatch {
            collection: T::COLLECTION.to_string(),
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        validate(&record)?;

        repo.put(&record).await?;

        let entity = T::COLLECTION.name().trim_end_matches('s');
        info!(entity, id = %id, "Record updated");
        self.log(AuditAction::Update, entity, id, patch).await?;
        Ok(Some(record))
    }

    async fn confirm_delete(&self, entity: &str, name: &str) -> OpsResult<()> {
        let confirmed = self
            .gate
            .confirm(&format!("Delete {entity}"), &format!("Delete {entity} \"{name}\"?"))
            .await;
        if confirmed {
            Ok(())
        } else {
            Err(OpsError::cancelled(format!("delete {entity}")))
        }
    }

    async fn remove_record<T: Document>(&self, id: &str, name: &str) -> OpsResult<bool> {
        let deleted = self.db.documents::<T>().delete(id).await?;
        if deleted {
            let entity = T::COLLECTION.name().trim_end_matches('s');
            info!(entity, id = %id, "Record deleted");
            self.log(AuditAction::Delete, entity, id, json!({ "name": name })).await?;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::depot;
    use crate::gate::scripted::Answer;
    use depot_core::ValidationError;

    #[tokio::test]
    async fn test_create_and_patch_product() {
        let (depot, _) = depot(vec![]).await;

        let product = depot
            .create_product(NewProduct {
                name: " Rice 1kg ".to_string(),
                purchase_cost: Money::from_cents(80),
                supply_price: Money::from_cents(120),
                ..NewProduct::default()
            })
            .await
            .unwrap();
        assert_eq!(product.name, "Rice 1kg");

        let patched = depot
            .update_product(&product.id, &json!({ "supplyPrice": 150, "stock": 99, "id": "hijack" }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patched.id, product.id);
        assert_eq!(patched.supply_price, Money::from_cents(150));
        assert_eq!(patched.purchase_cost, Money::from_cents(80));
        assert_eq!(patched.stock, 0);

        let audit = depot.audit().for_entity("product", &product.id).await.unwrap();
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[1].action, AuditAction::Update);
    }

    #[tokio::test]
    async fn test_invalid_patch_writes_nothing() {
        let (depot, _) = depot(vec![]).await;

        let err = depot
            .update_store("st-1", &json!({ "color": "red" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OpsError::Core(CoreError::Validation(ValidationError::InvalidFormat { .. }))
        ));
        assert!(depot.update_store("st-1", &json!("nope")).await.is_err());

        let store = depot.db().stores().get("st-1").await.unwrap().unwrap();
        assert_eq!(store.color, None);
        assert!(depot.update_store("missing", &json!({})).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_create_and_deactivate() {
        let (depot, _) = depot(vec![]).await;

        let store = depot
            .create_store(NewStore {
                name: "North".to_string(),
                color: Some("#1a2b3c".to_string()),
                config: StoreConfig {
                    allows_credit: true,
                    max_debt_limit: Some(Money::from_cents(50_000)),
                    payment_term_days: 15,
                },
            })
            .await
            .unwrap();
        assert!(store.active);

        let inactive = depot
            .update_store(&store.id, &json!({ "active": false }))
            .await
            .unwrap()
            .unwrap();
        assert!(!inactive.active);
        assert_eq!(inactive.config.payment_term_days, 15);

        assert!(depot
            .create_store(NewStore {
                name: "Bad".to_string(),
                config: StoreConfig {
                    payment_term_days: 400,
                    ..StoreConfig::default()
                },
                ..NewStore::default()
            })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_guards() {
        let (depot, _) = depot(vec![]).await;

        let stocked = depot.delete_product("p-x").await.unwrap_err();
        assert!(matches!(stocked, OpsError::Core(CoreError::OutstandingBalance { .. })));

        let owed = depot.delete_supplier("s-1").await.unwrap_err();
        assert!(matches!(owed, OpsError::Core(CoreError::OutstandingBalance { .. })));

        let reserved = depot.delete_supplier(LOCAL_SUPPLIER_ID).await.unwrap_err();
        assert!(matches!(reserved, OpsError::Core(CoreError::ReservedEntity(_))));

        assert!(!depot.delete_store("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_with_debt_cannot_be_deleted() {
        let (depot, _) = depot(vec![]).await;
        depot
            .create_dispatch(crate::operations::dispatch::NewDispatch {
                store_id: "st-1".to_string(),
                items: vec![depot_core::ledger::fixtures::dispatch_line("p-x", 1, 1_000)],
                timestamp: None,
            })
            .await
            .unwrap();

        let err = depot.delete_store("st-1").await.unwrap_err();
        assert!(matches!(err, OpsError::Core(CoreError::OutstandingBalance { .. })));
    }

    #[tokio::test]
    async fn test_delete_asks_for_confirmation() {
        let (depot, seen) = depot(vec![Answer::No, Answer::Yes]).await;
        let supplier = depot
            .create_supplier(NewSupplier {
                name: "Acme".to_string(),
                tax_id: None,
            })
            .await
            .unwrap();

        let declined = depot.delete_supplier(&supplier.id).await.unwrap_err();
        assert!(declined.is_cancelled());
        assert!(depot.db().suppliers().get(&supplier.id).await.unwrap().is_some());

        assert!(depot.delete_supplier(&supplier.id).await.unwrap());
        assert!(depot.db().suppliers().get(&supplier.id).await.unwrap().is_none());
        assert_eq!(seen.lock().unwrap().len(), 2);

        let audit = depot.audit().for_entity("supplier", &supplier.id).await.unwrap();
        assert_eq!(audit.last().map(|e| e.action), Some(AuditAction::Delete));
    }
}
