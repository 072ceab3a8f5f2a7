//! Manual stock adjustments.
//!
//! Each adjustment writes two documents: the adjustment itself, which moves
//! stock, and a `sup-local` mirror invoice that keeps the movement visible
//! on the supplier side. The mirror is skipped by the stock projection. A
//! loss mirror is numbered `BAJA-…` and so feeds `totalLosses`.
//!
//! Losses need an admin secret; gains do not.

use depot_core::ledger::mirror::adjustment_invoice;
use depot_core::validation::{validate_adjustment_quantity, validate_name};
use depot_core::{AuditAction, StockAdjustment};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::cents;
use crate::engine::Depot;
use crate::error::OpsResult;

impl Depot {
    /// Moves the stock of `product_id` by `quantity` (negative for a loss).
    ///
    /// Returns `Ok(None)` if the product does not exist.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        quantity: i64,
        reason: &str,
    ) -> OpsResult<Option<StockAdjustment>> {
        validate_adjustment_quantity(quantity)?;
        validate_name("reason", reason)?;

        let Some(product) = self.db.products().get(product_id).await? else {
            return Ok(None);
        };

        if quantity < 0 {
            self.authorize(
                &format!("write off {} of {}", -quantity, product.name),
                "product",
                product_id,
            )
            .await?;
        }

        let mut adjustment = StockAdjustment {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            quantity,
            reason: reason.trim().to_string(),
            timestamp: self.now(),
            invoice_id: None,
        };
        let mirror = adjustment_invoice(&Uuid::new_v4().to_string(), &adjustment, &product);
        adjustment.invoice_id = Some(mirror.id.clone());

        self.db.adjustments().add(&adjustment).await?;
        self.db.invoices().add(&mirror).await?;

        info!(
            product = %product.name,
            quantity,
            invoice = %mirror.invoice_number,
            "Stock adjusted"
        );
        self.log(
            AuditAction::Create,
            "stock_adjustment",
            &adjustment.id,
            json!({
                "productId": product_id,
                "quantity": quantity,
                "reason": adjustment.reason,
                "invoiceNumber": mirror.invoice_number,
                "totalAmount": cents(mirror.total_amount),
            }),
        )
        .await?;

        Ok(Some(adjustment))
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::testing::{depot, ADMIN_SECRET};
    use crate::error::OpsError;
    use crate::gate::scripted::Answer;
    use depot_core::Money;

    #[tokio::test]
    async fn test_gain_is_ungated() {
        let (depot, seen) = depot(vec![]).await;

        let adjustment = depot.adjust_stock("p-x", 5, "found in back room").await.unwrap().unwrap();
        assert!(seen.lock().unwrap().is_empty());

        let mirror = depot
            .db()
            .invoices()
            .get(adjustment.invoice_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(mirror.invoice_number.starts_with("VIRT-"));
        assert_eq!(mirror.adjustment_id.as_deref(), Some(adjustment.id.as_str()));

        // The mirror must not count twice.
        let (_, projections) = depot.ledger().await.unwrap();
        assert_eq!(projections.stock_of("p-x"), 15);
        assert_eq!(projections.profit.total_losses, Money::zero());
    }

    #[tokio::test]
    async fn test_loss_is_gated_and_feeds_losses() {
        let (depot, seen) = depot(vec![Answer::Text(ADMIN_SECRET)]).await;

        depot.adjust_stock("p-x", -4, "broken").await.unwrap().unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        let (_, projections) = depot.ledger().await.unwrap();
        assert_eq!(projections.stock_of("p-x"), 6);
        assert_eq!(projections.profit.total_losses, Money::from_cents(400));
        assert_eq!(projections.profit.net_profit, Money::from_cents(-400));
    }

    #[tokio::test]
    async fn test_refused_loss_writes_nothing() {
        let (depot, _) = depot(vec![Answer::Text("nope"), Answer::Dismiss]).await;

        let denied = depot.adjust_stock("p-x", -4, "broken").await.unwrap_err();
        assert!(matches!(denied, OpsError::Unauthorized { .. }));
        let dismissed = depot.adjust_stock("p-x", -4, "broken").await.unwrap_err();
        assert!(dismissed.is_cancelled());

        assert_eq!(depot.db().adjustments().count().await.unwrap(), 0);
        assert_eq!(depot.db().invoices().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_product_and_bad_input() {
        let (depot, seen) = depot(vec![]).await;

        assert!(depot.adjust_stock("nope", -3, "broken").await.unwrap().is_none());
        assert!(seen.lock().unwrap().is_empty());

        assert!(depot.adjust_stock("p-x", 0, "count").await.is_err());
        assert!(depot.adjust_stock("p-x", 2, " ").await.is_err());
    }
}
