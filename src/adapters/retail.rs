//! Retail storefront adapter.
//!
//! Retail rows describe online orders shipped to a customer, so the source
//! vocabulary includes the delivery leg (`out_for_delivery`, `delivered`).

use serde_json::Value;
use tracing::trace;

use super::{
    optional_str, require_amount, require_str, timestamp_or_epoch, SourceAdapter,
};
use crate::error::NormalizationError;
use crate::orders::{
    CanonicalOrder, Counterparty, CustomerId, OrderId, OrderSource, OrderStatus, SourceRef,
    TenantId,
};

/// Adapter for the `retail_orders` table.
pub struct RetailAdapter;

impl RetailAdapter {
    /// Fixed mapping from the retail status vocabulary into the shared
    /// lifecycle. Unknown statuses coerce to `Pending` and are flagged.
    fn map_status(raw: &str) -> (OrderStatus, bool) {
        let status = match raw {
            "pending" | "new" => OrderStatus::Pending,
            "confirmed" => OrderStatus::Confirmed,
            "processing" => OrderStatus::Processing,
            "ready_for_pickup" => OrderStatus::Processing,
            "out_for_delivery" => OrderStatus::InTransit,
            "delivered" => OrderStatus::Delivered,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "rejected" => OrderStatus::Rejected,
            "refunded" => OrderStatus::Refunded,
            unknown => {
                trace!(status = unknown, "unmapped retail status, flagging for review");
                return (OrderStatus::Pending, true);
            }
        };
        (status, false)
    }
}

impl SourceAdapter for RetailAdapter {
    fn source(&self) -> OrderSource {
        OrderSource::Retail
    }

    fn normalize(
        &self,
        tenant: &TenantId,
        row: &Value,
    ) -> Result<CanonicalOrder, NormalizationError> {
        let row_id = self.row_key(row)?;
        let total_amount = require_amount(row, "total_amount")?;
        let customer = require_str(row, "customer_id")?;
        let (status, needs_review) = match optional_str(row, "status") {
            Some(raw) => Self::map_status(&raw),
            None => (OrderStatus::Pending, true),
        };

        let source_ref = SourceRef::new(self.table(), &row_id);
        Ok(CanonicalOrder {
            id: OrderId::from_ref(&source_ref),
            tenant_id: tenant.clone(),
            source: OrderSource::Retail,
            order_number: optional_str(row, "order_number")
                .unwrap_or_else(|| format!("R-{}", row_id)),
            status,
            total_amount,
            counterparty: Counterparty::Customer(CustomerId::new(customer)),
            created_at: timestamp_or_epoch(row, "created_at"),
            updated_at: timestamp_or_epoch(row, "updated_at"),
            source_ref,
            needs_review,
        })
    }

    fn source_status(&self, status: OrderStatus) -> &'static str {
        match status {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::InTransit => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Refunded => "refunded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn tenant() -> TenantId {
        TenantId::new("tenant-1")
    }

    #[test]
    fn test_normalize_full_row() {
        let row = json!({
            "id": 7,
            "order_number": "R-2041",
            "status": "out_for_delivery",
            "total_amount": "64.50",
            "customer_id": "cust-11",
            "created_at": "2026-03-01T10:00:00Z",
            "updated_at": "2026-03-01T10:30:00Z",
        });

        let order = RetailAdapter.normalize(&tenant(), &row).unwrap();
        assert_eq!(order.id.as_str(), "retail_orders:7");
        assert_eq!(order.source, OrderSource::Retail);
        assert_eq!(order.status, OrderStatus::InTransit);
        assert_eq!(order.total_amount, dec!(64.50));
        assert!(order.counterparty.is_customer());
        assert!(!order.needs_review);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let row = json!({
            "id": "7",
            "status": "pending",
            "total_amount": "10.00",
            "customer_id": "cust-1",
        });

        let first = RetailAdapter.normalize(&tenant(), &row).unwrap();
        let second = RetailAdapter.normalize(&tenant(), &row).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_amount_rejects_row() {
        let row = json!({"id": 7, "status": "pending", "customer_id": "cust-1"});
        assert_eq!(
            RetailAdapter.normalize(&tenant(), &row),
            Err(NormalizationError::missing("total_amount"))
        );
    }

    #[test]
    fn test_missing_counterparty_rejects_row() {
        let row = json!({"id": 7, "status": "pending", "total_amount": "5"});
        assert_eq!(
            RetailAdapter.normalize(&tenant(), &row),
            Err(NormalizationError::missing("customer_id"))
        );
    }

    #[test]
    fn test_unknown_status_flags_for_review() {
        let row = json!({
            "id": 7,
            "status": "awaiting_carrier",
            "total_amount": "5",
            "customer_id": "cust-1",
        });

        let order = RetailAdapter.normalize(&tenant(), &row).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.needs_review);
    }

    #[test]
    fn test_status_round_trip() {
        for status in OrderStatus::ALL {
            let raw = RetailAdapter.source_status(status);
            let (mapped, flagged) = RetailAdapter::map_status(raw);
            assert_eq!(mapped, status);
            assert!(!flagged);
        }
    }
}
