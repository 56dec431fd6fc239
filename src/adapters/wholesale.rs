//! Wholesale (B2B) adapter.
//!
//! Wholesale rows reference a client organization instead of a customer and
//! conventionally resolve to `Delivered` - every wholesale order bears a
//! delivery leg.

use serde_json::Value;
use tracing::trace;

use super::{
    optional_str, require_amount, require_str, timestamp_or_epoch, SourceAdapter,
};
use crate::error::NormalizationError;
use crate::orders::{
    CanonicalOrder, Counterparty, OrderId, OrderSource, OrderStatus, OrganizationId, SourceRef,
    TenantId,
};

/// Adapter for the `wholesale_orders` table.
pub struct WholesaleAdapter;

impl WholesaleAdapter {
    fn map_status(raw: &str) -> (OrderStatus, bool) {
        let status = match raw {
            "pending" | "new" | "submitted" => OrderStatus::Pending,
            "confirmed" => OrderStatus::Confirmed,
            "processing" => OrderStatus::Processing,
            "out_for_delivery" => OrderStatus::InTransit,
            "delivered" => OrderStatus::Delivered,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "rejected" => OrderStatus::Rejected,
            "refunded" => OrderStatus::Refunded,
            unknown => {
                trace!(status = unknown, "unmapped wholesale status, flagging for review");
                return (OrderStatus::Pending, true);
            }
        };
        (status, false)
    }
}

impl SourceAdapter for WholesaleAdapter {
    fn source(&self) -> OrderSource {
        OrderSource::Wholesale
    }

    fn normalize(
        &self,
        tenant: &TenantId,
        row: &Value,
    ) -> Result<CanonicalOrder, NormalizationError> {
        let row_id = self.row_key(row)?;
        let total_amount = require_amount(row, "total_amount")?;
        let client = require_str(row, "client_id")?;
        let (status, needs_review) = match optional_str(row, "status") {
            Some(raw) => Self::map_status(&raw),
            None => (OrderStatus::Pending, true),
        };

        let source_ref = SourceRef::new(self.table(), &row_id);
        Ok(CanonicalOrder {
            id: OrderId::from_ref(&source_ref),
            tenant_id: tenant.clone(),
            source: OrderSource::Wholesale,
            order_number: optional_str(row, "po_number")
                .unwrap_or_else(|| format!("W-{}", row_id)),
            status,
            total_amount,
            counterparty: Counterparty::Organization(OrganizationId::new(client)),
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
    fn test_normalize_references_organization() {
        let row = json!({
            "id": "po-118",
            "po_number": "PO-2026-118",
            "status": "submitted",
            "total_amount": "500.00",
            "client_id": "org-acme",
        });

        let order = WholesaleAdapter.normalize(&tenant(), &row).unwrap();
        assert_eq!(order.id.as_str(), "wholesale_orders:po-118");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, dec!(500.00));
        assert!(order.counterparty.is_organization());
        assert_eq!(order.order_number, "PO-2026-118");
    }

    #[test]
    fn test_missing_client_rejects_row() {
        let row = json!({"id": 1, "status": "pending", "total_amount": "500"});
        assert_eq!(
            WholesaleAdapter.normalize(&tenant(), &row),
            Err(NormalizationError::missing("client_id"))
        );
    }

    #[test]
    fn test_conventional_terminal_is_delivered() {
        let (status, _) = WholesaleAdapter::map_status("delivered");
        assert_eq!(status, OrderStatus::Delivered);
        assert_eq!(
            WholesaleAdapter.source_status(OrderStatus::Delivered),
            "delivered"
        );
    }

    #[test]
    fn test_status_round_trip() {
        for status in OrderStatus::ALL {
            let raw = WholesaleAdapter.source_status(status);
            let (mapped, flagged) = WholesaleAdapter::map_status(raw);
            assert_eq!(mapped, status);
            assert!(!flagged);
        }
    }
}
