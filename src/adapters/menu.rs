//! Menu/kiosk adapter.
//!
//! Kitchen-facing vocabulary: `preparing` and `ready`/`ready_for_pickup` are
//! both stages of processing, and tickets usually finish at the counter as
//! `completed`.

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

/// Adapter for the `menu_orders` table.
pub struct MenuAdapter;

impl MenuAdapter {
    fn map_status(raw: &str) -> (OrderStatus, bool) {
        let status = match raw {
            "pending" | "new" => OrderStatus::Pending,
            "confirmed" => OrderStatus::Confirmed,
            "preparing" => OrderStatus::Processing,
            "ready" | "ready_for_pickup" => OrderStatus::Processing,
            "out_for_delivery" => OrderStatus::InTransit,
            "delivered" => OrderStatus::Delivered,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "rejected" => OrderStatus::Rejected,
            "refunded" => OrderStatus::Refunded,
            unknown => {
                trace!(status = unknown, "unmapped menu status, flagging for review");
                return (OrderStatus::Pending, true);
            }
        };
        (status, false)
    }
}

impl SourceAdapter for MenuAdapter {
    fn source(&self) -> OrderSource {
        OrderSource::Menu
    }

    fn normalize(
        &self,
        tenant: &TenantId,
        row: &Value,
    ) -> Result<CanonicalOrder, NormalizationError> {
        let row_id = self.row_key(row)?;
        let total_amount = require_amount(row, "total")?;
        let customer = require_str(row, "customer_id")?;
        let (status, needs_review) = match optional_str(row, "status") {
            Some(raw) => Self::map_status(&raw),
            None => (OrderStatus::Pending, true),
        };

        let source_ref = SourceRef::new(self.table(), &row_id);
        Ok(CanonicalOrder {
            id: OrderId::from_ref(&source_ref),
            tenant_id: tenant.clone(),
            source: OrderSource::Menu,
            order_number: optional_str(row, "ticket_number")
                .unwrap_or_else(|| format!("M-{}", row_id)),
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
            OrderStatus::Processing => "preparing",
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
    fn test_preparing_and_ready_both_map_to_processing() {
        assert_eq!(
            MenuAdapter::map_status("preparing"),
            (OrderStatus::Processing, false)
        );
        assert_eq!(
            MenuAdapter::map_status("ready_for_pickup"),
            (OrderStatus::Processing, false)
        );
        assert_eq!(
            MenuAdapter::map_status("ready"),
            (OrderStatus::Processing, false)
        );
    }

    #[test]
    fn test_normalize_ticket() {
        let row = json!({
            "id": 311,
            "ticket_number": "T-88",
            "status": "preparing",
            "total": 23.40,
            "customer_id": "kiosk-walkup-4",
        });

        let order = MenuAdapter.normalize(&tenant(), &row).unwrap();
        assert_eq!(order.order_number, "T-88");
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.total_amount, dec!(23.40));
    }

    #[test]
    fn test_missing_total_rejects_row() {
        let row = json!({"id": 311, "status": "pending", "customer_id": "c-1"});
        assert_eq!(
            MenuAdapter.normalize(&tenant(), &row),
            Err(NormalizationError::missing("total"))
        );
    }

    #[test]
    fn test_status_round_trip() {
        for status in OrderStatus::ALL {
            let raw = MenuAdapter.source_status(status);
            let (mapped, flagged) = MenuAdapter::map_status(raw);
            assert_eq!(mapped, status);
            assert!(!flagged);
        }
    }
}
