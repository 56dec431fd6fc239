//! Point-of-sale adapter.
//!
//! POS rows are till receipts: usually created already `completed`, with the
//! occasional held ticket moving through the short path first.

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

/// Adapter for the `pos_orders` table.
pub struct PosAdapter;

impl PosAdapter {
    fn map_status(raw: &str) -> (OrderStatus, bool) {
        let status = match raw {
            "pending" | "new" | "held" => OrderStatus::Pending,
            "confirmed" => OrderStatus::Confirmed,
            "processing" => OrderStatus::Processing,
            "out_for_delivery" => OrderStatus::InTransit,
            "delivered" => OrderStatus::Delivered,
            "completed" => OrderStatus::Completed,
            "cancelled" | "voided" => OrderStatus::Cancelled,
            "rejected" => OrderStatus::Rejected,
            "refunded" => OrderStatus::Refunded,
            unknown => {
                trace!(status = unknown, "unmapped pos status, flagging for review");
                return (OrderStatus::Pending, true);
            }
        };
        (status, false)
    }
}

impl SourceAdapter for PosAdapter {
    fn source(&self) -> OrderSource {
        OrderSource::Pos
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
            source: OrderSource::Pos,
            order_number: optional_str(row, "receipt_number")
                .unwrap_or_else(|| format!("P-{}", row_id)),
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
    fn test_normalize_receipt() {
        let row = json!({
            "id": 9001,
            "receipt_number": "0042-17",
            "status": "completed",
            "total": "12.75",
            "customer_id": "walk-in",
        });

        let order = PosAdapter.normalize(&tenant(), &row).unwrap();
        assert_eq!(order.order_number, "0042-17");
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.total_amount, dec!(12.75));
        assert!(!order.is_open());
    }

    #[test]
    fn test_voided_maps_to_cancelled() {
        assert_eq!(
            PosAdapter::map_status("voided"),
            (OrderStatus::Cancelled, false)
        );
    }

    #[test]
    fn test_unknown_status_flags_for_review() {
        let row = json!({
            "id": 9001,
            "status": "drawer_open",
            "total": "1",
            "customer_id": "walk-in",
        });

        let order = PosAdapter.normalize(&tenant(), &row).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.needs_review);
    }

    #[test]
    fn test_status_round_trip() {
        for status in OrderStatus::ALL {
            let raw = PosAdapter.source_status(status);
            let (mapped, flagged) = PosAdapter::map_status(raw);
            assert_eq!(mapped, status);
            assert!(!flagged);
        }
    }
}
