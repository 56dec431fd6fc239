//! Change notifications and the deltas derived from them.
//!
//! A [`ChangeEvent`] is the raw, transient notification the store pushes for
//! one row mutation; it is consumed exactly once by the router and discarded.
//! An [`OrderDelta`] is the canonical-model consequence the router fans out
//! to every subscribed view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::orders::{CanonicalOrder, OrderId, SourceTable, TenantId};

/// Kind of row mutation reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeOp::Insert => write!(f, "INSERT"),
            ChangeOp::Update => write!(f, "UPDATE"),
            ChangeOp::Delete => write!(f, "DELETE"),
        }
    }
}

/// Raw change notification for one row of one source table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Tenant the row belongs to
    pub tenant_id: TenantId,

    /// Table the row lives in
    pub table: SourceTable,

    /// What happened to the row
    pub op: ChangeOp,

    /// Snapshot of the row after the mutation (before it, for deletes)
    pub row: Value,

    /// Store-assigned timestamp; orders events per row
    pub server_timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create an insert notification
    pub fn insert(
        tenant_id: TenantId,
        table: SourceTable,
        row: Value,
        server_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            table,
            op: ChangeOp::Insert,
            row,
            server_timestamp,
        }
    }

    /// Create an update notification
    pub fn update(
        tenant_id: TenantId,
        table: SourceTable,
        row: Value,
        server_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            table,
            op: ChangeOp::Update,
            row,
            server_timestamp,
        }
    }

    /// Create a delete notification
    pub fn delete(
        tenant_id: TenantId,
        table: SourceTable,
        row: Value,
        server_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            table,
            op: ChangeOp::Delete,
            row,
            server_timestamp,
        }
    }
}

/// A single normalized change applied to materialized view sets.
#[derive(Debug, Clone)]
pub enum OrderDelta {
    /// A canonical record appeared or changed
    Upsert(CanonicalOrder),

    /// A canonical record disappeared from the store
    Remove(OrderId),

    /// Full rebuild after a resynchronization fetch. Replaces the entire
    /// materialized set and clears any degraded flag.
    Snapshot(Vec<CanonicalOrder>),

    /// Resynchronization failed; data may be stale until the next snapshot
    Degraded,
}

impl OrderDelta {
    /// Returns true for the control deltas that must flush a debounce
    /// buffer immediately
    pub fn is_control(&self) -> bool {
        matches!(self, OrderDelta::Snapshot(_) | OrderDelta::Degraded)
    }

    /// The order this delta targets, for row deltas
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            OrderDelta::Upsert(order) => Some(&order.id),
            OrderDelta::Remove(id) => Some(id),
            _ => None,
        }
    }
}

/// Health of a tenant's change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    /// No stream yet
    Idle,
    /// Stream live, incremental delivery in progress
    Connected,
    /// Stream lost; reconnect pending
    Disconnected,
    /// Reconnected, full resynchronization in progress
    Resyncing,
    /// Resynchronization failing; views see possibly stale data
    Degraded,
}

impl StreamStatus {
    /// Returns true when incremental delivery is trustworthy
    pub fn is_live(&self) -> bool {
        matches!(self, StreamStatus::Connected)
    }
}

impl Default for StreamStatus {
    fn default() -> Self {
        StreamStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_event_constructors() {
        let event = ChangeEvent::insert(
            TenantId::new("t1"),
            SourceTable::MenuOrders,
            json!({"id": 1}),
            Utc::now(),
        );
        assert_eq!(event.op, ChangeOp::Insert);
        assert_eq!(event.table, SourceTable::MenuOrders);
    }

    #[test]
    fn test_control_deltas() {
        assert!(OrderDelta::Snapshot(vec![]).is_control());
        assert!(OrderDelta::Degraded.is_control());
        assert!(!OrderDelta::Remove(OrderId::new("x")).is_control());
    }

    #[test]
    fn test_stream_status() {
        assert!(StreamStatus::Connected.is_live());
        assert!(!StreamStatus::Resyncing.is_live());
        assert_eq!(StreamStatus::default(), StreamStatus::Idle);
    }
}
