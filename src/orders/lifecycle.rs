//! The status transition guard - the single authorized write path for
//! `status`.
//!
//! Every status change, whatever view or workflow requested it, goes through
//! [`TransitionGuard::apply`]. The guard validates the edge against the
//! shared lifecycle, translates the canonical status into the source's own
//! vocabulary, and writes exactly one patch through the store port. The
//! store's resulting `Update` event is what moves the canonical set - so the
//! router never has to reconcile two competing status writers.

use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::AdapterRegistry;
use crate::error::{SyncError, SyncResult};
use crate::store::{OrderStore, StatusPatch};

use super::order::CanonicalOrder;
use super::types::OrderStatus;

/// Validates and applies status transitions.
pub struct TransitionGuard {
    store: Arc<dyn OrderStore>,
    adapters: AdapterRegistry,
}

impl TransitionGuard {
    pub fn new(store: Arc<dyn OrderStore>, adapters: AdapterRegistry) -> Self {
        Self { store, adapters }
    }

    /// Apply a requested transition to an order.
    ///
    /// Legal edges: an absorbing target, the immediate happy-path successor,
    /// or the current status itself (a no-op that writes nothing). Anything
    /// else fails with [`SyncError::InvalidTransition`] and leaves the record
    /// untouched - there is no partial apply.
    pub async fn apply(&self, order: &CanonicalOrder, next: OrderStatus) -> SyncResult<()> {
        if next == order.status {
            debug!(order = %order.id, status = %next, "status unchanged, nothing to write");
            return Ok(());
        }
        if !order.status.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        let adapter = self.adapters.for_source(order.source);
        let patch = StatusPatch::new(adapter.source_status(next));
        info!(
            order = %order.id,
            from = %order.status,
            to = %next,
            "applying status transition"
        );
        self.store
            .write(
                &order.tenant_id,
                order.source_ref.table,
                &order.source_ref.row_id,
                patch,
            )
            .await?;
        Ok(())
    }
}
