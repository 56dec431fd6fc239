//! Per-tenant change event routing.
//!
//! One router owns one tenant's change stream. It converts every raw store
//! notification into a canonical-model delta by re-running the matching
//! source adapter on the row snapshot, maintains the tenant's canonical
//! order set, and fans deltas out to every subscribed view.
//!
//! Ordering: the store orders events per row by `server_timestamp`. A
//! notification older than the stored record (possible under network retry)
//! is silently dropped, which makes the router idempotent and replay-safe.
//!
//! Disconnects are non-fatal. On reconnect the router subscribes *first* and
//! resynchronizes *second*, so any event racing the fetch sits buffered in
//! the new stream and is applied - or dropped as stale - afterwards. No
//! missed-event window survives a reconnect.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::adapters::AdapterRegistry;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::orders::{CanonicalOrder, OrderId, SourceRef, SourceTable, TenantId};
use crate::store::{ChangeStream, OrderStore};

use super::events::{ChangeEvent, ChangeOp, OrderDelta, StreamStatus};
use super::view::OrderFilter;

/// The canonical order set for one tenant.
///
/// Keyed by source ref - one record per `(tenant, source, source_ref)` - with
/// an id index for the read API and the transition guard.
#[derive(Debug, Default)]
pub struct CanonicalSet {
    by_ref: HashMap<SourceRef, CanonicalOrder>,
    by_id: HashMap<OrderId, SourceRef>,
}

impl CanonicalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an upsert carrying the event's server timestamp.
    ///
    /// Returns the record as stored, or `None` when the event was stale
    /// (older than the record's `updated_at`). Re-delivery with an equal
    /// timestamp is applied idempotently and yields the same record.
    pub fn upsert(
        &mut self,
        fresh: CanonicalOrder,
        stamp: DateTime<Utc>,
    ) -> Option<CanonicalOrder> {
        match self.by_ref.get_mut(&fresh.source_ref) {
            Some(existing) => {
                if stamp < existing.updated_at {
                    return None;
                }
                existing.absorb_refresh(fresh);
                if stamp > existing.updated_at {
                    existing.updated_at = stamp;
                }
                Some(existing.clone())
            }
            None => {
                let mut order = fresh;
                if stamp > order.updated_at {
                    order.updated_at = stamp;
                }
                self.by_id
                    .insert(order.id.clone(), order.source_ref.clone());
                self.by_ref.insert(order.source_ref.clone(), order.clone());
                Some(order)
            }
        }
    }

    /// Remove a record, unless the delete notification is stale.
    pub fn remove(
        &mut self,
        source_ref: &SourceRef,
        stamp: DateTime<Utc>,
    ) -> Option<CanonicalOrder> {
        let existing = self.by_ref.get(source_ref)?;
        if stamp < existing.updated_at {
            return None;
        }
        let order = self.by_ref.remove(source_ref)?;
        self.by_id.remove(&order.id);
        Some(order)
    }

    /// Replace the whole set from a resynchronization fetch.
    pub fn replace_all(&mut self, orders: Vec<CanonicalOrder>) {
        self.by_ref.clear();
        self.by_id.clear();
        for order in orders {
            self.by_id
                .insert(order.id.clone(), order.source_ref.clone());
            self.by_ref.insert(order.source_ref.clone(), order);
        }
    }

    pub fn get(&self, id: &OrderId) -> Option<&CanonicalOrder> {
        self.by_id.get(id).and_then(|r| self.by_ref.get(r))
    }

    pub fn snapshot(&self) -> Vec<CanonicalOrder> {
        self.by_ref.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ref.is_empty()
    }
}

/// Shared read surface over one tenant's canonical set.
///
/// Written only by the owning router task; the feed reads it for
/// point-in-time queries.
#[derive(Default)]
pub struct TenantState {
    orders: RwLock<CanonicalSet>,
}

impl TenantState {
    pub fn get(&self, id: &OrderId) -> Option<CanonicalOrder> {
        self.orders.read().get(id).cloned()
    }

    pub fn matching(&self, filter: &OrderFilter) -> Vec<CanonicalOrder> {
        self.orders
            .read()
            .by_ref
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> Vec<CanonicalOrder> {
        self.orders.read().snapshot()
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }
}

/// Handles the feed keeps when it spawns a router.
pub struct RouterHandles {
    pub state: Arc<TenantState>,
    pub deltas: broadcast::Sender<OrderDelta>,
    pub status: watch::Receiver<StreamStatus>,
}

/// Router for one tenant's change stream.
pub struct ChangeEventRouter {
    tenant: TenantId,
    store: Arc<dyn OrderStore>,
    adapters: AdapterRegistry,
    state: Arc<TenantState>,
    deltas: broadcast::Sender<OrderDelta>,
    status: watch::Sender<StreamStatus>,
    config: SyncConfig,
}

impl ChangeEventRouter {
    pub fn new(
        tenant: TenantId,
        store: Arc<dyn OrderStore>,
        adapters: AdapterRegistry,
        config: SyncConfig,
    ) -> (Self, RouterHandles) {
        let state = Arc::new(TenantState::default());
        let (deltas, _) = broadcast::channel(config.delta_channel_capacity);
        let (status_tx, status_rx) = watch::channel(StreamStatus::Idle);

        let handles = RouterHandles {
            state: Arc::clone(&state),
            deltas: deltas.clone(),
            status: status_rx,
        };
        let router = Self {
            tenant,
            store,
            adapters,
            state,
            deltas,
            status: status_tx,
            config,
        };
        (router, handles)
    }

    /// Drive the stream until the task is aborted.
    ///
    /// Each pass: subscribe, resynchronize, then consume incrementally until
    /// the stream ends. Stream loss loops back to a fresh subscription.
    pub async fn run(self) {
        loop {
            match self.store.subscribe(&self.tenant, &SourceTable::ALL).await {
                Ok(stream) => {
                    self.status.send_replace(StreamStatus::Resyncing);
                    self.resync_until_success().await;
                    self.status.send_replace(StreamStatus::Connected);
                    self.consume(stream).await;
                    self.status.send_replace(StreamStatus::Disconnected);
                    info!(tenant = %self.tenant, "change stream ended, reconnecting");
                }
                Err(err) => {
                    self.status.send_replace(StreamStatus::Disconnected);
                    warn!(tenant = %self.tenant, "subscribe failed: {}", err);
                    tokio::time::sleep(self.config.resync.initial_backoff()).await;
                }
            }
        }
    }

    async fn consume(&self, mut stream: ChangeStream) {
        while let Some(event) = stream.next().await {
            self.handle_event(event);
        }
    }

    /// Apply one raw change notification to the canonical set.
    pub fn handle_event(&self, event: ChangeEvent) {
        if event.tenant_id != self.tenant {
            debug!(tenant = %event.tenant_id, "event for foreign tenant, ignoring");
            return;
        }
        let Some(adapter) = self.adapters.for_table(event.table) else {
            debug!(table = %event.table, "event for untracked table, ignoring");
            return;
        };

        match event.op {
            ChangeOp::Insert | ChangeOp::Update => {
                match adapter.normalize(&event.tenant_id, &event.row) {
                    Ok(order) => {
                        let applied = self
                            .state
                            .orders
                            .write()
                            .upsert(order, event.server_timestamp);
                        match applied {
                            Some(order) => {
                                let _ = self.deltas.send(OrderDelta::Upsert(order));
                            }
                            None => {
                                debug!(table = %event.table, "stale event dropped");
                            }
                        }
                    }
                    Err(err) => {
                        warn!(
                            table = %event.table,
                            op = %event.op,
                            "dropping change event: {}",
                            err
                        );
                    }
                }
            }
            ChangeOp::Delete => match adapter.row_key(&event.row) {
                Ok(row_id) => {
                    let source_ref = SourceRef::new(event.table, row_id);
                    let removed = self
                        .state
                        .orders
                        .write()
                        .remove(&source_ref, event.server_timestamp);
                    if let Some(order) = removed {
                        let _ = self.deltas.send(OrderDelta::Remove(order.id));
                    }
                }
                Err(err) => {
                    warn!(table = %event.table, "dropping delete event: {}", err);
                }
            },
        }
    }

    /// One full resynchronization fetch across all source tables.
    ///
    /// Rows that fail normalization are dropped and logged, same as on the
    /// incremental path. On success the rebuilt set is broadcast as a
    /// snapshot so every view rebuilds in one pass.
    pub async fn resynchronize(&self) -> SyncResult<usize> {
        let mut orders = Vec::new();
        for table in SourceTable::ALL {
            let rows = self.store.fetch(&self.tenant, table).await?;
            let Some(adapter) = self.adapters.for_table(table) else {
                continue;
            };
            for row in rows {
                match adapter.normalize(&self.tenant, &row) {
                    Ok(order) => orders.push(order),
                    Err(err) => {
                        warn!(table = %table, "dropping row during resync: {}", err);
                    }
                }
            }
        }

        let count = orders.len();
        self.state.orders.write().replace_all(orders);
        let _ = self
            .deltas
            .send(OrderDelta::Snapshot(self.state.snapshot()));
        debug!(tenant = %self.tenant, orders = count, "resynchronized");
        Ok(count)
    }

    /// Retry resynchronization with exponential backoff until it succeeds.
    ///
    /// After the configured number of failed attempts the views are told the
    /// data may be stale; retries keep going regardless, and the eventual
    /// snapshot clears the degraded state.
    async fn resync_until_success(&self) {
        let resync = &self.config.resync;
        let mut attempts = 0u32;
        let mut delay = resync.initial_backoff();
        let mut degraded = false;

        loop {
            match self.resynchronize().await {
                Ok(count) => {
                    info!(tenant = %self.tenant, orders = count, "resync complete");
                    return;
                }
                Err(err) => {
                    attempts += 1;
                    warn!(
                        tenant = %self.tenant,
                        attempt = attempts,
                        "resync failed: {}",
                        err
                    );
                    if attempts >= resync.attempts_before_degraded && !degraded {
                        degraded = true;
                        self.status.send_replace(StreamStatus::Degraded);
                        let _ = self.deltas.send(OrderDelta::Degraded);
                    }
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, resync.max_backoff());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderStatus;
    use crate::store::MemoryOrderStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn tenant() -> TenantId {
        TenantId::new("tenant-1")
    }

    fn test_router(store: Arc<MemoryOrderStore>) -> (ChangeEventRouter, RouterHandles) {
        ChangeEventRouter::new(
            tenant(),
            store,
            AdapterRegistry::all_sources(),
            SyncConfig::immediate(),
        )
    }

    fn retail_row(id: u32, status: &str, amount: &str) -> serde_json::Value {
        json!({
            "id": id,
            "status": status,
            "total_amount": amount,
            "customer_id": "cust-1",
        })
    }

    #[tokio::test]
    async fn test_insert_event_populates_canonical_set() {
        let store = Arc::new(MemoryOrderStore::new());
        let (router, handles) = test_router(store);

        router.handle_event(ChangeEvent::insert(
            tenant(),
            SourceTable::RetailOrders,
            retail_row(1, "pending", "10.00"),
            Utc::now(),
        ));

        assert_eq!(handles.state.len(), 1);
        let order = handles
            .state
            .get(&OrderId::new("retail_orders:1"))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, dec!(10.00));
    }

    #[tokio::test]
    async fn test_stale_event_is_a_noop() {
        let store = Arc::new(MemoryOrderStore::new());
        let (router, handles) = test_router(store);
        let t1 = Utc::now();
        let t2 = t1 - Duration::seconds(30);

        router.handle_event(ChangeEvent::insert(
            tenant(),
            SourceTable::RetailOrders,
            retail_row(1, "confirmed", "10.00"),
            t1,
        ));
        // An older notification for the same row arrives late.
        router.handle_event(ChangeEvent::update(
            tenant(),
            SourceTable::RetailOrders,
            retail_row(1, "pending", "10.00"),
            t2,
        ));

        let order = handles
            .state
            .get(&OrderId::new("retail_orders:1"))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.updated_at, t1);
    }

    #[tokio::test]
    async fn test_equal_timestamp_redelivery_is_idempotent() {
        let store = Arc::new(MemoryOrderStore::new());
        let (router, handles) = test_router(store);
        let stamp = Utc::now();
        let event = ChangeEvent::insert(
            tenant(),
            SourceTable::RetailOrders,
            retail_row(1, "pending", "10.00"),
            stamp,
        );

        router.handle_event(event.clone());
        let first = handles.state.snapshot();
        router.handle_event(event);
        let second = handles.state.snapshot();

        assert_eq!(first, second);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_unnormalizable_event_dropped_without_panic() {
        let store = Arc::new(MemoryOrderStore::new());
        let (router, handles) = test_router(store);

        router.handle_event(ChangeEvent::insert(
            tenant(),
            SourceTable::RetailOrders,
            json!({"id": 1, "status": "pending"}), // no amount, no customer
            Utc::now(),
        ));

        assert_eq!(handles.state.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_event_removes_record() {
        let store = Arc::new(MemoryOrderStore::new());
        let (router, handles) = test_router(store);
        let mut deltas = handles.deltas.subscribe();

        router.handle_event(ChangeEvent::insert(
            tenant(),
            SourceTable::RetailOrders,
            retail_row(1, "pending", "10.00"),
            Utc::now(),
        ));
        router.handle_event(ChangeEvent::delete(
            tenant(),
            SourceTable::RetailOrders,
            json!({"id": 1}),
            Utc::now() + Duration::seconds(1),
        ));

        assert_eq!(handles.state.len(), 0);
        assert!(matches!(deltas.try_recv().unwrap(), OrderDelta::Upsert(_)));
        assert!(matches!(deltas.try_recv().unwrap(), OrderDelta::Remove(_)));
    }

    #[tokio::test]
    async fn test_foreign_tenant_event_ignored() {
        let store = Arc::new(MemoryOrderStore::new());
        let (router, handles) = test_router(store);

        router.handle_event(ChangeEvent::insert(
            TenantId::new("someone-else"),
            SourceTable::RetailOrders,
            retail_row(1, "pending", "10.00"),
            Utc::now(),
        ));

        assert_eq!(handles.state.len(), 0);
    }

    #[tokio::test]
    async fn test_resynchronize_rebuilds_and_broadcasts_snapshot() {
        let store = Arc::new(MemoryOrderStore::new());
        store.seed(
            &tenant(),
            SourceTable::RetailOrders,
            vec![retail_row(1, "pending", "10.00")],
        );
        store.seed(
            &tenant(),
            SourceTable::WholesaleOrders,
            vec![json!({
                "id": "po-1",
                "status": "confirmed",
                "total_amount": "500.00",
                "client_id": "org-1",
            })],
        );
        // One poisoned row that must be dropped, not zero-filled.
        store.seed(
            &tenant(),
            SourceTable::PosOrders,
            vec![json!({"id": 9, "status": "completed"})],
        );

        let (router, handles) = test_router(store);
        let mut deltas = handles.deltas.subscribe();

        let count = router.resynchronize().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(handles.state.len(), 2);

        match deltas.try_recv().unwrap() {
            OrderDelta::Snapshot(orders) => assert_eq!(orders.len(), 2),
            other => panic!("unexpected delta: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resynchronize_surfaces_fetch_failure() {
        let store = Arc::new(MemoryOrderStore::new());
        store.fail_next_fetches(1);
        let (router, _handles) = test_router(store);
        assert!(router.resynchronize().await.is_err());
    }
}
