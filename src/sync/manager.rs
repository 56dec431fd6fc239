//! The live order feed - the facade dashboard consumers hold.
//!
//! One feed serves any number of tenants. Per tenant it runs a single
//! router task (see [`super::router`]); per subscribed view it runs a task
//! that applies coalesced deltas to that view's private materialized set and
//! invokes the consumer callback. Views never share mutable state, so there
//! is nothing to lock across them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapters::AdapterRegistry;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::orders::{
    CanonicalOrder, OrderId, OrderSource, OrderStatus, TenantId, TransitionGuard,
};
use crate::stats::OrderStats;
use crate::store::OrderStore;

use super::debounce::{DeltaCoalescer, FlushDecision};
use super::events::{OrderDelta, StreamStatus};
use super::router::{ChangeEventRouter, TenantState};
use super::view::{MaterializedView, OrderFilter};

/// What a subscribed view receives on every recompute.
#[derive(Debug, Clone)]
pub struct ViewUpdate {
    /// Orders matching the view's filter, newest first
    pub orders: Vec<CanonicalOrder>,
    /// Stats over exactly those orders
    pub stats: OrderStats,
    /// True while the tenant stream could not be resynchronized
    pub degraded: bool,
}

/// Consumer callback invoked from the view's own task.
pub type ViewCallback = Box<dyn FnMut(ViewUpdate) + Send>;

/// Handle for one live view. Dropping it (or calling
/// [`unsubscribe`](Self::unsubscribe)) stops the view task immediately; a
/// resynchronization still in flight finishes in the router, but its result
/// is never applied to the dead view.
pub struct ViewSubscription {
    id: Uuid,
    task: JoinHandle<()>,
}

impl ViewSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {
        // Drop does the abort.
    }
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct TenantHandle {
    state: Arc<TenantState>,
    deltas: broadcast::Sender<OrderDelta>,
    status: watch::Receiver<StreamStatus>,
    task: JoinHandle<()>,
}

/// Facade over routers, views, and the transition guard.
pub struct LiveOrderFeed {
    store: Arc<dyn OrderStore>,
    adapters: AdapterRegistry,
    guard: TransitionGuard,
    config: SyncConfig,
    tenants: RwLock<HashMap<TenantId, TenantHandle>>,
}

impl LiveOrderFeed {
    pub fn new(store: Arc<dyn OrderStore>, config: SyncConfig) -> Self {
        let adapters = AdapterRegistry::all_sources();
        let guard = TransitionGuard::new(Arc::clone(&store), adapters.clone());
        Self {
            store,
            adapters,
            guard,
            config,
            tenants: RwLock::new(HashMap::new()),
        }
    }

    /// Start (or reuse) the tenant's stream and wait for its first
    /// synchronization to finish, so reads served right after are complete.
    pub async fn connect(&self, tenant: &TenantId) -> SyncResult<()> {
        let (_, _, mut status) = self.ensure_tenant(tenant);
        loop {
            {
                let current = *status.borrow_and_update();
                if matches!(current, StreamStatus::Connected | StreamStatus::Degraded) {
                    return Ok(());
                }
            }
            if status.changed().await.is_err() {
                return Err(SyncError::StreamDisconnected);
            }
        }
    }

    /// Point-in-time read of the orders matching a filter, newest first.
    pub fn get_orders(
        &self,
        tenant: &TenantId,
        filter: &OrderFilter,
    ) -> SyncResult<Vec<CanonicalOrder>> {
        let state = self.tenant_state(tenant)?;
        let mut orders = state.matching(filter);
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.0.cmp(&b.id.0)));
        Ok(orders)
    }

    /// Point-in-time stats for a tenant, optionally per source.
    pub fn get_stats(
        &self,
        tenant: &TenantId,
        source: Option<OrderSource>,
    ) -> SyncResult<OrderStats> {
        let state = self.tenant_state(tenant)?;
        let orders = state.snapshot();
        Ok(OrderStats::compute_for_source(orders.iter(), source))
    }

    /// Subscribe a live view. The callback runs on the view's own task,
    /// once per coalesced batch of deltas.
    pub fn subscribe_orders(
        &self,
        tenant: &TenantId,
        filter: OrderFilter,
        callback: ViewCallback,
    ) -> ViewSubscription {
        let (state, deltas, _) = self.ensure_tenant(tenant);
        let rx = deltas.subscribe();
        let window = self.config.debounce_window();
        let id = Uuid::new_v4();
        debug!(tenant = %tenant, view = %id, "view subscribed");

        let task = tokio::spawn(run_view(state, rx, filter, window, callback));
        ViewSubscription { id, task }
    }

    /// Request a status transition through the guard.
    ///
    /// The canonical set moves only once the store's own change event comes
    /// back through the router - there is no optimistic local apply.
    pub async fn update_status(
        &self,
        tenant: &TenantId,
        order_id: &OrderId,
        next: OrderStatus,
    ) -> SyncResult<()> {
        let state = self.tenant_state(tenant)?;
        let order = state
            .get(order_id)
            .ok_or_else(|| SyncError::UnknownOrder(order_id.clone()))?;
        self.guard.apply(&order, next).await
    }

    fn tenant_state(&self, tenant: &TenantId) -> SyncResult<Arc<TenantState>> {
        self.tenants
            .read()
            .get(tenant)
            .map(|h| Arc::clone(&h.state))
            .ok_or_else(|| SyncError::UnknownTenant(tenant.clone()))
    }

    fn ensure_tenant(
        &self,
        tenant: &TenantId,
    ) -> (
        Arc<TenantState>,
        broadcast::Sender<OrderDelta>,
        watch::Receiver<StreamStatus>,
    ) {
        if let Some(handle) = self.tenants.read().get(tenant) {
            return (
                Arc::clone(&handle.state),
                handle.deltas.clone(),
                handle.status.clone(),
            );
        }

        let mut tenants = self.tenants.write();
        let handle = tenants.entry(tenant.clone()).or_insert_with(|| {
            let (router, handles) = ChangeEventRouter::new(
                tenant.clone(),
                Arc::clone(&self.store),
                self.adapters.clone(),
                self.config.clone(),
            );
            let task = tokio::spawn(router.run());
            TenantHandle {
                state: handles.state,
                deltas: handles.deltas,
                status: handles.status,
                task,
            }
        });
        (
            Arc::clone(&handle.state),
            handle.deltas.clone(),
            handle.status.clone(),
        )
    }
}

impl Drop for LiveOrderFeed {
    fn drop(&mut self) {
        for handle in self.tenants.get_mut().values() {
            handle.task.abort();
        }
    }
}

/// The task behind one subscribed view.
///
/// Owns the view's private materialized set; nothing else ever touches it.
async fn run_view(
    state: Arc<TenantState>,
    mut rx: broadcast::Receiver<OrderDelta>,
    filter: OrderFilter,
    window: Duration,
    mut callback: ViewCallback,
) {
    let mut view = MaterializedView::new(filter);

    // Seed from the canonical set as of subscription time.
    view.apply(&OrderDelta::Snapshot(state.snapshot()));
    view.recompute();
    callback(update_of(&view));

    let mut coalescer = DeltaCoalescer::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(delta) => match coalescer.push(delta) {
                    FlushDecision::Immediate => {
                        flush(&mut view, &mut coalescer, &mut callback);
                        deadline = None;
                    }
                    FlushDecision::Defer => {
                        if deadline.is_none() {
                            deadline = Some(Instant::now() + window);
                        }
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed deltas are unrecoverable incrementally; rebuild
                    // from the canonical set instead.
                    warn!(skipped, "view lagged behind delta stream, rebuilding");
                    coalescer.push(OrderDelta::Snapshot(state.snapshot()));
                    flush(&mut view, &mut coalescer, &mut callback);
                    deadline = None;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                flush(&mut view, &mut coalescer, &mut callback);
                deadline = None;
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        // Guarded out by the `if deadline.is_some()` select arm.
        None => std::future::pending::<()>().await,
    }
}

fn flush(view: &mut MaterializedView, coalescer: &mut DeltaCoalescer, callback: &mut ViewCallback) {
    for delta in coalescer.drain() {
        view.apply(&delta);
    }
    view.recompute();
    callback(update_of(view));
}

fn update_of(view: &MaterializedView) -> ViewUpdate {
    ViewUpdate {
        orders: view.orders(),
        stats: view.stats().clone(),
        degraded: view.is_degraded(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryOrderStore;
    use crate::sync::view::OrderFilter;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Mutex;

    fn tenant() -> TenantId {
        TenantId::new("tenant-1")
    }

    fn seeded_store() -> Arc<MemoryOrderStore> {
        let store = Arc::new(MemoryOrderStore::new());
        store.seed(
            &tenant(),
            crate::orders::SourceTable::RetailOrders,
            vec![
                json!({
                    "id": 1,
                    "status": "pending",
                    "total_amount": "40.00",
                    "customer_id": "c-1",
                    "created_at": "2026-03-01T09:00:00Z",
                }),
                json!({
                    "id": 2,
                    "status": "completed",
                    "total_amount": "60.00",
                    "customer_id": "c-2",
                    "created_at": "2026-03-01T10:00:00Z",
                }),
            ],
        );
        store
    }

    #[tokio::test]
    async fn test_connect_then_read() {
        let feed = LiveOrderFeed::new(seeded_store(), SyncConfig::immediate());
        feed.connect(&tenant()).await.unwrap();

        let orders = feed.get_orders(&tenant(), &OrderFilter::all()).unwrap();
        assert_eq!(orders.len(), 2);
        // Newest first.
        assert_eq!(orders[0].id.as_str(), "retail_orders:2");

        let stats = feed.get_stats(&tenant(), None).unwrap();
        assert_eq!(stats.revenue, dec!(100.00));
        assert_eq!(stats.in_flight, 1);
    }

    #[tokio::test]
    async fn test_reads_before_connect_fail() {
        let feed = LiveOrderFeed::new(seeded_store(), SyncConfig::immediate());
        assert!(matches!(
            feed.get_orders(&tenant(), &OrderFilter::all()),
            Err(SyncError::UnknownTenant(_))
        ));
    }

    #[tokio::test]
    async fn test_update_status_roundtrip() {
        let feed = LiveOrderFeed::new(seeded_store(), SyncConfig::immediate());
        feed.connect(&tenant()).await.unwrap();

        let id = OrderId::new("retail_orders:1");
        feed.update_status(&tenant(), &id, OrderStatus::Confirmed)
            .await
            .unwrap();

        // The canonical set follows the store's change event.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let orders = feed.get_orders(&tenant(), &OrderFilter::all()).unwrap();
        let order = orders.iter().find(|o| o.id == id).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_update_status_unknown_order() {
        let feed = LiveOrderFeed::new(seeded_store(), SyncConfig::immediate());
        feed.connect(&tenant()).await.unwrap();

        let err = feed
            .update_status(&tenant(), &OrderId::new("retail_orders:404"), OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownOrder(_)));
    }

    #[tokio::test]
    async fn test_subscription_receives_initial_state_and_deltas() {
        let store = seeded_store();
        let feed = LiveOrderFeed::new(Arc::clone(&store) as Arc<dyn OrderStore>, SyncConfig::immediate());
        feed.connect(&tenant()).await.unwrap();

        let updates: Arc<Mutex<Vec<ViewUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let _sub = feed.subscribe_orders(
            &tenant(),
            OrderFilter::all().open_only(),
            Box::new(move |update| sink.lock().unwrap().push(update)),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let seen = updates.lock().unwrap();
            let first = seen.first().expect("initial update");
            assert_eq!(first.orders.len(), 1); // only the pending order is open
            assert_eq!(first.stats.in_flight, 1);
        }

        // Completing the open order must remove it from the open-only view.
        feed.update_status(
            &tenant(),
            &OrderId::new("retail_orders:1"),
            OrderStatus::Cancelled,
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let seen = updates.lock().unwrap();
        let last = seen.last().unwrap();
        assert!(last.orders.is_empty());
        assert_eq!(last.stats.in_flight, 0);
    }
}
