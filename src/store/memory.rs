//! In-memory store implementation.
//!
//! Backs the test suites and demo setups with the same contract a real
//! backend honours: seeded rows per tenant/table, one `Update` event per
//! write, streams that end on disconnect, and failure injection for the
//! resynchronization paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{ChangeStream, OrderStore, StatusPatch};
use crate::error::{StoreError, StoreResult};
use crate::orders::{SourceTable, TenantId};
use crate::sync::{ChangeEvent, ChangeOp};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

struct Subscriber {
    tenant: TenantId,
    tables: Vec<SourceTable>,
    tx: mpsc::Sender<ChangeEvent>,
}

/// In-memory [`OrderStore`] with change-event fan-out.
pub struct MemoryOrderStore {
    rows: RwLock<HashMap<(TenantId, SourceTable), BTreeMap<String, Value>>>,
    subscribers: Mutex<Vec<Subscriber>>,
    fetch_failures: AtomicU32,
    channel_capacity: usize,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            fetch_failures: AtomicU32::new(0),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Seed rows without emitting change events, as if they predate the
    /// subscription.
    pub fn seed(&self, tenant: &TenantId, table: SourceTable, rows: Vec<Value>) {
        let mut data = self.rows.write();
        let entry = data.entry((tenant.clone(), table)).or_default();
        for row in rows {
            match row_key(&row) {
                Some(key) => {
                    entry.insert(key, row);
                }
                None => warn!(table = %table, "seed row without id, skipping"),
            }
        }
    }

    /// Insert or replace a row and notify subscribers.
    pub fn upsert_row(&self, tenant: &TenantId, table: SourceTable, row: Value) {
        let Some(key) = row_key(&row) else {
            warn!(table = %table, "row without id, skipping");
            return;
        };

        let op = {
            let mut data = self.rows.write();
            let entry = data.entry((tenant.clone(), table)).or_default();
            if entry.insert(key, row.clone()).is_some() {
                ChangeOp::Update
            } else {
                ChangeOp::Insert
            }
        };

        let event = ChangeEvent {
            tenant_id: tenant.clone(),
            table,
            op,
            row,
            server_timestamp: Utc::now(),
        };
        self.broadcast(event);
    }

    /// Delete a row and notify subscribers with its last snapshot.
    pub fn delete_row(&self, tenant: &TenantId, table: SourceTable, row_id: &str) {
        let removed = {
            let mut data = self.rows.write();
            data.get_mut(&(tenant.clone(), table))
                .and_then(|entry| entry.remove(row_id))
        };

        if let Some(row) = removed {
            let event = ChangeEvent::delete(tenant.clone(), table, row, Utc::now());
            self.broadcast(event);
        }
    }

    /// Inject an arbitrary change event, bypassing row storage. Lets tests
    /// exercise replays and out-of-order delivery.
    pub fn emit_raw(&self, event: ChangeEvent) {
        self.broadcast(event);
    }

    /// Drop every subscription for a tenant, ending their streams. The next
    /// `subscribe` works normally - this models a transient connection loss.
    pub fn disconnect(&self, tenant: &TenantId) {
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|s| &s.tenant != tenant);
        debug!(
            tenant = %tenant,
            dropped = before - subs.len(),
            "disconnected change streams"
        );
    }

    /// Make the next `n` fetch calls fail, to exercise resync retry paths.
    pub fn fail_next_fetches(&self, n: u32) {
        self.fetch_failures.store(n, Ordering::SeqCst);
    }

    fn broadcast(&self, event: ChangeEvent) {
        let mut subs = self.subscribers.lock();
        subs.retain(|s| {
            if s.tenant != event.tenant_id || !s.tables.contains(&event.table) {
                return true;
            }
            // A full or closed channel drops the subscriber; the consumer
            // will notice end-of-stream and resynchronize.
            match s.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(err) => {
                    warn!(tenant = %s.tenant, "dropping change subscriber: {}", err);
                    false
                }
            }
        });
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn subscribe(
        &self,
        tenant: &TenantId,
        tables: &[SourceTable],
    ) -> StoreResult<ChangeStream> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.subscribers.lock().push(Subscriber {
            tenant: tenant.clone(),
            tables: tables.to_vec(),
            tx,
        });
        debug!(tenant = %tenant, tables = tables.len(), "change stream opened");
        Ok(ChangeStream::new(rx))
    }

    async fn fetch(&self, tenant: &TenantId, table: SourceTable) -> StoreResult<Vec<Value>> {
        let remaining = self.fetch_failures.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .fetch_failures
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(StoreError::Fetch {
                table,
                reason: "induced fetch failure".to_string(),
            });
        }

        let data = self.rows.read();
        Ok(data
            .get(&(tenant.clone(), table))
            .map(|entry| entry.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn write(
        &self,
        tenant: &TenantId,
        table: SourceTable,
        row_id: &str,
        patch: StatusPatch,
    ) -> StoreResult<()> {
        let row = {
            let mut data = self.rows.write();
            let entry = data
                .get_mut(&(tenant.clone(), table))
                .and_then(|rows| rows.get_mut(row_id))
                .ok_or_else(|| StoreError::RowNotFound {
                    table,
                    row_id: row_id.to_string(),
                })?;

            entry["status"] = Value::String(patch.status.clone());
            entry["updated_at"] = Value::String(patch.updated_at.to_rfc3339());
            entry.clone()
        };

        let event = ChangeEvent::update(tenant.clone(), table, row, patch.updated_at);
        self.broadcast(event);
        Ok(())
    }
}

fn row_key(row: &Value) -> Option<String> {
    match row.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tenant() -> TenantId {
        TenantId::new("tenant-1")
    }

    #[tokio::test]
    async fn test_write_emits_one_update_event() {
        let store = MemoryOrderStore::new();
        store.seed(
            &tenant(),
            SourceTable::RetailOrders,
            vec![json!({"id": 1, "status": "pending"})],
        );

        let mut stream = store
            .subscribe(&tenant(), &[SourceTable::RetailOrders])
            .await
            .unwrap();

        let patch = StatusPatch::new("confirmed");
        let stamp = patch.updated_at;
        store
            .write(&tenant(), SourceTable::RetailOrders, "1", patch)
            .await
            .unwrap();

        let event = stream.next().await.unwrap();
        assert_eq!(event.op, ChangeOp::Update);
        assert_eq!(event.row["status"], "confirmed");
        assert_eq!(event.server_timestamp, stamp);
    }

    #[tokio::test]
    async fn test_write_to_missing_row_fails() {
        let store = MemoryOrderStore::new();
        let result = store
            .write(
                &tenant(),
                SourceTable::PosOrders,
                "404",
                StatusPatch::new("confirmed"),
            )
            .await;
        assert!(matches!(result, Err(StoreError::RowNotFound { .. })));
    }

    #[tokio::test]
    async fn test_subscription_scoped_by_tenant_and_table() {
        let store = MemoryOrderStore::new();
        let mut stream = store
            .subscribe(&tenant(), &[SourceTable::MenuOrders])
            .await
            .unwrap();

        // Different tenant, same table: not delivered.
        store.upsert_row(
            &TenantId::new("other"),
            SourceTable::MenuOrders,
            json!({"id": 1}),
        );
        // Same tenant, different table: not delivered.
        store.upsert_row(&tenant(), SourceTable::PosOrders, json!({"id": 2}));
        // Same tenant, subscribed table: delivered.
        store.upsert_row(&tenant(), SourceTable::MenuOrders, json!({"id": 3}));

        let event = stream.next().await.unwrap();
        assert_eq!(event.row["id"], 3);
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream() {
        let store = MemoryOrderStore::new();
        let mut stream = store
            .subscribe(&tenant(), &[SourceTable::RetailOrders])
            .await
            .unwrap();

        store.disconnect(&tenant());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_induced_fetch_failure() {
        let store = MemoryOrderStore::new();
        store.fail_next_fetches(1);

        assert!(store
            .fetch(&tenant(), SourceTable::RetailOrders)
            .await
            .is_err());
        assert!(store
            .fetch(&tenant(), SourceTable::RetailOrders)
            .await
            .is_ok());
    }
}
