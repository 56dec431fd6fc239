//! Port to the backing persistence layer.
//!
//! The store itself (auth, query language, durability) is outside this crate;
//! everything here talks to it through [`OrderStore`]:
//!
//! - `subscribe` - push-based change notification per tenant and table set
//! - `fetch` - pull-based resynchronization
//! - `write` - status patches, used only by the transition guard
//!
//! [`MemoryOrderStore`] is the in-process reference implementation used by
//! tests and demos.

mod memory;

pub use memory::MemoryOrderStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreResult;
use crate::orders::{SourceTable, TenantId};
use crate::sync::ChangeEvent;

/// Status patch written back to a source row.
///
/// `status` is already in the *source's* vocabulary - the adapter translated
/// it before the write - and `updated_at` is the guard's stamp, which the
/// store must echo as the event's server timestamp.
#[derive(Debug, Clone)]
pub struct StatusPatch {
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl StatusPatch {
    /// Create a patch stamped now
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Push stream of change notifications for one subscription.
///
/// End of stream (`next` returning `None`) means the connection dropped;
/// the router treats that as a disconnect, not an error.
pub struct ChangeStream {
    rx: mpsc::Receiver<ChangeEvent>,
}

impl ChangeStream {
    pub fn new(rx: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { rx }
    }

    /// Next change notification, or `None` once the stream is closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

/// The persistence/auth layer, consumed as a black box.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Open a change stream scoped to one tenant and a fixed table set.
    async fn subscribe(
        &self,
        tenant: &TenantId,
        tables: &[SourceTable],
    ) -> StoreResult<ChangeStream>;

    /// Fetch all current rows of one table for a tenant. Used for
    /// resynchronization after a missed-event window.
    async fn fetch(&self, tenant: &TenantId, table: SourceTable) -> StoreResult<Vec<Value>>;

    /// Apply a status patch to one row. The store emits exactly one
    /// `Update` change event for a successful write.
    async fn write(
        &self,
        tenant: &TenantId,
        table: SourceTable,
        row_id: &str,
        patch: StatusPatch,
    ) -> StoreResult<()>;
}
