//! Per-view materialized order sets.
//!
//! Every live view (order board, stats header, ticker) owns a private copy of
//! the orders matching its filter. Copies are never shared between views, so
//! no cross-view locking exists; each copy is mutated only by the task that
//! owns it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::orders::{CanonicalOrder, OrderId, OrderSource, OrderStatus};
use crate::stats::OrderStats;

use super::events::OrderDelta;

/// Predicate selecting the orders a view displays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    /// Restrict to one source system
    pub source: Option<OrderSource>,
    /// Restrict to an explicit status set
    pub statuses: Option<Vec<OrderStatus>>,
    /// Keep only in-flight orders (the live-board case)
    pub open_only: bool,
}

impl OrderFilter {
    /// Filter matching every order
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one source
    pub fn for_source(mut self, source: OrderSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Restrict to a status set
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = OrderStatus>) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    /// Keep only in-flight orders
    pub fn open_only(mut self) -> Self {
        self.open_only = true;
        self
    }

    /// Check if an order belongs in a view with this filter
    pub fn matches(&self, order: &CanonicalOrder) -> bool {
        if let Some(source) = self.source {
            if order.source != source {
                return false;
            }
        }
        if let Some(ref statuses) = self.statuses {
            if !statuses.contains(&order.status) {
                return false;
            }
        }
        if self.open_only && !order.is_open() {
            return false;
        }
        true
    }
}

/// One view's private, filter-consistent order set plus its stats.
///
/// After any applied delta the set contains exactly the canonical orders
/// matching the filter - an order that stops matching (say, completed on an
/// open-orders board) is removed, never left behind as a ghost row.
#[derive(Debug)]
pub struct MaterializedView {
    filter: OrderFilter,
    orders: HashMap<OrderId, CanonicalOrder>,
    stats: OrderStats,
    degraded: bool,
}

impl MaterializedView {
    pub fn new(filter: OrderFilter) -> Self {
        Self {
            filter,
            orders: HashMap::new(),
            stats: OrderStats::empty(),
            degraded: false,
        }
    }

    /// Apply one delta. Returns true if the set changed.
    ///
    /// Does not recompute stats - call [`recompute`](Self::recompute) once
    /// after a batch, so a burst costs a single aggregation pass.
    pub fn apply(&mut self, delta: &OrderDelta) -> bool {
        match delta {
            OrderDelta::Upsert(order) => {
                if self.filter.matches(order) {
                    self.orders.insert(order.id.clone(), order.clone());
                    true
                } else {
                    // No longer (or never) ours; drop it rather than keeping
                    // a stale row the filter would not admit.
                    self.orders.remove(&order.id).is_some()
                }
            }
            OrderDelta::Remove(id) => self.orders.remove(id).is_some(),
            OrderDelta::Snapshot(orders) => {
                self.orders = orders
                    .iter()
                    .filter(|o| self.filter.matches(o))
                    .map(|o| (o.id.clone(), o.clone()))
                    .collect();
                self.degraded = false;
                true
            }
            OrderDelta::Degraded => {
                self.degraded = true;
                false
            }
        }
    }

    /// Recompute stats from the current set, in full.
    pub fn recompute(&mut self) {
        self.stats = OrderStats::compute(self.orders.values());
    }

    /// Current orders, newest first (ties broken by id for determinism)
    pub fn orders(&self) -> Vec<CanonicalOrder> {
        let mut orders: Vec<_> = self.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.0.cmp(&b.id.0)));
        orders
    }

    /// Stats as of the last recompute
    pub fn stats(&self) -> &OrderStats {
        &self.stats
    }

    /// True while the backing stream could not be resynchronized
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.orders.contains_key(id)
    }
}
