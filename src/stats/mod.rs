//! Live aggregate statistics over a visible order set.
//!
//! Stats are a pure function of the order set they are handed: one O(n) pass,
//! recomputed in full on every delta. There is no incremental arithmetic, so
//! a missed or re-ordered event can never leave a drifted counter behind -
//! the next recomputation is always exact.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orders::{CanonicalOrder, OrderSource, OrderStatus};

/// Aggregate statistics for one visible order set.
///
/// Revenue sums `total_amount` over every order not in an absorbing state
/// (cancelled/rejected/refunded), as an exact `Decimal`. Rounding is a
/// presentation concern and never happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStats {
    /// Number of orders in the set
    pub total: usize,

    /// Count per lifecycle status; statuses with no orders are absent
    pub status_counts: HashMap<OrderStatus, usize>,

    /// Exact revenue over non-absorbed orders
    pub revenue: Decimal,

    /// Orders in no terminal or absorbing state
    pub in_flight: usize,
}

impl OrderStats {
    /// Empty stats, the value of a view with no matching orders
    pub fn empty() -> Self {
        Self {
            total: 0,
            status_counts: HashMap::new(),
            revenue: Decimal::ZERO,
            in_flight: 0,
        }
    }

    /// Compute stats over a visible order set in one pass.
    pub fn compute<'a, I>(orders: I) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalOrder>,
    {
        let mut stats = Self::empty();
        for order in orders {
            stats.total += 1;
            *stats.status_counts.entry(order.status).or_insert(0) += 1;
            if order.status.counts_toward_revenue() {
                stats.revenue += order.total_amount;
            }
            if order.status.is_in_flight() {
                stats.in_flight += 1;
            }
        }
        stats
    }

    /// Compute stats over the subset of `orders` from one source.
    pub fn compute_for_source<'a, I>(orders: I, source: Option<OrderSource>) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalOrder>,
    {
        match source {
            Some(source) => Self::compute(orders.into_iter().filter(|o| o.source == source)),
            None => Self::compute(orders),
        }
    }

    /// Count of orders in one status
    pub fn count(&self, status: OrderStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Combined count of the two fulfilled terminals - they are synonyms
    /// for aggregation purposes
    pub fn fulfilled(&self) -> usize {
        self.count(OrderStatus::Delivered) + self.count(OrderStatus::Completed)
    }
}

impl Default for OrderStats {
    fn default() -> Self {
        Self::empty()
    }
}
