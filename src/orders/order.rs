//! The canonical order record - the unit of truth all views consume.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::{Counterparty, OrderId, OrderSource, OrderStatus, SourceRef, TenantId};

/// Normalized, source-agnostic order representation.
///
/// Produced exclusively by the source adapters; `status` is mutated
/// exclusively through the transition guard. `total_amount` is fixed once the
/// order leaves `Pending` - corrections go through a new record, so aggregates
/// that already counted the order never drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOrder {
    /// Opaque identifier, unique within the tenant
    pub id: OrderId,

    /// Owning tenant
    pub tenant_id: TenantId,

    /// Originating source system - immutable once created
    pub source: OrderSource,

    /// Human-readable, source-assigned number. Not unique across sources.
    pub order_number: String,

    /// Position in the shared lifecycle
    pub status: OrderStatus,

    /// Order total. Decimal-exact; never accumulated through floats.
    pub total_amount: Decimal,

    /// The customer or organization the order belongs to
    pub counterparty: Counterparty,

    /// When the source created the order
    pub created_at: DateTime<Utc>,

    /// Last mutation time; monotonically non-decreasing per record
    pub updated_at: DateTime<Utc>,

    /// Pointer to the originating source row, for adapter refresh only
    pub source_ref: SourceRef,

    /// Set when the source reported a status outside its known vocabulary
    /// and the record was coerced to `Pending` for operator review
    #[serde(default)]
    pub needs_review: bool,
}

impl CanonicalOrder {
    /// Returns true if the order is still in flight
    pub fn is_open(&self) -> bool {
        self.status.is_in_flight()
    }

    /// Returns true if this record may still change its `total_amount`.
    ///
    /// Only `Pending` orders may be re-priced by their source.
    pub fn amount_mutable(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Apply a row refresh produced by the same adapter, preserving the
    /// immutability rules of the canonical model.
    ///
    /// `source` never changes; `total_amount` only changes while the record
    /// is still `Pending`. Everything else follows the fresher row.
    pub fn absorb_refresh(&mut self, fresh: CanonicalOrder) {
        debug_assert_eq!(self.source, fresh.source);
        debug_assert_eq!(self.source_ref, fresh.source_ref);

        if self.amount_mutable() {
            self.total_amount = fresh.total_amount;
        }
        self.order_number = fresh.order_number;
        self.status = fresh.status;
        self.counterparty = fresh.counterparty;
        self.needs_review = fresh.needs_review;
        // updated_at never moves backwards
        if fresh.updated_at > self.updated_at {
            self.updated_at = fresh.updated_at;
        }
    }
}
