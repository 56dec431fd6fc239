//! Canonical order model and shared status lifecycle.
//!
//! This module provides the source-agnostic order representation and the one
//! state machine every order source answers to:
//!
//! - **Canonical model**: [`CanonicalOrder`] plus the id/enum vocabulary
//! - **Lifecycle**: [`OrderStatus`] with validated transitions
//! - **Transition guard**: [`TransitionGuard`], the only writer of `status`
//!
//! # Lifecycle
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌────────────┐   ┌───────────┐
//! │ Pending ├──►│ Confirmed ├──►│ Processing ├──►│ InTransit │
//! └────┬────┘   └─────┬─────┘   └──────┬─────┘   └─────┬─────┘
//!      │              │                │               │
//!      │              │                │               ▼
//!      │              │                │      ┌─────────────────────┐
//!      │              │                │      │ Delivered/Completed │
//!      │              │                │      └─────────────────────┘
//!      ▼              ▼                ▼
//!   Cancelled | Rejected | Refunded  (absorbing, from any open state)
//! ```
//!
//! `Delivered` and `Completed` are terminal synonyms; aggregation treats
//! them identically. The absorbing states accept no further transitions -
//! a refund of a delivered order is a new record, not an edge.

mod lifecycle;
mod order;
mod types;

pub use lifecycle::TransitionGuard;
pub use order::CanonicalOrder;
pub use types::{
    Counterparty, CustomerId, OrderId, OrderSource, OrderStatus, OrganizationId, SourceRef,
    SourceTable, TenantId,
};
