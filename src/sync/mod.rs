//! Real-time synchronization: change routing, view materialization, and the
//! live feed facade.
//!
//! The pipeline, per tenant:
//!
//! ```text
//! store change stream ──► ChangeEventRouter ──► broadcast<OrderDelta>
//!                              │                     │
//!                        CanonicalSet          per-view task
//!                      (single writer)    (DeltaCoalescer + private
//!                                          MaterializedView + stats)
//! ```
//!
//! Tenants never share mutable state; views never share their materialized
//! sets. The authoritative write path for `status` is the transition guard,
//! not any view.

pub mod debounce;
pub mod events;
pub mod manager;
pub mod router;
pub mod view;

pub use debounce::{DeltaCoalescer, FlushDecision};
pub use events::{ChangeEvent, ChangeOp, OrderDelta, StreamStatus};
pub use manager::{LiveOrderFeed, ViewCallback, ViewSubscription, ViewUpdate};
pub use router::{CanonicalSet, ChangeEventRouter, RouterHandles, TenantState};
pub use view::{MaterializedView, OrderFilter};
