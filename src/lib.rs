// orders-common: Order aggregation and real-time synchronization core
// shared by the operations dashboard frontends.

pub mod adapters;
pub mod config;
pub mod error;
pub mod logging;
pub mod orders;
pub mod stats;
pub mod store;
pub mod sync;
