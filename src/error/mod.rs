//! Consolidated error handling for the order core.
//!
//! This module provides:
//! - The error taxonomy (normalization, store, sync)
//! - Error classification for retry logic

mod common;
mod traits;

pub use common::*;
pub use traits::*;
