//! Error taxonomy for the order core.
//!
//! Adapter and router failures are recovered locally (row/event dropped and
//! logged); transition failures are always surfaced to the caller that asked
//! for them. Nothing in this module is allowed to leave stats or a live view
//! partially updated.

use thiserror::Error;

use crate::orders::{OrderId, OrderStatus, SourceTable, TenantId};

/// A source row could not be turned into a canonical record.
///
/// The row is dropped and logged - never zero-filled, which would corrupt the
/// aggregates - and there is no retry: the same row will fail the same way.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum NormalizationError {
    /// A required field (amount, counterparty, id, ...) is absent
    #[error("required field missing: {field}")]
    MissingField { field: &'static str },

    /// A required field is present but unusable
    #[error("field '{field}' is malformed: {reason}")]
    MalformedField { field: &'static str, reason: String },

    /// Amounts must be non-negative
    #[error("amount {value} is negative")]
    NegativeAmount { value: String },
}

impl NormalizationError {
    /// Create a MissingField error
    pub fn missing(field: &'static str) -> Self {
        NormalizationError::MissingField { field }
    }

    /// Create a MalformedField error
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        NormalizationError::MalformedField {
            field,
            reason: reason.into(),
        }
    }
}

/// Store port failures.
///
/// The persistence layer is a black box; these wrap whatever it reports.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum StoreError {
    /// Subscribing to the change stream failed
    #[error("store connection failed: {0}")]
    Connection(String),

    /// A resynchronization fetch failed
    #[error("fetch from {table} failed: {reason}")]
    Fetch { table: SourceTable, reason: String },

    /// A status write was refused
    #[error("write to {table}/{row_id} failed: {reason}")]
    Write {
        table: SourceTable,
        row_id: String,
        reason: String,
    },

    /// The targeted row no longer exists
    #[error("row not found: {table}/{row_id}")]
    RowNotFound { table: SourceTable, row_id: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Top-level error type for the synchronization core.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    /// The requested status change is not an edge of the lifecycle.
    /// The record is left untouched.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// No canonical record with this id in the tenant's visible set
    #[error("order not found: {0}")]
    UnknownOrder(OrderId),

    /// No active stream for the tenant; call `connect` first
    #[error("no active stream for tenant {0}")]
    UnknownTenant(TenantId),

    /// The change stream dropped. Transient: the router resynchronizes on
    /// reconnect instead of surfacing this to views.
    #[error("change stream disconnected")]
    StreamDisconnected,

    /// The post-reconnect resynchronization fetch failed. Views on the
    /// tenant are shown as degraded until a retry succeeds.
    #[error("resynchronization failed: {0}")]
    ResyncFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

pub type SyncResult<T> = Result<T, SyncError>;
