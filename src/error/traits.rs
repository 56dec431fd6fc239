//! Error classification for retry decisions.
//!
//! Errors self-describe whether a retry can help, which lets the router's
//! resynchronization loop stay generic over the store implementation.

use std::time::Duration;

use super::common::*;

/// Classification of error types for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient errors that may resolve on retry (connection loss, timeouts)
    Transient,
    /// Permanent errors that won't resolve on retry (bad rows, illegal transitions)
    Permanent,
    /// Internal errors (bugs, unexpected state)
    Internal,
}

/// Trait for errors that can classify themselves for retry logic.
pub trait ErrorClassification {
    /// Returns the category of this error
    fn category(&self) -> ErrorCategory;

    /// Returns true if this error is transient and may succeed on retry
    fn is_transient(&self) -> bool {
        matches!(self.category(), ErrorCategory::Transient)
    }

    /// Returns true if this error is permanent and won't succeed on retry
    fn is_permanent(&self) -> bool {
        matches!(self.category(), ErrorCategory::Permanent)
    }
}

impl ErrorClassification for NormalizationError {
    fn category(&self) -> ErrorCategory {
        // Bad rows stay bad; retrying re-parses the same snapshot.
        ErrorCategory::Permanent
    }
}

impl ErrorClassification for StoreError {
    fn category(&self) -> ErrorCategory {
        match self {
            StoreError::Connection(_) => ErrorCategory::Transient,
            StoreError::Fetch { .. } => ErrorCategory::Transient,
            StoreError::Write { .. } => ErrorCategory::Transient,
            StoreError::RowNotFound { .. } => ErrorCategory::Permanent,
        }
    }
}

impl ErrorClassification for SyncError {
    fn category(&self) -> ErrorCategory {
        match self {
            SyncError::InvalidTransition { .. } => ErrorCategory::Permanent,
            SyncError::UnknownOrder(_) => ErrorCategory::Permanent,
            SyncError::UnknownTenant(_) => ErrorCategory::Permanent,
            SyncError::StreamDisconnected => ErrorCategory::Transient,
            SyncError::ResyncFailed(_) => ErrorCategory::Transient,
            SyncError::Store(err) => err.category(),
            SyncError::Normalization(err) => err.category(),
        }
    }
}

/// Retry an async operation with exponential backoff, for transient errors.
///
/// Permanent errors are returned immediately. The delay doubles per attempt
/// up to `max_delay`.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
) -> Result<T, E>
where
    E: ErrorClassification + std::fmt::Debug,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut delay = initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempts += 1;

                if !err.is_transient() || attempts >= max_attempts {
                    return Err(err);
                }

                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, max_delay);
            }
        }
    }
}
