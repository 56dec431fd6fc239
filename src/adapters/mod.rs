//! Source adapters - one per order-producing system.
//!
//! Each adapter translates rows of its source table into [`CanonicalOrder`]s
//! and translates canonical status assignments back into the source's own
//! status vocabulary. Normalization is a total, pure function over the row
//! snapshot: no I/O, no partial results. A row missing a required field
//! (amount, counterparty, id) is rejected with a [`NormalizationError`] -
//! the caller drops and logs it rather than zero-filling, which would poison
//! the aggregates.
//!
//! Unknown source statuses are *not* rejected: they normalize to `Pending`
//! with `needs_review` set, because dropping an order from every dashboard is
//! worse than miscategorizing it.

mod menu;
mod pos;
mod retail;
mod wholesale;

pub use menu::MenuAdapter;
pub use pos::PosAdapter;
pub use retail::RetailAdapter;
pub use wholesale::WholesaleAdapter;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::NormalizationError;
use crate::orders::{CanonicalOrder, OrderSource, OrderStatus, SourceTable, TenantId};

/// Translation seam between one source system and the canonical model.
///
/// Implementations are stateless and cheap to share; the registry hands out
/// `Arc`s to the same instances for the life of the process.
pub trait SourceAdapter: Send + Sync {
    /// The source system this adapter covers
    fn source(&self) -> OrderSource;

    /// The store table carrying this source's rows
    fn table(&self) -> SourceTable {
        self.source().table()
    }

    /// Extract the source row id from a snapshot.
    ///
    /// Delete events may carry only the row key, so this must not require a
    /// full row.
    fn row_key(&self, row: &Value) -> Result<String, NormalizationError> {
        require_str(row, "id")
    }

    /// Translate a source row snapshot into a canonical record.
    fn normalize(
        &self,
        tenant: &TenantId,
        row: &Value,
    ) -> Result<CanonicalOrder, NormalizationError>;

    /// Translate a canonical status into the source's native vocabulary,
    /// for writes going back through the store.
    fn source_status(&self, status: OrderStatus) -> &'static str;
}

/// Fixed lookup of adapters by source table.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceTable, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// Registry with all four source adapters.
    pub fn all_sources() -> Self {
        let adapters: [Arc<dyn SourceAdapter>; 4] = [
            Arc::new(RetailAdapter),
            Arc::new(WholesaleAdapter),
            Arc::new(MenuAdapter),
            Arc::new(PosAdapter),
        ];
        Self {
            adapters: adapters.into_iter().map(|a| (a.table(), a)).collect(),
        }
    }

    /// Adapter for a store table, if it is one of the order tables
    pub fn for_table(&self, table: SourceTable) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.get(&table)
    }

    /// Adapter for a source system
    pub fn for_source(&self, source: OrderSource) -> &Arc<dyn SourceAdapter> {
        // Every source is registered by construction.
        &self.adapters[&source.table()]
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::all_sources()
    }
}

// -----------------------------------------------------------------------
// Row extraction helpers shared by the adapters
// -----------------------------------------------------------------------

/// Extract a required string field. Numeric ids are stringified, since some
/// source schemas use serial keys.
pub(crate) fn require_str(row: &Value, field: &'static str) -> Result<String, NormalizationError> {
    match row.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Null) | None => Err(NormalizationError::missing(field)),
        Some(other) => Err(NormalizationError::malformed(
            field,
            format!("unexpected type: {}", other),
        )),
    }
}

/// Extract an optional string field.
pub(crate) fn optional_str(row: &Value, field: &str) -> Option<String> {
    match row.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract a required non-negative decimal amount.
///
/// Amounts arrive as JSON strings or numbers; both are parsed through their
/// literal text so the decimal value is exact - no float round-trip.
pub(crate) fn require_amount(
    row: &Value,
    field: &'static str,
) -> Result<Decimal, NormalizationError> {
    let amount = match row.get(field) {
        Some(Value::String(s)) => Decimal::from_str(s)
            .map_err(|e| NormalizationError::malformed(field, e.to_string()))?,
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
            .map_err(|e| NormalizationError::malformed(field, e.to_string()))?,
        Some(Value::Null) | None => return Err(NormalizationError::missing(field)),
        Some(other) => {
            return Err(NormalizationError::malformed(
                field,
                format!("unexpected type: {}", other),
            ))
        }
    };
    if amount.is_sign_negative() {
        return Err(NormalizationError::NegativeAmount {
            value: amount.to_string(),
        });
    }
    Ok(amount)
}

/// Extract an RFC 3339 timestamp, falling back to the epoch when the field
/// is absent or unparsable. Timestamps are not required fields; the router
/// overrides `updated_at` with the server timestamp of the event anyway.
pub(crate) fn timestamp_or_epoch(row: &Value, field: &str) -> DateTime<Utc> {
    row.get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_require_str_accepts_numbers() {
        let row = json!({"id": 42});
        assert_eq!(require_str(&row, "id").unwrap(), "42");
    }

    #[test]
    fn test_require_str_missing() {
        let row = json!({"id": null});
        assert_eq!(
            require_str(&row, "id"),
            Err(NormalizationError::missing("id"))
        );
    }

    #[test]
    fn test_require_amount_is_exact_from_number_literal() {
        let row = json!({"total_amount": 19.99});
        assert_eq!(require_amount(&row, "total_amount").unwrap(), dec!(19.99));
    }

    #[test]
    fn test_require_amount_from_string() {
        let row = json!({"total_amount": "500.00"});
        assert_eq!(require_amount(&row, "total_amount").unwrap(), dec!(500.00));
    }

    #[test]
    fn test_require_amount_rejects_negative() {
        let row = json!({"total_amount": "-5"});
        assert!(matches!(
            require_amount(&row, "total_amount"),
            Err(NormalizationError::NegativeAmount { .. })
        ));
    }

    #[test]
    fn test_timestamp_fallback() {
        let row = json!({"created_at": "not-a-time"});
        assert_eq!(timestamp_or_epoch(&row, "created_at"), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_registry_covers_every_table() {
        let registry = AdapterRegistry::all_sources();
        for table in SourceTable::ALL {
            let adapter = registry.for_table(table).expect("adapter registered");
            assert_eq!(adapter.table(), table);
        }
    }
}
