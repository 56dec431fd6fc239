//! Core identifier and enum types for the canonical order model.
//!
//! This module defines the fundamental types used throughout the order core:
//! - `OrderSource` - which of the four order-producing systems a record came from
//! - `OrderStatus` - shared lifecycle from Pending to the terminal states
//! - `SourceTable` / `SourceRef` - pointers back to the originating store rows
//! - `Counterparty` - the customer or organization an order belongs to
//! - Newtype ids (`TenantId`, `OrderId`, ...) to prevent mixing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant identifier - every query, subscription, and stream is scoped by this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    /// Create a new TenantId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Canonical order identifier - opaque, unique within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// Create a new OrderId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the canonical id for a source row.
    ///
    /// Source row ids are only unique within their own table, so the table
    /// name is folded in to keep ids unique across order types.
    pub fn from_ref(source_ref: &SourceRef) -> Self {
        Self(format!("{}:{}", source_ref.table.as_str(), source_ref.row_id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Customer reference for retail/menu/pos orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client/organization reference for wholesale orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub String);

impl OrganizationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The party an order belongs to - exactly one variant is ever populated.
///
/// Wholesale orders reference an organization; all consumer-facing sources
/// reference a customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Counterparty {
    Customer(CustomerId),
    Organization(OrganizationId),
}

impl Counterparty {
    /// Returns true if this is a consumer-side counterparty
    pub fn is_customer(&self) -> bool {
        matches!(self, Counterparty::Customer(_))
    }

    /// Returns true if this is a wholesale client/organization
    pub fn is_organization(&self) -> bool {
        matches!(self, Counterparty::Organization(_))
    }
}

impl fmt::Display for Counterparty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counterparty::Customer(id) => write!(f, "customer:{}", id),
            Counterparty::Organization(id) => write!(f, "org:{}", id),
        }
    }
}

/// Order-producing source system. Immutable once a canonical record exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSource {
    /// Online retail storefront
    Retail,
    /// B2B wholesale ordering
    Wholesale,
    /// Menu/kiosk ordering
    Menu,
    /// In-store point of sale
    Pos,
}

impl OrderSource {
    /// All sources, in routing order
    pub const ALL: [OrderSource; 4] = [
        OrderSource::Retail,
        OrderSource::Wholesale,
        OrderSource::Menu,
        OrderSource::Pos,
    ];

    /// The store table this source's rows live in
    pub fn table(&self) -> SourceTable {
        match self {
            OrderSource::Retail => SourceTable::RetailOrders,
            OrderSource::Wholesale => SourceTable::WholesaleOrders,
            OrderSource::Menu => SourceTable::MenuOrders,
            OrderSource::Pos => SourceTable::PosOrders,
        }
    }

    /// The terminal status this source conventionally resolves to.
    ///
    /// Delivery-bearing wholesale orders end in `Delivered`; the
    /// consumer-facing sources end in `Completed`. Both are accepted by the
    /// lifecycle either way - this only records the convention.
    pub fn conventional_terminal(&self) -> OrderStatus {
        match self {
            OrderSource::Wholesale => OrderStatus::Delivered,
            _ => OrderStatus::Completed,
        }
    }
}

impl fmt::Display for OrderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSource::Retail => write!(f, "RETAIL"),
            OrderSource::Wholesale => write!(f, "WHOLESALE"),
            OrderSource::Menu => write!(f, "MENU"),
            OrderSource::Pos => write!(f, "POS"),
        }
    }
}

/// Store tables carrying source order rows, one per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    RetailOrders,
    WholesaleOrders,
    MenuOrders,
    PosOrders,
}

impl SourceTable {
    /// All order tables, the fixed subscription set for a tenant stream
    pub const ALL: [SourceTable; 4] = [
        SourceTable::RetailOrders,
        SourceTable::WholesaleOrders,
        SourceTable::MenuOrders,
        SourceTable::PosOrders,
    ];

    /// Table name as the store knows it
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTable::RetailOrders => "retail_orders",
            SourceTable::WholesaleOrders => "wholesale_orders",
            SourceTable::MenuOrders => "menu_orders",
            SourceTable::PosOrders => "pos_orders",
        }
    }

    /// The source system whose rows this table carries
    pub fn source(&self) -> OrderSource {
        match self {
            SourceTable::RetailOrders => OrderSource::Retail,
            SourceTable::WholesaleOrders => OrderSource::Wholesale,
            SourceTable::MenuOrders => OrderSource::Menu,
            SourceTable::PosOrders => OrderSource::Pos,
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pointer back to the originating source-specific row.
///
/// Used only for adapter refresh and store writes, never for business logic.
/// Together with the tenant this uniquely identifies a canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub table: SourceTable,
    pub row_id: String,
}

impl SourceRef {
    /// Create a new SourceRef
    pub fn new(table: SourceTable, row_id: impl Into<String>) -> Self {
        Self {
            table,
            row_id: row_id.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.row_id)
    }
}

/// Shared order lifecycle, one vocabulary across all four sources.
///
/// State transitions:
/// ```text
/// Pending → Confirmed → Processing → InTransit → Delivered/Completed
///     │         │            │           │
///     └─────────┴────────────┴───────────┴──► Cancelled | Rejected | Refunded
/// ```
///
/// `Cancelled`, `Rejected`, and `Refunded` are absorbing: reachable from any
/// non-terminal state, with no outgoing transitions. `Delivered` and
/// `Completed` are terminal synonyms - delivery-bearing orders resolve to the
/// former, counter/kiosk orders to the latter - and aggregate identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Received but not yet acknowledged
    Pending,
    /// Acknowledged by the operator
    Confirmed,
    /// Being prepared/picked/packed
    Processing,
    /// Out for delivery
    InTransit,
    /// Handed to the counterparty (delivery-bearing terminal)
    Delivered,
    /// Fulfilled at the counter/kiosk (non-delivery terminal)
    Completed,
    /// Cancelled before fulfilment (absorbing)
    Cancelled,
    /// Rejected by the operator (absorbing)
    Rejected,
    /// Refunded after the fact (absorbing)
    Refunded,
}

impl OrderStatus {
    /// All lifecycle states
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Rejected,
        OrderStatus::Refunded,
    ];

    /// Returns true for the absorbing states (reachable from any non-terminal
    /// state, no outgoing transitions)
    pub fn is_absorbing(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Refunded
        )
    }

    /// Returns true if the order was fulfilled (happy-path terminal)
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Completed)
    }

    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        self.is_fulfilled() || self.is_absorbing()
    }

    /// Returns true if the order is still in flight (counts toward the
    /// open-order aggregates)
    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this status contributes to revenue.
    ///
    /// Absorbing states are excluded; everything else - including orders
    /// still in flight - counts.
    pub fn counts_toward_revenue(&self) -> bool {
        !self.is_absorbing()
    }

    /// Returns true if `next` is the immediate happy-path successor of this
    /// status. Both terminal synonyms are accepted after `InTransit`.
    pub fn is_successor(&self, next: OrderStatus) -> bool {
        match self {
            OrderStatus::Pending => next == OrderStatus::Confirmed,
            OrderStatus::Confirmed => next == OrderStatus::Processing,
            OrderStatus::Processing => next == OrderStatus::InTransit,
            OrderStatus::InTransit => next.is_fulfilled(),
            _ => false,
        }
    }

    /// Check if a transition from this status to `next` is legal.
    ///
    /// A transition is legal iff `next` is absorbing, or the immediate
    /// happy-path successor, or equal to the current status (idempotent
    /// no-op). Everything else is rejected without mutation.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if next == *self {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.is_absorbing() || self.is_successor(next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Confirmed => write!(f, "CONFIRMED"),
            OrderStatus::Processing => write!(f, "PROCESSING"),
            OrderStatus::InTransit => write!(f, "IN_TRANSIT"),
            OrderStatus::Delivered => write!(f, "DELIVERED"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
            OrderStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}
