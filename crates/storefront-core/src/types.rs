//! # Domain Types
//!
//! Core domain types shared by the ledger, the event log and the reports.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │   OrderItem     │   │ AnalyticsEvent  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (monotonic) │◄──│  order_id (FK)  │   │  id (monotonic) │       │
//! │  │  reference      │   │  product_id     │   │  event          │       │
//! │  │  total_cents    │   │  name_snapshot  │   │  value          │       │
//! │  │  status         │   │  unit_price     │   │  metadata(JSON) │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │  OrderStatus    │   │   EventName     │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  Received       │   │  order_placed   │                             │
//! │  │  Processing     │   │  product_sold   │                             │
//! │  │  Completed  ■   │   │  page_view ...  │                             │
//! │  │  Cancelled  ■   │   │  Custom(String) │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! │                         ■ = terminal                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Orders carry a monotonic integer `id` (database relations, ordering) and a
//! UUID `reference` that is safe to hand to customers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle status of an order.
///
/// ## Transitions
/// ```text
///   received ──► processing ──► completed ■
///      │              │
///      │              └───────► cancelled ■
///      ├──────────────────────► completed ■
///      └──────────────────────► cancelled ■
/// ```
/// Transitions only move forward; terminal statuses never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order accepted by the ledger. Every order starts here.
    Received,
    /// Order is being prepared.
    Processing,
    /// Order was fulfilled.
    Completed,
    /// Order was cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Position in the lifecycle; terminal statuses share the last rank.
    const fn rank(self) -> u8 {
        match self {
            OrderStatus::Received => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Completed | OrderStatus::Cancelled => 2,
        }
    }

    /// Returns true for `completed` and `cancelled`.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Checks whether moving to `next` is a forward, legal transition.
    pub const fn can_transition_to(self, next: OrderStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Validates a transition for `order_id`.
    pub fn ensure_transition(self, order_id: i64, next: OrderStatus) -> CoreResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidStatusTransition {
                order_id,
                from: self,
                to: next,
            })
        }
    }

    /// The lowercase name stored in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Received
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "received" => Ok(OrderStatus::Received),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: "must be one of received, processing, completed, cancelled".to_string(),
            }),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Monotonic identifier assigned by the database.
    pub id: i64,

    /// Public UUID v4 reference.
    pub reference: String,

    /// Server-computed total in cents (Σ quantity × unit price).
    pub total_cents: i64,

    pub status: OrderStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern to freeze product data at time of order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    /// Catalog product id. The product may since have been removed.
    pub product_id: i64,
    /// Product name at time of order (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Unit price in cents at time of order (frozen).
    pub unit_price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns quantity × unit price.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// An order together with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderWithItems {
    /// Σ line totals; equals `order.total()` for every order the ledger wrote.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

// =============================================================================
// Order Input
// =============================================================================

/// One requested line of a new order, as sent by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        OrderLine {
            product_id,
            quantity,
        }
    }
}

/// A fully priced order ready to be written atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub reference: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Σ quantity × unit price over all items.
    pub fn total(&self) -> Money {
        self.items.iter().map(NewOrderItem::line_total).sum()
    }
}

/// A priced line item that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl NewOrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product as the ledger sees it when pricing an order.
///
/// The catalog is owned elsewhere; line items copy `name` and `price_cents`
/// at order time and never join back to this row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Current price in cents.
    pub price_cents: i64,
    /// Soft-delete flag. Inactive products cannot be ordered.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Analytics Events
// =============================================================================

/// Names of business events.
///
/// The set is recognized but open: unknown names round-trip through
/// [`EventName::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    OrderPlaced,
    OrderCompleted,
    ProductSold,
    ProductView,
    AddToCart,
    PageView,
    Custom(String),
}

impl EventName {
    pub fn as_str(&self) -> &str {
        match self {
            EventName::OrderPlaced => "order_placed",
            EventName::OrderCompleted => "order_completed",
            EventName::ProductSold => "product_sold",
            EventName::ProductView => "product_view",
            EventName::AddToCart => "add_to_cart",
            EventName::PageView => "page_view",
            EventName::Custom(name) => name,
        }
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "order_placed" => EventName::OrderPlaced,
            "order_completed" => EventName::OrderCompleted,
            "product_sold" => EventName::ProductSold,
            "product_view" => EventName::ProductView,
            "add_to_cart" => EventName::AddToCart,
            "page_view" => EventName::PageView,
            other => EventName::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, recorded business event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: i64,
    pub event: String,
    /// Revenue, quantity or 1 for plain counters.
    pub value: Option<f64>,
    /// Serialized JSON object.
    pub metadata: Option<String>,
    pub user_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn event_name(&self) -> EventName {
        EventName::from(self.event.as_str())
    }

    /// Parses the stored metadata. Unparseable metadata reads as absent.
    pub fn metadata_json(&self) -> Option<serde_json::Value> {
        self.metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// An event that has not been recorded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalyticsEvent {
    pub event: EventName,
    pub value: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl NewAnalyticsEvent {
    pub fn new(event: EventName, created_at: DateTime<Utc>) -> Self {
        NewAnalyticsEvent {
            event,
            value: None,
            metadata: None,
            user_id: None,
            created_at,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_user(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Metadata as the string that gets stored.
    pub fn metadata_string(&self) -> Option<String> {
        self.metadata.as_ref().map(|m| m.to_string())
    }
}

/// Count and value sum of one event name inside a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EventCount {
    pub event: String,
    pub count: i64,
    pub total_value: f64,
}

// =============================================================================
// Unit Tests
// =============================================================================
