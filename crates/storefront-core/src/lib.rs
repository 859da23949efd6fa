//! # storefront-core: Pure Domain Logic for Order Intake and Sales Analytics
//!
//! Orders, line items, analytics events, aggregation windows and the metric
//! reductions behind the sales report. Nothing in here touches a database,
//! a socket or the system clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Storefront Analytics Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               storefront-engine (Ledger + Facade)               │   │
//! │  │    place_order ──► EventRecorder ──► get_analytics(days)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │   │  types  │ │  money  │ │  window  │ │ metrics │ │validatn │ │   │
//! │  │   │  Order  │ │  Money  │ │ Window   │ │ Growth  │ │  rules  │ │   │
//! │  │   │  Event  │ │         │ │ Zone     │ │ ranking │ │         │ │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 storefront-db (Database Layer)                  │   │
//! │  │          SQLite pool, migrations, typed repositories            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Orders, line items, statuses, analytics events
//! - [`money`] - Integer-cent money
//! - [`window`] - Calendar-aligned aggregation windows in a fixed zone
//! - [`metrics`] - Daily series, product ranking, growth, average order value
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::metrics::Growth;
//! use storefront_core::money::Money;
//!
//! let total = Money::from_cents(1099).multiply_quantity(3);
//! assert_eq!(total.cents(), 3297);
//!
//! assert_eq!(Growth::between(600.0, 200.0).to_string(), "+200.0%");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod metrics;
pub mod money;
pub mod types;
pub mod validation;
pub mod window;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use metrics::{DailySales, Growth, ProductSales, WindowTotals};
pub use money::Money;
pub use types::*;
pub use window::{AggregationWindow, ReportingZone};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items in a single order.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity on a single line item.
///
/// Catches typos like 1000 for 10 before they reach the ledger.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of an event name tag.
pub const MAX_EVENT_NAME_LEN: usize = 64;

/// Report window used when the caller does not pick one.
pub const DEFAULT_REPORT_DAYS: u32 = 30;

/// Upper bound on `days` for a report.
pub const MAX_REPORT_DAYS: u32 = 365;

/// Length of the popular-products ranking.
pub const DEFAULT_TOP_PRODUCTS: usize = 10;

/// Number of recent orders shown in a report.
pub const DEFAULT_RECENT_ORDERS: usize = 10;
