//! # Sales Metrics
//!
//! Pure reductions behind the analytics report: daily trend, product
//! ranking, growth and average order value.
//!
//! ## Where Each Metric Comes From
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repository rows (bounded)          Pure reduction (this module)        │
//! │  ─────────────────────────          ─────────────────────────────       │
//! │  (created_at, total) per order ──► daily_series()   zero-filled days    │
//! │  Σ qty, Σ revenue per product  ──► rank_products()  top N               │
//! │  count + Σ total per window    ──► Growth::between() "+12.5%" / "0%"    │
//! │                                    average_order_value()               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::window::AggregationWindow;

// =============================================================================
// Metric Rows
// =============================================================================

/// Orders and revenue for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub orders: i64,
    pub revenue_cents: i64,
}

/// Units and revenue sold for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: i64,
    /// Name snapshot taken from the line items.
    pub name: String,
    pub units_sold: i64,
    pub revenue_cents: i64,
}

/// Order count and revenue of one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct WindowTotals {
    pub orders: i64,
    pub revenue_cents: i64,
}

impl WindowTotals {
    #[inline]
    pub fn revenue(&self) -> Money {
        Money::from_cents(self.revenue_cents)
    }

    /// Revenue per order, zero when there are no orders.
    pub fn average_order_value(&self) -> Money {
        average_order_value(self.revenue(), self.orders)
    }
}

// =============================================================================
// Daily Trend
// =============================================================================

/// Buckets `(created_at, total)` samples into the window's calendar days.
///
/// Every day of the window appears exactly once, ascending; days without
/// orders carry zeros. Samples outside the window are ignored.
pub fn daily_series<I>(window: &AggregationWindow, samples: I) -> Vec<DailySales>
where
    I: IntoIterator<Item = (DateTime<Utc>, Money)>,
{
    let mut buckets: BTreeMap<NaiveDate, (i64, Money)> = window
        .calendar_days()
        .map(|day| (day, (0, Money::zero())))
        .collect();

    let zone = window.zone();
    for (created_at, total) in samples {
        if !window.contains(created_at) {
            continue;
        }
        if let Some((orders, revenue)) = buckets.get_mut(&zone.date_of(created_at)) {
            *orders += 1;
            *revenue += total;
        }
    }

    buckets
        .into_iter()
        .map(|(date, (orders, revenue))| DailySales {
            date,
            orders,
            revenue_cents: revenue.cents(),
        })
        .collect()
}

// =============================================================================
// Product Ranking
// =============================================================================

/// Ranking order: units sold desc, then revenue desc, then product id asc.
pub fn compare_product_sales(a: &ProductSales, b: &ProductSales) -> Ordering {
    b.units_sold
        .cmp(&a.units_sold)
        .then_with(|| b.revenue_cents.cmp(&a.revenue_cents))
        .then_with(|| a.product_id.cmp(&b.product_id))
}

/// Sorts by [`compare_product_sales`] and keeps the first `limit`.
pub fn rank_products(mut rows: Vec<ProductSales>, limit: usize) -> Vec<ProductSales> {
    rows.sort_by(compare_product_sales);
    rows.truncate(limit);
    rows
}

// =============================================================================
// Growth
// =============================================================================

/// Period-over-period change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Growth {
    /// The previous window had nothing to compare against. Renders as `0%`.
    NoBaseline,
    /// Percentage change rounded to one decimal.
    Percent(f64),
}

impl Growth {
    /// `(current - previous) / previous * 100`, rounded to one decimal.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::metrics::Growth;
    ///
    /// assert_eq!(Growth::between(600.0, 200.0).to_string(), "+200.0%");
    /// assert_eq!(Growth::between(50.0, 100.0).to_string(), "-50.0%");
    /// assert_eq!(Growth::between(10.0, 0.0).to_string(), "0%");
    /// ```
    pub fn between(current: f64, previous: f64) -> Self {
        if previous <= 0.0 || !previous.is_finite() {
            return Growth::NoBaseline;
        }

        let raw = (current - previous) / previous * 100.0;
        let rounded = (raw * 10.0).round() / 10.0;
        // -0.0 would render as "-0.0%"
        Growth::Percent(if rounded == 0.0 { 0.0 } else { rounded })
    }

    /// Growth of order counts.
    pub fn of_orders(current: &WindowTotals, previous: &WindowTotals) -> Self {
        Growth::between(current.orders as f64, previous.orders as f64)
    }

    /// Growth of revenue.
    pub fn of_revenue(current: &WindowTotals, previous: &WindowTotals) -> Self {
        Growth::between(current.revenue_cents as f64, previous.revenue_cents as f64)
    }

    /// Numeric percentage; `0.0` when there is no baseline.
    pub fn percent(&self) -> f64 {
        match self {
            Growth::NoBaseline => 0.0,
            Growth::Percent(p) => *p,
        }
    }
}

/// `0%`, `+12.5%`, `-3.0%`.
impl fmt::Display for Growth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Growth::NoBaseline => f.write_str("0%"),
            Growth::Percent(p) => write!(f, "{:+.1}%", p),
        }
    }
}

// =============================================================================
// Average Order Value
// =============================================================================

/// `revenue / orders` to the cent; zero when `orders` is zero.
pub fn average_order_value(revenue: Money, orders: i64) -> Money {
    revenue.divide_rounded(orders)
}

// =============================================================================
// Unit Tests
// =============================================================================
