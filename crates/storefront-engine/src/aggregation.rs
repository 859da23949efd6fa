//! # Aggregation Engine
//!
//! Read-only reductions over orders and events for one window.
//!
//! ## Report Groups
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Aggregation (all groups concurrent)                  │
//! │                                                                         │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐ ┌──────────────┐   │
//! │  │   summary    │ │  dailySales  │ │  popular-    │ │  recent-     │   │
//! │  │ window +     │ │ zero-filled  │ │  Products    │ │  Orders      │   │
//! │  │ previous     │ │ per day      │ │  top N       │ │  newest K    │   │
//! │  └──────────────┘ └──────────────┘ └──────────────┘ └──────────────┘   │
//! │  ┌──────────────┐                                                       │
//! │  │  eventStats  │   A failing group yields its default value and a     │
//! │  │ per name     │   DegradedGroup entry; the others are unaffected.    │
//! │  └──────────────┘                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};
use ts_rs::TS;

use storefront_core::metrics::{daily_series, rank_products};
use storefront_core::{
    AggregationWindow, DailySales, EventCount, OrderWithItems, ProductSales, WindowTotals,
};
use storefront_db::OrderRepository;

use crate::error::EngineResult;
use crate::events::EventStore;

/// The independently computed parts of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum ReportGroup {
    /// Totals for the window and the previous window (growth, average).
    Summary,
    DailySales,
    PopularProducts,
    RecentOrders,
    EventStats,
}

impl fmt::Display for ReportGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportGroup::Summary => "summary",
            ReportGroup::DailySales => "dailySales",
            ReportGroup::PopularProducts => "popularProducts",
            ReportGroup::RecentOrders => "recentOrders",
            ReportGroup::EventStats => "eventStats",
        };
        f.write_str(name)
    }
}

/// A group that failed and was replaced by its default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DegradedGroup {
    pub group: ReportGroup,
    pub error: String,
}

/// Everything the engine computed for one window.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    pub current: WindowTotals,
    pub previous: WindowTotals,
    pub daily_sales: Vec<DailySales>,
    pub popular_products: Vec<ProductSales>,
    pub recent_orders: Vec<OrderWithItems>,
    pub event_stats: Vec<EventCount>,
    pub degraded: Vec<DegradedGroup>,
}

impl Aggregates {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Computes [`Aggregates`] from the order ledger and the event log.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    orders: OrderRepository,
    events: EventStore,
    top_products: usize,
    recent_orders: u32,
}

impl AggregationEngine {
    pub fn new(
        orders: OrderRepository,
        events: EventStore,
        top_products: usize,
        recent_orders: u32,
    ) -> Self {
        AggregationEngine {
            orders,
            events,
            top_products,
            recent_orders,
        }
    }

    /// Runs every group concurrently. Never fails as a whole.
    pub async fn aggregate(&self, window: &AggregationWindow) -> Aggregates {
        debug!(
            start = %window.start(),
            end = %window.end(),
            days = window.days(),
            "Aggregating window"
        );

        let (summary, daily, popular, recent, stats) = tokio::join!(
            self.summary(window),
            self.daily_sales(window),
            self.popular_products(window),
            self.recent_orders(window),
            self.events.query_grouped_counts(window),
        );

        let mut degraded = Vec::new();
        let (current, previous) = settle(ReportGroup::Summary, summary, &mut degraded);

        Aggregates {
            current,
            previous,
            daily_sales: settle(ReportGroup::DailySales, daily, &mut degraded),
            popular_products: settle(ReportGroup::PopularProducts, popular, &mut degraded),
            recent_orders: settle(ReportGroup::RecentOrders, recent, &mut degraded),
            event_stats: settle(ReportGroup::EventStats, stats, &mut degraded),
            degraded,
        }
    }

    async fn summary(&self, window: &AggregationWindow) -> EngineResult<(WindowTotals, WindowTotals)> {
        let previous_window = window.previous();
        let (current, previous) = tokio::try_join!(
            self.orders.window_totals(window),
            self.orders.window_totals(&previous_window),
        )?;
        Ok((current, previous))
    }

    async fn daily_sales(&self, window: &AggregationWindow) -> EngineResult<Vec<DailySales>> {
        let samples = self.orders.window_samples(window).await?;
        Ok(daily_series(window, samples))
    }

    async fn popular_products(&self, window: &AggregationWindow) -> EngineResult<Vec<ProductSales>> {
        let rows = self
            .orders
            .product_sales(window, self.top_products as u32)
            .await?;
        Ok(rank_products(rows, self.top_products))
    }

    async fn recent_orders(&self, window: &AggregationWindow) -> EngineResult<Vec<OrderWithItems>> {
        Ok(self
            .orders
            .recent_in_window(window, self.recent_orders)
            .await?)
    }
}

/// The group's value, or its default plus a degraded entry.
fn settle<T: Default>(
    group: ReportGroup,
    result: EngineResult<T>,
    degraded: &mut Vec<DegradedGroup>,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(group = %group, error = %e, "Report group degraded");
            degraded.push(DegradedGroup {
                group,
                error: e.to_string(),
            });
            T::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use storefront_core::{NewAnalyticsEvent, NewOrder, NewOrderItem, OrderStatus, ReportingZone};
    use storefront_db::{Database, DbConfig};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 15, 0, 0).unwrap()
    }

    async fn insert(db: &Database, at: DateTime<Utc>, lines: &[(i64, i64, i64)]) {
        let order = NewOrder {
            reference: uuid::Uuid::new_v4().to_string(),
            status: OrderStatus::Received,
            created_at: at,
            items: lines
                .iter()
                .map(|&(product_id, quantity, unit_price_cents)| NewOrderItem {
                    product_id,
                    name_snapshot: format!("Product {}", product_id),
                    quantity,
                    unit_price_cents,
                })
                .collect(),
        };
        db.orders().insert(&order).await.unwrap();
    }

    fn engine(db: &Database) -> AggregationEngine {
        AggregationEngine::new(db.orders(), EventStore::new(db.events()), 10, 10)
    }

    #[tokio::test]
    async fn test_aggregate_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let window = AggregationWindow::ending_at(now(), 7, ReportingZone::utc()).unwrap();

        insert(&db, now() - Duration::hours(1), &[(1, 2, 500), (2, 1, 1000)]).await;
        insert(&db, now() - Duration::days(3), &[(2, 3, 1000)]).await;
        insert(&db, now() - Duration::days(9), &[(1, 1, 500)]).await;
        db.events()
            .append(&NewAnalyticsEvent::new("page_view".into(), now()).with_value(1.0))
            .await
            .unwrap();

        let aggregates = engine(&db).aggregate(&window).await;

        assert!(!aggregates.is_degraded());
        assert_eq!(aggregates.current.orders, 2);
        assert_eq!(aggregates.current.revenue_cents, 5000);
        assert_eq!(aggregates.previous.orders, 1);
        assert_eq!(aggregates.daily_sales.len(), 7);
        assert_eq!(aggregates.daily_sales[6].revenue_cents, 2000);
        assert_eq!(aggregates.daily_sales[3].orders, 1);
        assert_eq!(aggregates.popular_products[0].product_id, 2);
        assert_eq!(aggregates.popular_products[0].units_sold, 4);
        assert_eq!(aggregates.recent_orders.len(), 2);
        assert_eq!(aggregates.event_stats[0].event, "page_view");
    }

    #[tokio::test]
    async fn test_failing_group_degrades_alone() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert(&db, now(), &[(1, 1, 700)]).await;
        sqlx::query("DROP TABLE analytics_events")
            .execute(db.pool())
            .await
            .unwrap();

        let window = AggregationWindow::ending_at(now(), 1, ReportingZone::utc()).unwrap();
        let aggregates = engine(&db).aggregate(&window).await;

        assert_eq!(aggregates.degraded.len(), 1);
        assert_eq!(aggregates.degraded[0].group, ReportGroup::EventStats);
        assert!(aggregates.event_stats.is_empty());
        assert_eq!(aggregates.current.revenue_cents, 700);
        assert_eq!(aggregates.popular_products.len(), 1);
    }

    #[test]
    fn test_group_names_match_report_fields() {
        assert_eq!(ReportGroup::PopularProducts.to_string(), "popularProducts");
        assert_eq!(
            serde_json::to_value(ReportGroup::EventStats).unwrap(),
            serde_json::json!("eventStats")
        );
    }
}
