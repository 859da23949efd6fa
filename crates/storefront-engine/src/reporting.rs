//! # Reporting Facade
//!
//! The single read entry point: `days` in, report document out.
//!
//! ```text
//!   get_analytics(days)
//!        │  validate 1..=max_days            → Validation
//!        │  window = last `days` calendar days in the reporting zone
//!        ▼
//!   timeout(deadline, AggregationEngine::aggregate) → Timeout
//!        │
//!        ▼
//!   Report (camelCase JSON)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use ts_rs::TS;

use storefront_core::validation::validate_report_days;
use storefront_core::{
    AggregationWindow, DailySales, EventCount, Growth, Money, OrderWithItems, ProductSales,
    ReportingZone,
};

use crate::aggregation::{AggregationEngine, DegradedGroup};
use crate::clock::Clock;
use crate::config::ReportingSettings;
use crate::error::{EngineError, EngineResult};

/// The analytics document for one window.
///
/// Money amounts are integer cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total_revenue: Money,
    pub total_orders: i64,
    pub average_order_value: Money,
    /// Rendered growth: `0%`, `+12.5%`, `-3.0%`.
    pub order_growth: String,
    pub revenue_growth: String,
    pub daily_sales: Vec<DailySales>,
    pub popular_products: Vec<ProductSales>,
    pub recent_orders: Vec<OrderWithItems>,
    pub event_stats: Vec<EventCount>,
    /// Groups that failed and were replaced by empty values.
    pub degraded_groups: Vec<DegradedGroup>,
    /// Window length in days.
    pub time_range: u32,
    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "String")]
    pub end_date: NaiveDate,
    /// UTC offset calendar days are counted in.
    pub timezone: String,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
}

/// Validates report requests and bounds them with a deadline.
#[derive(Clone)]
pub struct ReportingFacade {
    engine: AggregationEngine,
    clock: Arc<dyn Clock>,
    zone: ReportingZone,
    default_days: u32,
    max_days: u32,
    timeout: Duration,
}

impl ReportingFacade {
    pub fn new(
        engine: AggregationEngine,
        clock: Arc<dyn Clock>,
        zone: ReportingZone,
        settings: &ReportingSettings,
    ) -> Self {
        ReportingFacade {
            engine,
            clock,
            zone,
            default_days: settings.default_days,
            max_days: settings.max_days,
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }

    /// Report for the configured default number of days.
    pub async fn get_default_analytics(&self) -> EngineResult<Report> {
        self.get_analytics(i64::from(self.default_days)).await
    }

    /// Report for the `days` calendar days ending today.
    pub async fn get_analytics(&self, days: i64) -> EngineResult<Report> {
        let days = validate_report_days(days, self.max_days)?;
        let now = self.clock.now();
        let window = AggregationWindow::ending_at(now, days, self.zone)?;

        debug!(days = days, zone = %self.zone, "Building report");
        let started = Instant::now();

        let aggregates = tokio::time::timeout(self.timeout, self.engine.aggregate(&window))
            .await
            .map_err(|_| EngineError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })?;

        let current = aggregates.current;
        let previous = aggregates.previous;

        info!(
            days = days,
            orders = current.orders,
            degraded = aggregates.degraded.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Report built"
        );

        Ok(Report {
            total_revenue: current.revenue(),
            total_orders: current.orders,
            average_order_value: current.average_order_value(),
            order_growth: Growth::of_orders(&current, &previous).to_string(),
            revenue_growth: Growth::of_revenue(&current, &previous).to_string(),
            daily_sales: aggregates.daily_sales,
            popular_products: aggregates.popular_products,
            recent_orders: aggregates.recent_orders,
            event_stats: aggregates.event_stats,
            degraded_groups: aggregates.degraded,
            time_range: days,
            start_date: window.first_day(),
            end_date: window.last_day(),
            timezone: self.zone.to_string(),
            generated_at: now,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::ReportGroup;
    use crate::clock::FixedClock;
    use crate::events::EventStore;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use storefront_core::{NewOrder, NewOrderItem, OrderStatus};
    use storefront_db::{Database, DbConfig};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 15, 0, 0).unwrap()
    }

    fn facade(db: &Database, settings: &ReportingSettings) -> ReportingFacade {
        let engine = AggregationEngine::new(db.orders(), EventStore::new(db.events()), 10, 10);
        ReportingFacade::new(
            engine,
            Arc::new(FixedClock::new(now())),
            ReportingZone::utc(),
            settings,
        )
    }

    async fn order_of(db: &Database, at: DateTime<Utc>, cents: i64) {
        let order = NewOrder {
            reference: uuid::Uuid::new_v4().to_string(),
            status: OrderStatus::Completed,
            created_at: at,
            items: vec![NewOrderItem {
                product_id: 1,
                name_snapshot: "Gift Card".to_string(),
                quantity: 1,
                unit_price_cents: cents,
            }],
        };
        db.orders().insert(&order).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_window_reports_zeros() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let report = facade(&db, &ReportingSettings::default())
            .get_analytics(7)
            .await
            .unwrap();

        assert_eq!(report.total_revenue, Money::zero());
        assert_eq!(report.total_orders, 0);
        assert_eq!(report.average_order_value, Money::zero());
        assert_eq!(report.order_growth, "0%");
        assert_eq!(report.revenue_growth, "0%");
        assert_eq!(report.daily_sales.len(), 7);
        assert!(report.daily_sales.iter().all(|d| d.orders == 0));
        assert_eq!(report.time_range, 7);
        assert_eq!(report.end_date, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(report.start_date, NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        assert!(report.degraded_groups.is_empty());
    }

    #[tokio::test]
    async fn test_days_out_of_range_is_validation_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let facade = facade(&db, &ReportingSettings::default());

        for days in [0, -5, 366] {
            let err = facade.get_analytics(days).await.unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "days = {}", days);
        }
    }

    #[tokio::test]
    async fn test_growth_against_previous_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (days_ago, cents) in [(0, 10_000), (1, 20_000), (2, 30_000)] {
            order_of(&db, now() - ChronoDuration::days(days_ago), cents).await;
        }
        for days_ago in [8, 10] {
            order_of(&db, now() - ChronoDuration::days(days_ago), 10_000).await;
        }

        let report = facade(&db, &ReportingSettings::default())
            .get_analytics(7)
            .await
            .unwrap();

        assert_eq!(report.total_revenue, Money::from_cents(60_000));
        assert_eq!(report.total_orders, 3);
        assert_eq!(report.average_order_value, Money::from_cents(20_000));
        assert_eq!(report.revenue_growth, "+200.0%");
        assert_eq!(report.order_growth, "+50.0%");
        assert_eq!(report.recent_orders[0].order.total_cents, 10_000);
    }

    #[tokio::test]
    async fn test_report_serializes_camel_case() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let report = facade(&db, &ReportingSettings::default())
            .get_default_analytics()
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["timeRange"], 30);
        assert_eq!(json["orderGrowth"], "0%");
        assert_eq!(json["timezone"], "+00:00");
        assert!(json["dailySales"].is_array());
        assert!(json.get("degradedGroups").is_some());
    }

    #[tokio::test]
    async fn test_slow_aggregation_times_out() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = ReportingSettings {
            timeout_ms: 50,
            ..ReportingSettings::default()
        };
        let facade = facade(&db, &settings);

        // the pool's only connection stays busy for the whole request
        let _held = db.pool().acquire().await.unwrap();

        let err = facade.get_analytics(7).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn test_degraded_group_still_returns_report() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        order_of(&db, now(), 4_200).await;
        sqlx::query("DROP TABLE analytics_events")
            .execute(db.pool())
            .await
            .unwrap();

        let report = facade(&db, &ReportingSettings::default())
            .get_analytics(1)
            .await
            .unwrap();

        assert_eq!(report.total_revenue, Money::from_cents(4_200));
        assert_eq!(report.popular_products.len(), 1);
        assert!(report.event_stats.is_empty());
        assert_eq!(report.degraded_groups[0].group, ReportGroup::EventStats);
    }
}
