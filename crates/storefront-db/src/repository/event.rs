//! # Event Repository
//!
//! The append-only analytics event log.
//!
//! There is no update and no delete: the log is the audit trail. Events may
//! name orders or products that no longer exist; nothing here joins them.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use storefront_core::{AggregationWindow, AnalyticsEvent, EventCount, EventName, NewAnalyticsEvent};

const EVENT_COLUMNS: &str = "id, event, value, metadata, user_id, created_at";

/// Repository for the analytics event log.
#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    /// Creates a new EventRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EventRepository { pool }
    }

    /// Appends one event and returns its id.
    pub async fn append(&self, event: &NewAnalyticsEvent) -> DbResult<i64> {
        debug!(event = %event.event, "Appending analytics event");

        let id = sqlx::query(
            r#"
            INSERT INTO analytics_events (event, value, metadata, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(event.event.as_str())
        .bind(event.value)
        .bind(event.metadata_string())
        .bind(event.user_id)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// Gets one event by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<AnalyticsEvent>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM analytics_events WHERE id = ?1");
        let event = sqlx::query_as::<_, AnalyticsEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    /// Newest events first, optionally restricted to one name.
    pub async fn list_recent(
        &self,
        name: Option<&EventName>,
        limit: u32,
    ) -> DbResult<Vec<AnalyticsEvent>> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM analytics_events
            WHERE (?1 IS NULL OR event = ?1)
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#
        );
        let events = sqlx::query_as::<_, AnalyticsEvent>(&sql)
            .bind(name.map(|n| n.as_str().to_string()))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    /// Count and value sum of one event name in the window.
    ///
    /// A name with no events yields a zero count rather than no row.
    pub async fn count_for(
        &self,
        name: &EventName,
        window: &AggregationWindow,
    ) -> DbResult<EventCount> {
        let count = sqlx::query_as::<_, EventCount>(
            r#"
            SELECT
                ?1 AS event,
                COUNT(*) AS count,
                CAST(COALESCE(SUM(value), 0) AS REAL) AS total_value
            FROM analytics_events
            WHERE event = ?1 AND created_at >= ?2 AND created_at < ?3
            "#,
        )
        .bind(name.as_str())
        .bind(window.start())
        .bind(window.end())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Count and value sum per distinct event name in the window, most
    /// frequent first.
    pub async fn grouped_counts(&self, window: &AggregationWindow) -> DbResult<Vec<EventCount>> {
        let counts = sqlx::query_as::<_, EventCount>(
            r#"
            SELECT
                event,
                COUNT(*) AS count,
                CAST(COALESCE(SUM(value), 0) AS REAL) AS total_value
            FROM analytics_events
            WHERE created_at >= ?1 AND created_at < ?2
            GROUP BY event
            ORDER BY count DESC, event ASC
            "#,
        )
        .bind(window.start())
        .bind(window.end())
        .fetch_all(&self.pool)
        .await?;

        debug!(groups = counts.len(), "Event counts fetched");
        Ok(counts)
    }

    /// Total number of events (for diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analytics_events")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
