//! # storefront-engine: Order Intake and Sales Analytics Services
//!
//! Wires the pure core and the database layer into the services callers
//! use: the order ledger, the event store and the reporting facade.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Storefront Analytics Architecture                    │
//! │                                                                         │
//! │  HTTP / UI layer (outside this workspace)                              │
//! │       │ place_order            │ get_analytics(days)                   │
//! │  ┌────▼────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-engine (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │  OrderLedger ──► EventRecorder ──(mpsc)──► EventWriter          │   │
//! │  │       │                                        │                │   │
//! │  │       │          ReportingFacade               │                │   │
//! │  │       │               │ timeout                │                │   │
//! │  │       │          AggregationEngine ◄── EventStore               │   │
//! │  │       │               │                        │                │   │
//! │  │  Catalog, Clock (collaborators)                │                │   │
//! │  └───────┼───────────────┼────────────────────────┼────────────────┘   │
//! │          ▼               ▼                        ▼                    │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   storefront-db: orders, order_items, analytics_events          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`ledger`] - Order placement, listing, status transitions
//! - [`events`] - Fire-and-forget event recording and event counters
//! - [`aggregation`] - Window reductions with per-group degradation
//! - [`reporting`] - `get_analytics(days)` and the report document
//! - [`catalog`] / [`clock`] - Collaborators the ledger depends on
//! - [`config`] - Layered engine configuration
//! - [`error`] - Engine error type
//!
//! ## Usage
//! ```rust,ignore
//! let config = EngineConfig::load(None)?;
//! let storefront = Storefront::open(&config).await?;
//!
//! storefront
//!     .ledger()
//!     .place_order(PlaceOrder::new(vec![OrderLine::new(1, 2)]))
//!     .await?;
//! let report = storefront.reports().get_analytics(30).await?;
//!
//! storefront.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregation;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod reporting;

// =============================================================================
// Re-exports
// =============================================================================

pub use aggregation::{Aggregates, AggregationEngine, DegradedGroup, ReportGroup};
pub use catalog::{Catalog, CatalogEntry, DbCatalog, StaticCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{EventRecorder, EventSink, EventStore, EventWriter};
pub use ledger::{OrderLedger, PlaceOrder};
pub use reporting::{Report, ReportingFacade};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use storefront_db::Database;

// =============================================================================
// Storefront
// =============================================================================

/// All services over one database, plus the running event writer.
pub struct Storefront {
    db: Database,
    ledger: OrderLedger,
    reports: ReportingFacade,
    recorder: EventRecorder,
    event_store: EventStore,
    writer: JoinHandle<()>,
}

impl Storefront {
    /// Opens the configured database and prices orders from its
    /// `products` table.
    pub async fn open(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        let catalog = Arc::new(DbCatalog::new(db.products()));
        Self::with_parts(db, catalog, Arc::new(SystemClock), config)
    }

    /// Builds the services from explicit collaborators and spawns the
    /// event writer. Must run inside a Tokio runtime.
    pub fn with_parts(
        db: Database,
        catalog: Arc<dyn Catalog>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        let zone = config.reporting_zone()?;

        let (writer, recorder) = EventWriter::new(
            Arc::new(db.events()),
            clock.clone(),
            config.events.channel_capacity,
        );
        let writer = writer.spawn();

        let event_store = EventStore::new(db.events());
        let ledger = OrderLedger::new(db.orders(), catalog, recorder.clone(), clock.clone());
        let engine = AggregationEngine::new(
            db.orders(),
            event_store.clone(),
            config.reporting.top_products_limit as usize,
            config.reporting.recent_orders_limit,
        );
        let reports = ReportingFacade::new(engine, clock, zone, &config.reporting);

        info!(zone = %zone, "Storefront engine ready");

        Ok(Storefront {
            db,
            ledger,
            reports,
            recorder,
            event_store,
            writer,
        })
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    pub fn reports(&self) -> &ReportingFacade {
        &self.reports
    }

    /// Recorder for events that do not come from the ledger (page views,
    /// add-to-cart).
    pub fn events(&self) -> &EventRecorder {
        &self.recorder
    }

    pub fn event_store(&self) -> &EventStore {
        &self.event_store
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Drains queued events, stops the writer and closes the pool.
    pub async fn shutdown(self) -> EngineResult<()> {
        self.recorder.shutdown().await?;
        self.writer
            .await
            .map_err(|e| EngineError::ChannelClosed(e.to_string()))?;
        self.db.close().await;
        info!("Storefront engine stopped");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use storefront_core::{EventName, OrderLine};

    #[tokio::test]
    async fn test_order_to_report_round_trip() {
        let config = EngineConfig::in_memory();
        let storefront = Storefront::open(&config).await.unwrap();
        let mug = storefront
            .database()
            .products()
            .insert("Mug", 1250)
            .await
            .unwrap();

        storefront.events().record_product_view(mug.id, Some(3), None);
        storefront
            .ledger()
            .place_order(PlaceOrder::new(vec![OrderLine::new(mug.id, 2)]))
            .await
            .unwrap();
        storefront.events().flush().await.unwrap();

        let report = storefront.reports().get_analytics(7).await.unwrap();
        assert_eq!(report.total_orders, 1);
        assert_eq!(report.total_revenue.cents(), 2500);
        assert_eq!(report.popular_products[0].name, "Mug");
        assert!(report
            .event_stats
            .iter()
            .any(|s| s.event == "product_view" && s.count == 1));

        storefront.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_events() {
        let config = EngineConfig::in_memory();
        let db = Database::new(config.db_config()).await.unwrap();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap(),
        ));
        let storefront = Storefront::with_parts(
            db.clone(),
            Arc::new(StaticCatalog::new()),
            clock,
            &config,
        )
        .unwrap();

        for page in ["/", "/cart", "/checkout"] {
            storefront.events().record_page_view(page, None, None);
        }
        storefront.recorder.shutdown().await.unwrap();
        storefront.writer.await.unwrap();

        let views = db
            .events()
            .list_recent(Some(&EventName::PageView), 10)
            .await
            .unwrap();
        assert_eq!(views.len(), 3);
    }
}
