//! # Event Store
//!
//! Fire-and-forget recording of business events plus the read side used by
//! reports.
//!
//! ## Recording Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Event Recording Flow                              │
//! │                                                                         │
//! │  OrderLedger / caller                                                  │
//! │       │                                                                 │
//! │       │  recorder.record(event)     try_send, never awaits storage     │
//! │       ▼                                                                 │
//! │  ┌──────────────────────┐                                              │
//! │  │  mpsc (bounded)      │  full → event dropped, warn!                 │
//! │  └──────────┬───────────┘                                              │
//! │             ▼                                                           │
//! │  ┌──────────────────────┐                                              │
//! │  │  EventWriter::run    │  spawned task                                │
//! │  │  sink.append(event)  │  failure → error!, next event                │
//! │  └──────────┬───────────┘                                              │
//! │             ▼                                                           │
//! │  analytics_events (append-only)                                        │
//! │                                                                         │
//! │  The caller's result never depends on anything below the channel.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use storefront_core::validation::validate_event_name;
use storefront_core::{
    AggregationWindow, EventCount, EventName, NewAnalyticsEvent, Order, OrderWithItems,
};
use storefront_db::EventRepository;

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};

// =============================================================================
// Event Sink
// =============================================================================

/// Durable destination of recorded events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn append(&self, event: &NewAnalyticsEvent) -> EngineResult<i64>;
}

#[async_trait]
impl EventSink for EventRepository {
    async fn append(&self, event: &NewAnalyticsEvent) -> EngineResult<i64> {
        Ok(EventRepository::append(self, event).await?)
    }
}

// =============================================================================
// Writer
// =============================================================================

enum WriterCommand {
    Record(NewAnalyticsEvent),
    Flush(oneshot::Sender<()>),
}

/// Background task that drains the event channel into an [`EventSink`].
pub struct EventWriter {
    sink: Arc<dyn EventSink>,
    rx: mpsc::Receiver<WriterCommand>,
    shutdown_rx: mpsc::Receiver<()>,
    written: u64,
    failed: u64,
}

impl EventWriter {
    /// Creates a writer and the recorder that feeds it.
    ///
    /// The writer does nothing until [`EventWriter::run`] is spawned.
    pub fn new(
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        capacity: usize,
    ) -> (Self, EventRecorder) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let writer = EventWriter {
            sink,
            rx,
            shutdown_rx,
            written: 0,
            failed: 0,
        };
        let recorder = EventRecorder {
            tx,
            shutdown_tx,
            clock,
        };

        (writer, recorder)
    }

    /// Spawns [`EventWriter::run`] on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until shutdown is requested or every recorder is dropped.
    /// Events already queued at shutdown are still written.
    pub async fn run(mut self) {
        info!("Event writer starting");

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },

                _ = self.shutdown_rx.recv() => {
                    info!("Event writer shutting down");
                    while let Ok(command) = self.rx.try_recv() {
                        self.handle(command).await;
                    }
                    break;
                }
            }
        }

        info!(
            written = self.written,
            failed = self.failed,
            "Event writer stopped"
        );
    }

    async fn handle(&mut self, command: WriterCommand) {
        match command {
            WriterCommand::Record(event) => match self.sink.append(&event).await {
                Ok(id) => {
                    self.written += 1;
                    debug!(id = id, event = %event.event, "Event written");
                }
                Err(e) => {
                    self.failed += 1;
                    error!(error = %e, event = %event.event, "Failed to write analytics event");
                }
            },
            WriterCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

// =============================================================================
// Recorder
// =============================================================================

/// Cheap, cloneable handle for recording events.
///
/// Every `record*` method returns immediately and never fails; problems are
/// logged and the event is dropped.
#[derive(Clone)]
pub struct EventRecorder {
    tx: mpsc::Sender<WriterCommand>,
    shutdown_tx: mpsc::Sender<()>,
    clock: Arc<dyn Clock>,
}

impl EventRecorder {
    /// Queues a prepared event.
    pub fn record(&self, event: NewAnalyticsEvent) {
        if let Err(e) = validate_event_name(event.event.as_str()) {
            warn!(error = %e, event = %event.event, "Dropping event with invalid name");
            return;
        }

        match self.tx.try_send(WriterCommand::Record(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(WriterCommand::Record(event))) => {
                warn!(event = %event.event, "Event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(WriterCommand::Record(event))) => {
                error!(event = %event.event, "Event writer stopped, dropping event");
            }
            Err(_) => {}
        }
    }

    /// Records `event` now with optional value, metadata and user.
    pub fn record_event(
        &self,
        event: impl Into<EventName>,
        value: Option<f64>,
        metadata: Option<Value>,
        user_id: Option<i64>,
    ) {
        let mut new_event = NewAnalyticsEvent::new(event.into(), self.clock.now()).with_user(user_id);
        new_event.value = value;
        new_event.metadata = metadata;
        self.record(new_event);
    }

    // =========================================================================
    // Convenience Recorders
    // =========================================================================

    pub fn record_page_view(&self, page: &str, user_id: Option<i64>, extra: Option<Value>) {
        self.record_event(
            EventName::PageView,
            Some(1.0),
            Some(merge_metadata(json!({ "page": page }), extra)),
            user_id,
        );
    }

    pub fn record_product_view(&self, product_id: i64, user_id: Option<i64>, extra: Option<Value>) {
        self.record_event(
            EventName::ProductView,
            Some(1.0),
            Some(merge_metadata(json!({ "productId": product_id }), extra)),
            user_id,
        );
    }

    pub fn record_add_to_cart(
        &self,
        product_id: i64,
        quantity: i64,
        user_id: Option<i64>,
        extra: Option<Value>,
    ) {
        self.record_event(
            EventName::AddToCart,
            Some(quantity as f64),
            Some(merge_metadata(json!({ "productId": product_id }), extra)),
            user_id,
        );
    }

    /// One `order_placed` event plus one `product_sold` event per line.
    pub fn record_order_placed(
        &self,
        placed: &OrderWithItems,
        user_id: Option<i64>,
        extra: Option<Value>,
    ) {
        let order = &placed.order;
        self.record_event(
            EventName::OrderPlaced,
            Some(order.total().as_major_f64()),
            Some(merge_metadata(
                json!({
                    "orderId": order.id,
                    "reference": order.reference,
                    "itemCount": placed.items.len(),
                }),
                extra,
            )),
            user_id,
        );

        for item in &placed.items {
            self.record_event(
                EventName::ProductSold,
                Some(item.line_total().as_major_f64()),
                Some(json!({
                    "orderId": order.id,
                    "productId": item.product_id,
                    "quantity": item.quantity,
                    "revenueCents": item.line_total().cents(),
                })),
                user_id,
            );
        }
    }

    pub fn record_order_completed(&self, order: &Order, user_id: Option<i64>, extra: Option<Value>) {
        self.record_event(
            EventName::OrderCompleted,
            Some(order.total().as_major_f64()),
            Some(merge_metadata(json!({ "orderId": order.id }), extra)),
            user_id,
        );
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Waits until every event queued before this call has been handled.
    pub async fn flush(&self) -> EngineResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Flush(ack_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed("Event channel closed".into()))?;
        ack_rx
            .await
            .map_err(|_| EngineError::ChannelClosed("Event writer dropped flush".into()))
    }

    /// Asks the writer to drain its queue and stop.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| EngineError::ChannelClosed("Shutdown channel closed".into()))
    }
}

/// Copies the keys of `extra` (if it is an object) over `base`.
fn merge_metadata(mut base: Value, extra: Option<Value>) -> Value {
    if let (Some(target), Some(Value::Object(extra))) = (base.as_object_mut(), extra) {
        for (key, value) in extra {
            target.insert(key, value);
        }
    }
    base
}

// =============================================================================
// Event Store (read side)
// =============================================================================

/// Event counters for reports.
#[derive(Debug, Clone)]
pub struct EventStore {
    events: EventRepository,
}

impl EventStore {
    pub fn new(events: EventRepository) -> Self {
        EventStore { events }
    }

    /// Count and value sum of one event name in the window.
    pub async fn query_counts(
        &self,
        name: &EventName,
        window: &AggregationWindow,
    ) -> EngineResult<EventCount> {
        Ok(self.events.count_for(name, window).await?)
    }

    /// Count and value sum per event name in the window.
    pub async fn query_grouped_counts(
        &self,
        window: &AggregationWindow,
    ) -> EngineResult<Vec<EventCount>> {
        Ok(self.events.grouped_counts(window).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storefront_core::ReportingZone;
    use storefront_db::{Database, DbConfig, DbError};

    struct FailingSink {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl EventSink for FailingSink {
        async fn append(&self, _event: &NewAnalyticsEvent) -> EngineResult<i64> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DbError::ConnectionFailed("store unreachable".into()).into())
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_recorded_events_reach_the_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (writer, recorder) = EventWriter::new(Arc::new(db.events()), clock(), 16);
        let task = writer.spawn();

        recorder.record_page_view("/products", Some(7), Some(json!({ "ref": "mail" })));
        recorder.record_add_to_cart(3, 2, None, None);
        recorder.flush().await.unwrap();

        let window =
            AggregationWindow::ending_at(clock().now(), 1, ReportingZone::utc()).unwrap();
        let store = EventStore::new(db.events());
        let carts = store
            .query_counts(&EventName::AddToCart, &window)
            .await
            .unwrap();
        assert_eq!(carts.count, 1);
        assert_eq!(carts.total_value, 2.0);

        let views = db.events().list_recent(Some(&EventName::PageView), 1).await.unwrap();
        let metadata = views[0].metadata_json().unwrap();
        assert_eq!(metadata["page"], "/products");
        assert_eq!(metadata["ref"], "mail");
        assert_eq!(views[0].user_id, Some(7));

        recorder.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_sink_is_logged_and_swallowed() {
        let sink = Arc::new(FailingSink {
            attempts: AtomicUsize::new(0),
        });
        let (writer, recorder) = EventWriter::new(sink.clone(), clock(), 16);
        writer.spawn();

        recorder.record_event("page_view", Some(1.0), None, None);
        recorder.record_event("page_view", Some(1.0), None, None);
        recorder.flush().await.unwrap();

        assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_names_and_full_channel_drop_events() {
        let sink = Arc::new(FailingSink {
            attempts: AtomicUsize::new(0),
        });
        let (writer, recorder) = EventWriter::new(sink.clone(), clock(), 1);

        // writer not running yet: the second valid event finds the channel full
        recorder.record_event("Not Valid", None, None, None);
        recorder.record_event("page_view", None, None, None);
        recorder.record_event("page_view", None, None, None);

        writer.spawn();
        recorder.flush().await.unwrap();
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merge_metadata() {
        let merged = merge_metadata(json!({ "a": 1 }), Some(json!({ "b": 2, "a": 3 })));
        assert_eq!(merged, json!({ "a": 3, "b": 2 }));

        let untouched = merge_metadata(json!({ "a": 1 }), Some(json!("not an object")));
        assert_eq!(untouched, json!({ "a": 1 }));
    }
}
