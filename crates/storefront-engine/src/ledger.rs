//! # Order Ledger
//!
//! The only writer of orders and their line items.
//!
//! ## Placing an Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PlaceOrder Flow                                  │
//! │                                                                         │
//! │  1. validate lines          empty / bad quantity → Validation          │
//! │  2. catalog.lookup(ids)     unknown / unavailable → NotFound           │
//! │  3. price lines             unit price + name snapshot per line        │
//! │  4. total = Σ qty × price   declared total only compared, never kept   │
//! │  5. insert order + items    one transaction → Persistence on failure   │
//! │  6. record events           order_placed + product_sold (fire&forget)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use storefront_core::validation::validate_order_lines;
use storefront_core::{
    CoreError, Money, NewOrder, NewOrderItem, Order, OrderLine, OrderStatus, OrderWithItems,
};
use storefront_db::{DbError, OrderRepository};

use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::events::EventRecorder;

/// A request to place an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub items: Vec<OrderLine>,

    /// Total the client believes it owes. Only compared with the computed
    /// total.
    #[serde(default)]
    pub declared_total: Option<Money>,

    #[serde(default)]
    pub user_id: Option<i64>,
}

impl PlaceOrder {
    pub fn new(items: Vec<OrderLine>) -> Self {
        PlaceOrder {
            items,
            declared_total: None,
            user_id: None,
        }
    }

    pub fn with_declared_total(mut self, total: Money) -> Self {
        self.declared_total = Some(total);
        self
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Creates orders against the catalog and moves them through their
/// lifecycle.
#[derive(Clone)]
pub struct OrderLedger {
    orders: OrderRepository,
    catalog: Arc<dyn Catalog>,
    events: EventRecorder,
    clock: Arc<dyn Clock>,
}

impl OrderLedger {
    pub fn new(
        orders: OrderRepository,
        catalog: Arc<dyn Catalog>,
        events: EventRecorder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        OrderLedger {
            orders,
            catalog,
            events,
            clock,
        }
    }

    /// Validates, prices and atomically stores an order.
    ///
    /// The stored total is always computed from catalog prices. Events are
    /// queued after the commit and can never fail the call.
    pub async fn place_order(&self, request: PlaceOrder) -> EngineResult<OrderWithItems> {
        validate_order_lines(&request.items)?;

        let new_order = self.price(&request.items).await?;
        let total = new_order.total();

        let mismatch = request.declared_total.filter(|declared| *declared != total);
        if let Some(declared) = mismatch {
            warn!(
                reference = %new_order.reference,
                declared_cents = declared.cents(),
                computed_cents = total.cents(),
                "Declared order total differs from computed total"
            );
        }

        let placed = self
            .orders
            .insert(&new_order)
            .await
            .map_err(EngineError::Persistence)?;

        info!(
            order_id = placed.order.id,
            reference = %placed.order.reference,
            total = %placed.order.total(),
            items = placed.items.len(),
            "Order placed"
        );

        let extra = request.declared_total.map(|declared| {
            json!({
                "declaredTotalCents": declared.cents(),
                "totalMismatch": mismatch.is_some(),
            })
        });
        self.events.record_order_placed(&placed, request.user_id, extra);

        Ok(placed)
    }

    /// Looks up every product once and builds the priced order.
    async fn price(&self, lines: &[OrderLine]) -> EngineResult<NewOrder> {
        let ids: Vec<i64> = lines
            .iter()
            .map(|l| l.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let catalog = self.catalog.lookup(&ids).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let entry = catalog
                .get(&line.product_id)
                .ok_or(CoreError::ProductNotFound(line.product_id))?;
            if !entry.available {
                return Err(CoreError::ProductUnavailable(line.product_id).into());
            }

            items.push(NewOrderItem {
                product_id: entry.product_id,
                name_snapshot: entry.name.clone(),
                quantity: line.quantity,
                unit_price_cents: entry.price.cents(),
            });
        }

        Ok(NewOrder {
            reference: Uuid::new_v4().to_string(),
            status: OrderStatus::Received,
            created_at: self.clock.now(),
            items,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_order(&self, id: i64) -> EngineResult<OrderWithItems> {
        self.orders
            .get_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", id))
    }

    pub async fn get_by_reference(&self, reference: &str) -> EngineResult<OrderWithItems> {
        self.orders
            .get_by_reference(reference)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", reference))
    }

    /// Newest orders first, each with its items.
    pub async fn list_orders(&self, limit: u32) -> EngineResult<Vec<OrderWithItems>> {
        Ok(self.orders.list_recent(limit).await?)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Moves an order forward in its lifecycle.
    ///
    /// A concurrent change between the read and the write surfaces as
    /// `InvalidStatusTransition` from the status that won.
    pub async fn transition_status(&self, id: i64, next: OrderStatus) -> EngineResult<Order> {
        let current = self
            .orders
            .get_order(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", id))?;

        current.status.ensure_transition(id, next)?;

        let updated = match self
            .orders
            .update_status(id, current.status, next, self.clock.now())
            .await
        {
            Ok(order) => order,
            Err(DbError::Conflict { .. }) => {
                let latest = self
                    .orders
                    .get_order(id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Order", id))?;
                debug!(order_id = id, status = %latest.status, "Status changed concurrently");
                return Err(EngineError::InvalidStatusTransition {
                    order_id: id,
                    from: latest.status,
                    to: next,
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(order_id = id, from = %current.status, to = %next, "Order status changed");

        if next == OrderStatus::Completed {
            self.events.record_order_completed(&updated, None, None);
        }

        Ok(updated)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::clock::FixedClock;
    use crate::events::{EventSink, EventWriter};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use storefront_core::{EventName, NewAnalyticsEvent};
    use storefront_db::{Database, DbConfig};

    struct UnreachableSink;

    #[async_trait]
    impl EventSink for UnreachableSink {
        async fn append(&self, _event: &NewAnalyticsEvent) -> EngineResult<i64> {
            Err(DbError::ConnectionFailed("event store unreachable".into()).into())
        }
    }

    fn catalog() -> Arc<dyn Catalog> {
        Arc::new(
            StaticCatalog::new()
                .with_product(1, "Tee", 1999)
                .with_product(2, "Mug", 1250)
                .with_unavailable(3, "Retired Cap", 900),
        )
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
        ))
    }

    async fn setup() -> (Database, OrderLedger, EventRecorder) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (writer, recorder) = EventWriter::new(Arc::new(db.events()), clock(), 64);
        writer.spawn();
        let ledger = OrderLedger::new(db.orders(), catalog(), recorder.clone(), clock());
        (db, ledger, recorder)
    }

    #[tokio::test]
    async fn test_place_order_prices_from_catalog() {
        let (db, ledger, recorder) = setup().await;

        let placed = ledger
            .place_order(PlaceOrder::new(vec![OrderLine::new(1, 2), OrderLine::new(2, 1)]))
            .await
            .unwrap();

        assert_eq!(placed.order.total_cents, 2 * 1999 + 1250);
        assert_eq!(placed.items_total(), placed.order.total());
        assert_eq!(placed.order.status, OrderStatus::Received);
        assert_eq!(placed.items[0].name_snapshot, "Tee");
        assert!(Uuid::parse_str(&placed.order.reference).is_ok());

        recorder.flush().await.unwrap();
        assert_eq!(
            db.events()
                .list_recent(Some(&EventName::OrderPlaced), 10)
                .await
                .unwrap()
                .len(),
            1
        );
        let sold = db
            .events()
            .list_recent(Some(&EventName::ProductSold), 10)
            .await
            .unwrap();
        assert_eq!(sold.len(), 2);
        assert!(sold.iter().any(|e| e.value == Some(39.98)));
    }

    #[tokio::test]
    async fn test_empty_order_is_rejected_and_writes_nothing() {
        let (db, ledger, recorder) = setup().await;

        let err = ledger.place_order(PlaceOrder::new(vec![])).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = ledger
            .place_order(PlaceOrder::new(vec![OrderLine::new(1, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        recorder.flush().await.unwrap();
        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert_eq!(db.events().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_or_unavailable_product_is_not_found() {
        let (db, ledger, _recorder) = setup().await;

        let err = ledger
            .place_order(PlaceOrder::new(vec![OrderLine::new(1, 1), OrderLine::new(42, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        let err = ledger
            .place_order(PlaceOrder::new(vec![OrderLine::new(3, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_declared_total_mismatch_is_flagged_not_stored() {
        let (db, ledger, recorder) = setup().await;

        let placed = ledger
            .place_order(
                PlaceOrder::new(vec![OrderLine::new(2, 2)])
                    .with_declared_total(Money::from_cents(100))
                    .with_user(5),
            )
            .await
            .unwrap();
        assert_eq!(placed.order.total_cents, 2500);

        recorder.flush().await.unwrap();
        let placed_events = db
            .events()
            .list_recent(Some(&EventName::OrderPlaced), 1)
            .await
            .unwrap();
        let metadata = placed_events[0].metadata_json().unwrap();
        assert_eq!(metadata["declaredTotalCents"], 100);
        assert_eq!(metadata["totalMismatch"], true);
        assert_eq!(metadata["itemCount"], 1);
        assert_eq!(placed_events[0].user_id, Some(5));
        assert_eq!(placed_events[0].value, Some(25.0));
    }

    #[tokio::test]
    async fn test_unreachable_event_store_never_fails_the_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (writer, recorder) = EventWriter::new(Arc::new(UnreachableSink), clock(), 64);
        writer.spawn();
        let ledger = OrderLedger::new(db.orders(), catalog(), recorder.clone(), clock());

        let placed = ledger
            .place_order(PlaceOrder::new(vec![OrderLine::new(1, 1)]))
            .await
            .unwrap();
        recorder.flush().await.unwrap();

        assert_eq!(ledger.get_order(placed.order.id).await.unwrap(), placed);
    }

    #[tokio::test]
    async fn test_storage_failure_is_persistence_error() {
        let (db, ledger, _recorder) = setup().await;
        db.close().await;

        let err = ledger
            .place_order(PlaceOrder::new(vec![OrderLine::new(1, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_status_transitions_only_move_forward() {
        let (db, ledger, recorder) = setup().await;
        let placed = ledger
            .place_order(PlaceOrder::new(vec![OrderLine::new(1, 1)]))
            .await
            .unwrap();
        let id = placed.order.id;

        let order = ledger
            .transition_status(id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);

        let err = ledger
            .transition_status(id, OrderStatus::Received)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStatusTransition { .. }));

        ledger
            .transition_status(id, OrderStatus::Completed)
            .await
            .unwrap();
        let err = ledger
            .transition_status(id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStatusTransition { .. }));

        let err = ledger
            .transition_status(999, OrderStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        recorder.flush().await.unwrap();
        let completed = db
            .events()
            .list_recent(Some(&EventName::OrderCompleted), 10)
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].value, Some(19.99));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let fixed = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
        ));
        let (writer, recorder) = EventWriter::new(Arc::new(db.events()), fixed.clone(), 64);
        writer.spawn();
        let ledger = OrderLedger::new(db.orders(), catalog(), recorder, fixed.clone());

        let first = ledger
            .place_order(PlaceOrder::new(vec![OrderLine::new(1, 1)]))
            .await
            .unwrap();
        fixed.advance(chrono::Duration::minutes(5));
        let second = ledger
            .place_order(PlaceOrder::new(vec![OrderLine::new(2, 3)]))
            .await
            .unwrap();

        let listed = ledger.list_orders(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].order.id, second.order.id);
        assert_eq!(listed[1].order.id, first.order.id);

        let by_ref = ledger
            .get_by_reference(&second.order.reference)
            .await
            .unwrap();
        assert_eq!(by_ref.items[0].quantity, 3);
    }
}
