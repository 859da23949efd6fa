//! # Order Repository
//!
//! Database operations for orders and their line items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. INSERT (one transaction)                                           │
//! │     └── insert() → orders row + every order_items row, or nothing      │
//! │                                                                         │
//! │  2. STATUS                                                             │
//! │     └── update_status(id, expected, next)                              │
//! │         UPDATE ... WHERE id = ? AND status = <expected>                │
//! │                                                                         │
//! │  3. READ (reporting, never writes)                                     │
//! │     ├── window_totals()        COUNT / SUM over [start, end)           │
//! │     ├── window_samples()       (created_at, total) for the daily trend │
//! │     ├── product_sales()        grouped line items, bounded             │
//! │     └── recent_in_window()     newest K orders with items              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::{
    AggregationWindow, Money, NewOrder, Order, OrderItem, OrderStatus, OrderWithItems,
    ProductSales, WindowTotals,
};

const ORDER_COLUMNS: &str = "id, reference, total_cents, status, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, name_snapshot, quantity, unit_price_cents, created_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Writes the order row and all of its items in one transaction.
    ///
    /// The persisted total is Σ quantity × unit price of `order.items`.
    /// If any statement fails the transaction is dropped uncommitted and
    /// no row of the order remains.
    pub async fn insert(&self, order: &NewOrder) -> DbResult<OrderWithItems> {
        let total = order.total();

        debug!(
            reference = %order.reference,
            items = order.items.len(),
            total_cents = total.cents(),
            "Inserting order"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let order_id = sqlx::query(
            r#"
            INSERT INTO orders (reference, total_cents, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )
        .bind(&order.reference)
        .bind(total.cents())
        .bind(order.status)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let item_id = sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, product_id, name_snapshot,
                    quantity, unit_price_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            items.push(OrderItem {
                id: item_id,
                order_id,
                product_id: item.product_id,
                name_snapshot: item.name_snapshot.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                created_at: order.created_at,
            });
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(order_id = order_id, "Order committed");

        Ok(OrderWithItems {
            order: Order {
                id: order_id,
                reference: order.reference.clone(),
                total_cents: total.cents(),
                status: order.status,
                created_at: order.created_at,
                updated_at: order.created_at,
            },
            items,
        })
    }

    /// Moves an order from `expected` to `next`.
    ///
    /// The update only applies while the row still has status `expected`;
    /// otherwise the result is [`DbError::Conflict`] (or
    /// [`DbError::NotFound`] when the order doesn't exist).
    pub async fn update_status(
        &self,
        id: i64,
        expected: OrderStatus,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> DbResult<Order> {
        debug!(order_id = id, from = %expected, to = %next, "Updating order status");

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_order(id).await? {
                Some(_) => Err(DbError::conflict("Order", id)),
                None => Err(DbError::not_found("Order", id)),
            };
        }

        self.get_order(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Gets an order row without its items.
    pub async fn get_order(&self, id: i64) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets an order with its items.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<OrderWithItems>> {
        match self.get_order(id).await? {
            Some(order) => Ok(self.attach_items(vec![order]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Gets an order with its items by its public reference.
    pub async fn get_by_reference(&self, reference: &str) -> DbResult<Option<OrderWithItems>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE reference = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;

        match order {
            Some(order) => Ok(self.attach_items(vec![order]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Newest orders first, each with its items.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<OrderWithItems>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT ?1"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        self.attach_items(orders).await
    }

    /// Number of orders in the table (for diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Windowed Reads
    // =========================================================================

    /// Order count and revenue over the window.
    pub async fn window_totals(&self, window: &AggregationWindow) -> DbResult<WindowTotals> {
        let totals = sqlx::query_as::<_, WindowTotals>(
            r#"
            SELECT
                COUNT(*) AS orders,
                COALESCE(SUM(total_cents), 0) AS revenue_cents
            FROM orders
            WHERE created_at >= ?1 AND created_at < ?2
            "#,
        )
        .bind(window.start())
        .bind(window.end())
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }

    /// `(created_at, total)` of every order in the window, oldest first.
    ///
    /// Input for the daily trend, which buckets in the reporting zone.
    pub async fn window_samples(
        &self,
        window: &AggregationWindow,
    ) -> DbResult<Vec<(DateTime<Utc>, Money)>> {
        let rows: Vec<(DateTime<Utc>, i64)> = sqlx::query_as(
            r#"
            SELECT created_at, total_cents
            FROM orders
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at
            "#,
        )
        .bind(window.start())
        .bind(window.end())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(created_at, cents)| (created_at, Money::from_cents(cents)))
            .collect())
    }

    /// Units and revenue per product over line items whose order falls in
    /// the window, best sellers first, at most `limit` rows.
    ///
    /// Product names come from the line-item snapshots, so products since
    /// removed from the catalog still rank.
    pub async fn product_sales(
        &self,
        window: &AggregationWindow,
        limit: u32,
    ) -> DbResult<Vec<ProductSales>> {
        let rows = sqlx::query_as::<_, ProductSales>(
            r#"
            SELECT
                oi.product_id AS product_id,
                MAX(oi.name_snapshot) AS name,
                SUM(oi.quantity) AS units_sold,
                SUM(oi.quantity * oi.unit_price_cents) AS revenue_cents
            FROM order_items oi
            INNER JOIN orders o ON o.id = oi.order_id
            WHERE o.created_at >= ?1 AND o.created_at < ?2
            GROUP BY oi.product_id
            ORDER BY units_sold DESC, revenue_cents DESC, oi.product_id ASC
            LIMIT ?3
            "#,
        )
        .bind(window.start())
        .bind(window.end())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Product sales fetched");
        Ok(rows)
    }

    /// The newest `limit` orders in the window, each with its items.
    pub async fn recent_in_window(
        &self,
        window: &AggregationWindow,
        limit: u32,
    ) -> DbResult<Vec<OrderWithItems>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at DESC, id DESC
            LIMIT ?3
            "#
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(window.start())
            .bind(window.end())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        self.attach_items(orders).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Loads the items of `orders` with one `IN (...)` query, preserving
    /// the order of `orders`.
    async fn attach_items(&self, orders: Vec<Order>) -> DbResult<Vec<OrderWithItems>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id IN ("));
        let mut ids = builder.separated(", ");
        for order in &orders {
            ids.push_bind(order.id);
        }
        ids.push_unseparated(") ORDER BY order_id, id");

        let items: Vec<OrderItem> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, TimeZone};
    use storefront_core::{NewOrderItem, ReportingZone};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn item(product_id: i64, quantity: i64, unit_price_cents: i64) -> NewOrderItem {
        NewOrderItem {
            product_id,
            name_snapshot: format!("Product {}", product_id),
            quantity,
            unit_price_cents,
        }
    }

    fn new_order(created_at: DateTime<Utc>, items: Vec<NewOrderItem>) -> NewOrder {
        NewOrder {
            reference: uuid::Uuid::new_v4().to_string(),
            status: OrderStatus::Received,
            created_at,
            items,
        }
    }

    fn window(now: DateTime<Utc>, days: u32) -> AggregationWindow {
        AggregationWindow::ending_at(now, days, ReportingZone::utc()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_persists_order_and_items() {
        let db = test_db().await;
        let repo = db.orders();

        let created = repo
            .insert(&new_order(at(2026, 10, 18, 9), vec![item(1, 2, 1099), item(2, 1, 500)]))
            .await
            .unwrap();

        assert_eq!(created.order.total_cents, 2698);
        assert_eq!(created.items_total(), created.order.total());
        assert_eq!(created.order.status, OrderStatus::Received);

        let loaded = repo.get_by_id(created.order.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);

        let by_ref = repo
            .get_by_reference(&created.order.reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_ref.order.id, created.order.id);
    }

    #[tokio::test]
    async fn test_failed_item_insert_rolls_back_order() {
        let db = test_db().await;
        let repo = db.orders();

        // The second item violates CHECK (quantity > 0) after the order
        // row has already been written inside the transaction.
        let result = repo
            .insert(&new_order(at(2026, 10, 18, 9), vec![item(1, 1, 100), item(2, 0, 100)]))
            .await;

        assert!(matches!(result, Err(DbError::CheckViolation { .. })));
        assert_eq!(repo.count().await.unwrap(), 0);

        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(items, 0);
    }

    #[tokio::test]
    async fn test_update_status_checks_expected_status() {
        let db = test_db().await;
        let repo = db.orders();
        let created = repo
            .insert(&new_order(at(2026, 10, 18, 9), vec![item(1, 1, 100)]))
            .await
            .unwrap();
        let id = created.order.id;

        let updated = repo
            .update_status(id, OrderStatus::Received, OrderStatus::Processing, at(2026, 10, 18, 10))
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);
        assert_eq!(updated.updated_at, at(2026, 10, 18, 10));

        let stale = repo
            .update_status(id, OrderStatus::Received, OrderStatus::Completed, at(2026, 10, 18, 11))
            .await;
        assert!(matches!(stale, Err(DbError::Conflict { .. })));

        let missing = repo
            .update_status(999, OrderStatus::Received, OrderStatus::Completed, at(2026, 10, 18, 11))
            .await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_window_reads_respect_bounds() {
        let db = test_db().await;
        let repo = db.orders();
        let now = at(2026, 10, 18, 12);

        // in window (Oct 16..=Oct 18)
        repo.insert(&new_order(at(2026, 10, 16, 0), vec![item(1, 1, 10000)]))
            .await
            .unwrap();
        repo.insert(&new_order(at(2026, 10, 18, 23), vec![item(2, 2, 10000)]))
            .await
            .unwrap();
        // previous window
        repo.insert(&new_order(at(2026, 10, 15, 23), vec![item(1, 1, 10000)]))
            .await
            .unwrap();

        let current = window(now, 3);
        let totals = repo.window_totals(&current).await.unwrap();
        assert_eq!(totals.orders, 2);
        assert_eq!(totals.revenue_cents, 30000);

        let previous = repo.window_totals(&current.previous()).await.unwrap();
        assert_eq!(previous.orders, 1);

        let samples = repo.window_samples(&current).await.unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].0 < samples[1].0);

        let empty = repo.window_totals(&window(now - Duration::days(100), 3)).await.unwrap();
        assert_eq!(empty, WindowTotals::default());
    }

    #[tokio::test]
    async fn test_product_sales_groups_line_items() {
        let db = test_db().await;
        let repo = db.orders();
        let now = at(2026, 10, 18, 12);

        repo.insert(&new_order(at(2026, 10, 17, 9), vec![item(1, 3, 1000), item(2, 5, 1600)]))
            .await
            .unwrap();
        repo.insert(&new_order(at(2026, 10, 18, 9), vec![item(1, 2, 1000)]))
            .await
            .unwrap();

        let rows = repo.product_sales(&window(now, 7), 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        // tie on units (5 each), product 2 has more revenue
        assert_eq!(rows[0].product_id, 2);
        assert_eq!(rows[0].revenue_cents, 8000);
        assert_eq!(rows[1].product_id, 1);
        assert_eq!(rows[1].units_sold, 5);
        assert_eq!(rows[1].revenue_cents, 5000);
        assert_eq!(rows[1].name, "Product 1");
    }

    #[tokio::test]
    async fn test_recent_in_window_is_newest_first_with_items() {
        let db = test_db().await;
        let repo = db.orders();
        let now = at(2026, 10, 18, 12);

        for hour in 1..=4 {
            repo.insert(&new_order(at(2026, 10, 18, hour), vec![item(hour as i64, 1, 100)]))
                .await
                .unwrap();
        }

        let recent = repo.recent_in_window(&window(now, 1), 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].order.created_at, at(2026, 10, 18, 4));
        assert!(recent.iter().all(|o| o.items.len() == 1));
        assert_eq!(recent[0].items[0].product_id, 4);

        assert_eq!(repo.list_recent(10).await.unwrap().len(), 4);
    }
}
