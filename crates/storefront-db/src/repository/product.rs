//! # Product Repository
//!
//! The catalog table the default catalog collaborator prices orders from.
//!
//! ## Key Operations
//! - Bulk lookup by id for pricing a whole order in one query
//! - Insert, price update, soft delete
//!
//! Products are soft-deleted: past line items keep their own name and price
//! snapshot, so removing a product never rewrites history.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use storefront_core::Product;

const PRODUCT_COLUMNS: &str = "id, name, price_cents, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new active product.
    pub async fn insert(&self, name: &str, price_cents: i64) -> DbResult<Product> {
        debug!(name = %name, price_cents = price_cents, "Inserting product");

        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO products (name, price_cents, is_active, created_at, updated_at)
            VALUES (?1, ?2, 1, ?3, ?3)
            "#,
        )
        .bind(name)
        .bind(price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Product {
            id,
            name: name.to_string(),
            price_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets a product by id, active or not.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets every product among `ids` that exists, active or not.
    pub async fn get_many(&self, ids: &[i64]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let products = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name, id LIMIT ?1"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Changes the current price. Existing line items keep theirs.
    pub async fn update_price(&self, id: i64, price_cents: i64) -> DbResult<()> {
        debug!(id = id, price_cents = price_cents, "Updating product price");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET price_cents = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(price_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Marks a product inactive so it can no longer be ordered.
    pub async fn soft_delete(&self, id: i64) -> DbResult<()> {
        debug!(id = id, "Soft-deleting product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
