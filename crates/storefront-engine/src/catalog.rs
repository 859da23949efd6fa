//! # Catalog Collaborator
//!
//! The ledger prices orders through [`Catalog`]; it never reads product
//! tables itself.
//!
//! ```text
//!   OrderLedger ──lookup(&[ids])──► Catalog
//!                                    ├── DbCatalog      products table
//!                                    └── StaticCatalog  in-memory (tests, demos)
//! ```

use async_trait::async_trait;
use std::collections::HashMap;

use storefront_core::{Money, Product};
use storefront_db::ProductRepository;

use crate::error::EngineResult;

/// What the ledger needs to know about one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub product_id: i64,
    pub name: String,
    pub price: Money,
    /// False for products that exist but cannot be ordered.
    pub available: bool,
}

impl From<Product> for CatalogEntry {
    fn from(product: Product) -> Self {
        CatalogEntry {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price(),
            available: product.is_active,
        }
    }
}

/// Product lookup used when pricing an order.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Entries for every id that exists. Unknown ids are simply absent.
    async fn lookup(&self, product_ids: &[i64]) -> EngineResult<HashMap<i64, CatalogEntry>>;
}

// =============================================================================
// Database Catalog
// =============================================================================

/// Catalog backed by the `products` table.
#[derive(Debug, Clone)]
pub struct DbCatalog {
    products: ProductRepository,
}

impl DbCatalog {
    pub fn new(products: ProductRepository) -> Self {
        DbCatalog { products }
    }
}

#[async_trait]
impl Catalog for DbCatalog {
    async fn lookup(&self, product_ids: &[i64]) -> EngineResult<HashMap<i64, CatalogEntry>> {
        let products = self.products.get_many(product_ids).await?;
        Ok(products
            .into_iter()
            .map(|p| (p.id, CatalogEntry::from(p)))
            .collect())
    }
}

// =============================================================================
// Static Catalog
// =============================================================================

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<i64, CatalogEntry>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an orderable product.
    pub fn with_product(mut self, product_id: i64, name: &str, price_cents: i64) -> Self {
        self.entries.insert(
            product_id,
            CatalogEntry {
                product_id,
                name: name.to_string(),
                price: Money::from_cents(price_cents),
                available: true,
            },
        );
        self
    }

    /// Adds a product that exists but cannot be ordered.
    pub fn with_unavailable(mut self, product_id: i64, name: &str, price_cents: i64) -> Self {
        self = self.with_product(product_id, name, price_cents);
        if let Some(entry) = self.entries.get_mut(&product_id) {
            entry.available = false;
        }
        self
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn lookup(&self, product_ids: &[i64]) -> EngineResult<HashMap<i64, CatalogEntry>> {
        Ok(product_ids
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| (*id, e.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_db::{Database, DbConfig};

    #[tokio::test]
    async fn test_db_catalog_reports_inactive_products_as_unavailable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mug = db.products().insert("Mug", 1200).await.unwrap();
        let cap = db.products().insert("Cap", 2400).await.unwrap();
        db.products().soft_delete(cap.id).await.unwrap();

        let catalog = DbCatalog::new(db.products());
        let found = catalog.lookup(&[mug.id, cap.id, 999]).await.unwrap();

        assert_eq!(found.len(), 2);
        assert!(found[&mug.id].available);
        assert_eq!(found[&mug.id].price, Money::from_cents(1200));
        assert!(!found[&cap.id].available);
    }

    #[tokio::test]
    async fn test_static_catalog() {
        let catalog = StaticCatalog::new()
            .with_product(1, "Tee", 1999)
            .with_unavailable(2, "Old Tee", 999);

        let found = catalog.lookup(&[1, 2, 3]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[&1].name, "Tee");
        assert!(!found[&2].available);
    }
}
