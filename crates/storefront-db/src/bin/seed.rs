//! # Seed Data Generator
//!
//! Fills a development database with a catalog and a few weeks of orders so
//! the analytics report has something to show.
//!
//! ## Usage
//! ```bash
//! # 40 products, 30 days of orders (default)
//! cargo run -p storefront-db --bin seed
//!
//! # custom history length and database
//! cargo run -p storefront-db --bin seed -- --days 90 --db ./data/storefront.db
//! ```
//!
//! Orders are generated deterministically from their index, so two runs
//! against fresh databases produce the same history.

use chrono::{Duration, Utc};
use std::env;
use storefront_core::{NewOrder, NewOrderItem, OrderStatus, Product};
use storefront_db::{Database, DbConfig};
use uuid::Uuid;

/// Catalog lines: (name, base price in cents).
const CATALOG: &[(&str, i64)] = &[
    ("Classic Tee", 1999),
    ("Hoodie", 4999),
    ("Baseball Cap", 2499),
    ("Beanie", 1799),
    ("Canvas Tote", 1599),
    ("Coffee Mug", 1299),
    ("Travel Tumbler", 2799),
    ("Sticker Pack", 499),
    ("Enamel Pin", 899),
    ("Notebook", 1199),
];

/// Variants multiply the catalog: (suffix, price addon in cents).
const VARIANTS: &[(&str, i64)] = &[("Black", 0), ("White", 0), ("Navy", 200), ("Limited", 1000)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut days: i64 = 30;
    let mut orders_per_day: usize = 8;
    let mut db_path = String::from("./storefront_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--days" => {
                if i + 1 < args.len() {
                    days = args[i + 1].parse().unwrap_or(30);
                    i += 1;
                }
            }
            "--orders-per-day" => {
                if i + 1 < args.len() {
                    orders_per_day = args[i + 1].parse().unwrap_or(8);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("      --days <N>             Days of order history (default: 30)");
                println!("      --orders-per-day <N>   Average orders per day (default: 8)");
                println!("  -d, --db <PATH>            Database file path (default: ./storefront_dev.db)");
                println!("  -h, --help                 Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Storefront Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!("History:  {} days", days);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog
    let mut products = Vec::with_capacity(CATALOG.len() * VARIANTS.len());
    for (name, base_price) in CATALOG {
        for (variant, addon) in VARIANTS {
            let product = db
                .products()
                .insert(&format!("{} ({})", name, variant), base_price + addon)
                .await?;
            products.push(product);
        }
    }
    println!("✓ Inserted {} products", products.len());

    // Order history
    let start = std::time::Instant::now();
    let now = Utc::now();
    let mut placed = 0usize;

    for day in 0..days {
        // vary volume so the trend chart is not flat
        let count = orders_per_day / 2 + (day as usize * 7) % (orders_per_day + 1);
        for n in 0..count {
            let seed = (day as usize) * 100 + n;
            let created_at = now - Duration::days(day) - Duration::minutes((seed * 37 % 1440) as i64);
            let order = generate_order(&products, seed, created_at);

            if let Err(e) = db.orders().insert(&order).await {
                eprintln!("Failed to insert order {}: {}", order.reference, e);
                continue;
            }
            placed += 1;
        }
    }

    println!("✓ Inserted {} orders in {:?}", placed, start.elapsed());
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one order of 1-3 lines priced from the catalog.
fn generate_order(products: &[Product], seed: usize, created_at: chrono::DateTime<Utc>) -> NewOrder {
    let lines = 1 + seed % 3;
    let items = (0..lines)
        .map(|line| {
            // skewed towards the front of the catalog so rankings have a shape
            let index = (seed * 13 + line * 7) % products.len();
            let index = index * index / products.len();
            let product = &products[index];
            NewOrderItem {
                product_id: product.id,
                name_snapshot: product.name.clone(),
                quantity: 1 + ((seed + line) % 4) as i64,
                unit_price_cents: product.price_cents,
            }
        })
        .collect();

    NewOrder {
        reference: Uuid::new_v4().to_string(),
        status: match seed % 10 {
            0 => OrderStatus::Cancelled,
            1..=6 => OrderStatus::Completed,
            7 | 8 => OrderStatus::Processing,
            _ => OrderStatus::Received,
        },
        created_at,
        items,
    }
}
