//! # Repository Module
//!
//! Typed access to each table group. SQL lives here and nowhere else.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  storefront-engine                                                      │
//! │       │                                                                 │
//! │       │  db.orders().insert(&new_order)                                │
//! │       ▼                                                                 │
//! │  OrderRepository      orders + order_items                             │
//! │  EventRepository      analytics_events (append + grouped reads)        │
//! │  ProductRepository    products (catalog)                               │
//! │       │                                                                 │
//! │       │  parameterized SQL (bind, never format!)                       │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`OrderRepository`](order::OrderRepository) - Atomic order writes, windowed reads
//! - [`EventRepository`](event::EventRepository) - Append-only event log
//! - [`ProductRepository`](product::ProductRepository) - Catalog management

pub mod event;
pub mod order;
pub mod product;
