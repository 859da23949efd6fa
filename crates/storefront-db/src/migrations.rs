//! # Database Migrations
//!
//! Embedded SQL migrations for the storefront schema.
//!
//! ## Schema
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  001_initial_schema.sql                                                 │
//! │                                                                         │
//! │  products ─ ─ ─ ─ ─ ┐ (no FK: catalog rows may disappear)               │
//! │                      ▼                                                  │
//! │  orders ◄──────── order_items  (ON DELETE CASCADE, CHECK qty > 0)      │
//! │                                                                         │
//! │  analytics_events  (append-only, indexed by created_at and event)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! New migrations go in `migrations/sqlite/` as `NNN_description.sql`.
//! Applied migrations are never edited.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;

/// Migrations embedded at compile time from `migrations/sqlite`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations in filename order.
///
/// Idempotent; each migration runs in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Applied and embedded migration counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub total: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.total
    }
}

/// Reports how many embedded migrations have been applied.
///
/// A database that was never migrated reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let total = MIGRATOR.migrations.len();

    let applied = match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
    {
        Ok(n) => n as usize,
        Err(e) => {
            warn!(error = %e, "Migration table unreadable, reporting zero applied");
            0
        }
    };

    Ok(MigrationStatus { total, applied })
}
