//! # Engine Error Types
//!
//! The errors callers of the ledger and the reporting facade see.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────────┐  │
//! │  │   Caller input   │  │   Persistence    │  │   Operational        │  │
//! │  │                  │  │                  │  │                      │  │
//! │  │  Validation      │  │  Persistence     │  │  Timeout             │  │
//! │  │  NotFound        │  │  (nothing        │  │  Config              │  │
//! │  │  InvalidStatus-  │  │   committed)     │  │  ChannelClosed       │  │
//! │  │   Transition     │  │                  │  │                      │  │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────────┘  │
//! │                                                                         │
//! │  A failing report group is NOT an error here: it is flagged inside    │
//! │  the report and the other groups still return.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use storefront_core::{CoreError, OrderStatus, ValidationError};
use storefront_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Caller Input
    // =========================================================================
    /// Bad caller input: empty items, non-positive quantity, bad `days`.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced entity does not exist (or cannot be ordered).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A status change that is not a forward move.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    },

    // =========================================================================
    // Persistence
    // =========================================================================
    /// A durable write or read failed. For writes nothing was committed.
    #[error("Persistence failed: {0}")]
    Persistence(#[source] DbError),

    // =========================================================================
    // Operational
    // =========================================================================
    /// The report did not finish before its deadline.
    #[error("Report timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Invalid or unreadable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The event writer is gone.
    #[error("Channel error: {0}")]
    ChannelClosed(String),
}

impl EngineError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// True for errors caused by caller input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::NotFound { .. }
                | EngineError::InvalidStatusTransition { .. }
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Persistence(other),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) | CoreError::ProductUnavailable(id) => {
                EngineError::not_found("Product", id)
            }
            CoreError::OrderNotFound(id) => EngineError::not_found("Order", id),
            CoreError::InvalidStatusTransition { order_id, from, to } => {
                EngineError::InvalidStatusTransition { order_id, from, to }
            }
            CoreError::Validation(e) => EngineError::Validation(e),
        }
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_not_found_stays_not_found() {
        let err: EngineError = DbError::not_found("Order", 7).into();
        assert!(matches!(err, EngineError::NotFound { .. }));
        assert_eq!(err.to_string(), "Order not found: 7");
        assert!(err.is_client_error());

        let err: EngineError = DbError::PoolExhausted.into();
        assert!(matches!(err, EngineError::Persistence(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_core_errors_map_to_engine_errors() {
        let err: EngineError = CoreError::ProductUnavailable(3).into();
        assert_eq!(err.to_string(), "Product not found: 3");

        let err: EngineError = CoreError::InvalidStatusTransition {
            order_id: 1,
            from: OrderStatus::Completed,
            to: OrderStatus::Received,
        }
        .into();
        assert!(matches!(err, EngineError::InvalidStatusTransition { .. }));
    }
}
