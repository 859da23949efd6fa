//! # Validation Module
//!
//! Input validation for order placement, reporting and event recording.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (HTTP/UI, outside this workspace)                     │
//! │  └── Deserialization, basic shape                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Non-empty orders, positive quantities                             │
//! │  └── Report day ranges, event names                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity > 0)                                              │
//! │  └── Foreign key order_items → orders                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use storefront_core::validation::{validate_quantity, validate_report_days};
//!
//! validate_quantity(5).unwrap();
//! assert_eq!(validate_report_days(7, 365).unwrap(), 7);
//! assert!(validate_report_days(0, 365).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::OrderLine;
use crate::{MAX_EVENT_NAME_LEN, MAX_ITEM_QUANTITY, MAX_ORDER_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Order Validators
// =============================================================================

/// Validates the requested lines of a new order.
///
/// ## Rules
/// - At least one line
/// - At most MAX_ORDER_LINES lines
/// - Every product id is positive
/// - Every quantity passes [`validate_quantity`]
pub fn validate_order_lines(lines: &[OrderLine]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    for line in lines {
        if line.product_id <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "productId".to_string(),
            });
        }
        validate_quantity(line.quantity)?;
    }

    Ok(())
}

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a public order reference (UUID).
pub fn validate_reference(reference: &str) -> ValidationResult<()> {
    if reference.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "reference".to_string(),
        });
    }

    uuid::Uuid::parse_str(reference).map_err(|_| ValidationError::InvalidFormat {
        field: "reference".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Reporting Validators
// =============================================================================

/// Validates the `days` parameter of an analytics request.
///
/// ## Rules
/// - Must be positive
/// - Must not exceed `max_days`
///
/// ## Returns
/// The day count narrowed to `u32`.
pub fn validate_report_days(days: i64, max_days: u32) -> ValidationResult<u32> {
    if days <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "days".to_string(),
        });
    }

    if days > i64::from(max_days) {
        return Err(ValidationError::OutOfRange {
            field: "days".to_string(),
            min: 1,
            max: i64::from(max_days),
        });
    }

    Ok(days as u32)
}

// =============================================================================
// Event Validators
// =============================================================================

/// Validates an event name tag.
///
/// ## Rules
/// - Not empty
/// - At most MAX_EVENT_NAME_LEN characters
/// - Lowercase letters, digits and underscores only (`add_to_cart`)
pub fn validate_event_name(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "event".to_string(),
        });
    }

    if name.len() > MAX_EVENT_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "event".to_string(),
            max: MAX_EVENT_NAME_LEN,
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "event".to_string(),
            reason: "must contain only lowercase letters, digits, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_order_lines() {
        assert!(validate_order_lines(&[OrderLine::new(1, 2)]).is_ok());

        assert_eq!(
            validate_order_lines(&[]),
            Err(ValidationError::Required {
                field: "items".to_string()
            })
        );
        assert!(validate_order_lines(&[OrderLine::new(1, 1), OrderLine::new(2, 0)]).is_err());
        assert!(validate_order_lines(&[OrderLine::new(0, 1)]).is_err());

        let too_many: Vec<OrderLine> = (1..=(MAX_ORDER_LINES as i64 + 1))
            .map(|id| OrderLine::new(id, 1))
            .collect();
        assert!(validate_order_lines(&too_many).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_reference() {
        assert!(validate_reference("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_reference("").is_err());
        assert!(validate_reference("not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_report_days() {
        assert_eq!(validate_report_days(1, 365), Ok(1));
        assert_eq!(validate_report_days(365, 365), Ok(365));

        assert!(matches!(
            validate_report_days(0, 365),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_report_days(-5, 365),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_report_days(366, 365),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_event_name() {
        assert!(validate_event_name("order_placed").is_ok());
        assert!(validate_event_name("checkout_step2").is_ok());

        assert!(validate_event_name("").is_err());
        assert!(validate_event_name("Order Placed").is_err());
        assert!(validate_event_name(&"a".repeat(MAX_EVENT_NAME_LEN + 1)).is_err());
    }
}
