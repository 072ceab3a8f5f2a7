//! # Validation Module
//!
//! Input validation for documents before they reach the store.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI collaborator                                              │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: depot-ops operation                                          │
//! │  ├── THIS MODULE: shape of the input (names, quantities, amounts)      │
//! │  └── checks.rs: business pre-checks against current balances           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Document store                                               │
//! │  └── Primary key per collection                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use depot_core::validation::{validate_name, validate_quantity};
//!
//! validate_name("name", "Rice 1kg").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, supplier, store, user).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use depot_core::validation::validate_name;
///
/// assert!(validate_name("name", "Rice 1kg").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a `#rrggbb` display colour. `None` is fine.
pub fn validate_color(color: Option<&str>) -> ValidationResult<()> {
    let Some(color) = color else {
        return Ok(());
    };

    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidFormat {
            field: "color".to_string(),
            reason: "expected #rrggbb".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the quantity of a document line or a return.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_LINE_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a signed stock adjustment quantity: non-zero, within bounds.
pub fn validate_adjustment_quantity(qty: i64) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::NonZero {
            field: "quantity".to_string(),
        });
    }

    if qty.abs() > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -MAX_LINE_QUANTITY,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price or cost. Zero is allowed (samples, gifts).
///
/// ## Example
/// ```rust
/// use depot_core::money::Money;
/// use depot_core::validation::validate_price;
///
/// assert!(validate_price("supplyPrice", Money::from_cents(1099)).is_ok());
/// assert!(validate_price("supplyPrice", Money::zero()).is_ok());
/// assert!(validate_price("supplyPrice", Money::from_cents(-100)).is_err());
/// ```
pub fn validate_price(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment amount. Must be positive.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates the number of days on a store's payment term.
pub fn validate_payment_term_days(days: i64) -> ValidationResult<()> {
    if !(0..=365).contains(&days) {
        return Err(ValidationError::OutOfRange {
            field: "paymentTermDays".to_string(),
            min: 0,
            max: 365,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// A document must carry at least one line.
pub fn validate_lines<T>(lines: &[T]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
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
    fn test_validate_name() {
        assert!(validate_name("name", "Rice 1kg").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color(None).is_ok());
        assert!(validate_color(Some("#3366ff")).is_ok());
        assert!(validate_color(Some("3366ff")).is_err());
        assert!(validate_color(Some("#33zzff")).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_adjustment_quantity() {
        assert!(validate_adjustment_quantity(-5).is_ok());
        assert!(validate_adjustment_quantity(5).is_ok());
        assert!(matches!(
            validate_adjustment_quantity(0),
            Err(ValidationError::NonZero { .. })
        ));
        assert!(validate_adjustment_quantity(-MAX_LINE_QUANTITY - 1).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(Money::from_cents(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_payment_amount(Money::from_cents(-500)).is_err());
    }

    #[test]
    fn test_validate_payment_term_days() {
        assert!(validate_payment_term_days(0).is_ok());
        assert!(validate_payment_term_days(30).is_ok());
        assert!(validate_payment_term_days(-1).is_err());
        assert!(validate_payment_term_days(400).is_err());
    }

    #[test]
    fn test_validate_lines() {
        assert!(validate_lines::<u8>(&[]).is_err());
        assert!(validate_lines(&[1]).is_ok());
    }
}
