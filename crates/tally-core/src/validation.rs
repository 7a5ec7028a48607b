//! Field checks run on a request before pricing touches it.
//!
//! These reject malformed input only. Business rules (stock, discount
//! approval, tender sufficiency) live with the code that owns them and
//! report [`CoreError`](crate::CoreError) instead.

use crate::error::ValidationError;
use crate::{MAX_AMOUNT_CENTS, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str) -> ValidationError {
    ValidationError::Required { field: field.to_string() }
}

fn amount_in_range(field: &str, cents: i64, min: i64) -> ValidationResult<()> {
    if cents < min || cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max: MAX_AMOUNT_CENTS,
        });
    }
    Ok(())
}

/// Rejects blank identifiers.
///
/// ```rust
/// use tally_core::validation::validate_id;
///
/// assert!(validate_id("cashier_id", "u-1").is_ok());
/// assert!(validate_id("cashier_id", "  ").is_err());
/// ```
pub fn validate_id(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(required(field));
    }
    Ok(())
}

/// A line quantity must lie in `1..=MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    match qty {
        q if q <= 0 => Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }),
        q if q > MAX_ITEM_QUANTITY => Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        }),
        _ => Ok(()),
    }
}

pub fn validate_manual_discount(discount_cents: i64) -> ValidationResult<()> {
    amount_in_range("manual discount", discount_cents, 0)
}

/// Zero is accepted: a fully discounted sale pays nothing.
pub fn validate_amount_paid(cents: i64) -> ValidationResult<()> {
    amount_in_range("amount paid", cents, 0)
}

/// Each tender split carries a strictly positive amount.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }
    amount_in_range("payment amount", cents, 1)
}

pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(required("items"));
    }
    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }
    Ok(())
}
