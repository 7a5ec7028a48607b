//! # Error Types
//!
//! ```text
//! ValidationError ──► CoreError ──► SaleError (tally-sales) ──► ErrorCode
//!                                      ▲
//!                     DbError ─────────┘
//! ```

use thiserror::Error;

/// Business rule violations raised by the pure engine components.
///
/// None of these require compensation: they are raised before anything
/// is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A cart line cannot be priced.
    ///
    /// ## When This Occurs
    /// - Quantity ≤ 0 or above the per-line maximum
    /// - Product does not exist or is inactive
    /// - Stored price is negative
    /// - Line discount is negative or exceeds the line sub total
    #[error("Invalid item {product_id}: {reason}")]
    InvalidItem { product_id: String, reason: String },

    /// Not enough non-expired stock to satisfy the requested quantity.
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// The FIFO walk reached an expired lot before the requirement was met.
    ///
    /// ## User Workflow
    /// ```text
    /// Batches: B1 (fresh, 2)  B2 (expired, 5)
    /// Sell 4
    ///      │
    ///      ▼
    /// B1 → 2 taken, 2 still needed
    /// B2 → expired!
    ///      │
    ///      ▼
    /// ExpiredBatch { batch_id: "B2" } ← nothing was mutated
    /// ```
    #[error("Batch {batch_id} of {product_id} is expired and cannot be sold")]
    ExpiredBatch {
        product_id: String,
        batch_id: String,
    },

    /// Combined line and manual discounts exceed the approval threshold.
    #[error("Discount of {discount_bps} bps exceeds the {limit_bps} bps limit without manager approval")]
    DiscountLimitExceeded { discount_bps: i64, limit_bps: i64 },

    /// Promo code is unknown, inactive, outside its window or below minimum.
    #[error("Promotion {code} cannot be applied: {reason}")]
    InvalidPromotion { code: String, reason: String },

    /// Loyalty tender exceeds the customer's balance.
    #[error("Insufficient loyalty points: required {required}, available {available}")]
    InsufficientLoyaltyPoints { required: i64, available: i64 },

    /// Tender does not settle the sale.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn invalid_item(product_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidItem {
            product_id: product_id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_promotion(code: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidPromotion {
            code: code.into(),
            reason: reason.into(),
        }
    }
}

/// The request is malformed, independent of catalog or stock state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Missing, empty or blank.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Fields are individually valid but contradict each other.
    #[error("{reason}")]
    Conflict { reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "P1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for P1: available 3, requested 5"
        );

        let err = CoreError::ExpiredBatch {
            product_id: "P1".to_string(),
            batch_id: "B2".to_string(),
        };
        assert_eq!(err.to_string(), "Batch B2 of P1 is expired and cannot be sold");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "items".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
