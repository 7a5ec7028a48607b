//! # Engine Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Engine Errors                                │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Business rule  │  │  Concurrency    │  │     Persistence         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core(..)       │  │  Inventory-     │  │  Persistence(Store-     │ │
//! │  │  NoOpenShift    │  │    Conflict     │  │    Error)               │ │
//! │  │  AlreadyRefunded│  │                 │  │                         │ │
//! │  │  NotFound       │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  RollbackIncomplete { cause, failures }                                 │
//! │     wraps any of the above when compensation itself failed; code()      │
//! │     still reports the cause                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tally_core::{CoreError, ValidationError};
use tally_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type SaleResult<T> = Result<T, SaleError>;

/// Result type alias for collaborator calls.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Error Codes
// =============================================================================

/// Stable classification returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NoOpenShift,
    InvalidItem,
    InsufficientStock,
    ExpiredBatch,
    InventoryConflict,
    DiscountLimitExceeded,
    InvalidPromotion,
    InsufficientLoyaltyPoints,
    AlreadyRefunded,
    PersistenceError,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NoOpenShift => "NO_OPEN_SHIFT",
            ErrorCode::InvalidItem => "INVALID_ITEM",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::ExpiredBatch => "EXPIRED_BATCH",
            ErrorCode::InventoryConflict => "INVENTORY_CONFLICT",
            ErrorCode::DiscountLimitExceeded => "DISCOUNT_LIMIT_EXCEEDED",
            ErrorCode::InvalidPromotion => "INVALID_PROMOTION",
            ErrorCode::InsufficientLoyaltyPoints => "INSUFFICIENT_LOYALTY_POINTS",
            ErrorCode::AlreadyRefunded => "ALREADY_REFUNDED",
            ErrorCode::PersistenceError => "PERSISTENCE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Store Error
// =============================================================================

/// Failure reported by a store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite adapter failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A row the engine just wrote or was told about is missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A counter stayed contended past the retry budget.
    #[error("{counter} still contended after {attempts} attempts")]
    Contended { counter: String, attempts: u32 },

    /// Backend unavailable or refused the write.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Sale Error
// =============================================================================

/// Error returned by every engine operation.
#[derive(Debug, Error)]
pub enum SaleError {
    // =========================================================================
    // Business rule errors (raised before anything is written)
    // =========================================================================
    /// Pricing, promotion, tender or allocation rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The cashier has no open shift.
    #[error("No open shift for cashier {cashier_id}")]
    NoOpenShift { cashier_id: String },

    /// Sale, shift or return request does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The sale was already refunded; refunds are not idempotent no-ops.
    #[error("Sale {sale_id} is already refunded")]
    AlreadyRefunded { sale_id: String },

    // =========================================================================
    // Concurrency errors
    // =========================================================================
    /// A batch changed between planning and deduction. Never retried
    /// internally; the caller may resubmit the sale.
    #[error("Inventory conflict on batch {batch_id} of {product_id}")]
    InventoryConflict { product_id: String, batch_id: String },

    // =========================================================================
    // Persistence errors
    // =========================================================================
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The operation failed and compensation could not undo everything.
    #[error("{cause} (rollback incomplete: {})", failures.join("; "))]
    RollbackIncomplete {
        cause: Box<SaleError>,
        failures: Vec<String>,
    },
}

impl From<ValidationError> for SaleError {
    fn from(err: ValidationError) -> Self {
        SaleError::Core(CoreError::Validation(err))
    }
}

impl SaleError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        SaleError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Attaches compensation failures; returns `self` unchanged when none.
    pub fn with_rollback_failures(self, failures: Vec<String>) -> Self {
        if failures.is_empty() {
            return self;
        }
        SaleError::RollbackIncomplete {
            cause: Box::new(self),
            failures,
        }
    }

    /// Classification for callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            SaleError::Core(core) => match core {
                CoreError::InvalidItem { .. } => ErrorCode::InvalidItem,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::ExpiredBatch { .. } => ErrorCode::ExpiredBatch,
                CoreError::DiscountLimitExceeded { .. } => ErrorCode::DiscountLimitExceeded,
                CoreError::InvalidPromotion { .. } => ErrorCode::InvalidPromotion,
                CoreError::InsufficientLoyaltyPoints { .. } => ErrorCode::InsufficientLoyaltyPoints,
                CoreError::InvalidPaymentAmount { .. } | CoreError::Validation(_) => {
                    ErrorCode::ValidationError
                }
            },
            SaleError::NoOpenShift { .. } => ErrorCode::NoOpenShift,
            SaleError::NotFound { .. } => ErrorCode::ValidationError,
            SaleError::AlreadyRefunded { .. } => ErrorCode::AlreadyRefunded,
            SaleError::InventoryConflict { .. } => ErrorCode::InventoryConflict,
            SaleError::Persistence(_) => ErrorCode::PersistenceError,
            SaleError::RollbackIncomplete { cause, .. } => cause.code(),
        }
    }

    /// Compensation failures carried by this error, if any.
    pub fn rollback_failures(&self) -> &[String] {
        match self {
            SaleError::RollbackIncomplete { failures, .. } => failures,
            _ => &[],
        }
    }

    /// True when resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SaleError::InventoryConflict { .. } | SaleError::Persistence(StoreError::Contended { .. }) => true,
            SaleError::Persistence(StoreError::Db(db)) => db.is_transient(),
            _ => false,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_core_errors() {
        let err: SaleError = CoreError::ExpiredBatch {
            product_id: "P1".into(),
            batch_id: "B2".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::ExpiredBatch);

        let err: SaleError = CoreError::InvalidPaymentAmount { reason: "short".into() }.into();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err: SaleError = ValidationError::Required { field: "items".into() }.into();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_rollback_keeps_cause_code() {
        let cause = SaleError::InventoryConflict {
            product_id: "P1".into(),
            batch_id: "B1".into(),
        };
        let err = cause.with_rollback_failures(vec!["restore B0: store down".into()]);

        assert_eq!(err.code(), ErrorCode::InventoryConflict);
        assert_eq!(err.rollback_failures().len(), 1);
        assert!(err.to_string().contains("restore B0"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_failures_leave_error_untouched() {
        let err = SaleError::NoOpenShift { cashier_id: "c1".into() }.with_rollback_failures(Vec::new());
        assert!(matches!(err, SaleError::NoOpenShift { .. }));
    }

    #[test]
    fn test_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::InsufficientLoyaltyPoints).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_LOYALTY_POINTS\"");
        assert_eq!(ErrorCode::NoOpenShift.to_string(), "NO_OPEN_SHIFT");
    }

    #[test]
    fn test_db_errors_are_persistence() {
        let err: SaleError = StoreError::from(DbError::PoolExhausted).into();
        assert_eq!(err.code(), ErrorCode::PersistenceError);
        assert!(err.is_retryable());

        let err: SaleError = StoreError::from(DbError::not_found("Sale", "s1")).into();
        assert!(!err.is_retryable());
    }
}
