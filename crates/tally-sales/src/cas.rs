//! Shared compare-and-swap retry loop.
//!
//! ```text
//! loop (max_attempts):
//!     current = load(counter)
//!     next    = step(current)?          None ⇒ Rejected, nothing written
//!     try_update(counter, current, next) ⇒ done | someone moved first, retry
//! ```
//!
//! Used for counters where a re-read is safe: stock restore, loyalty
//! points, receipt sequences. Batch deductions call `try_update` exactly
//! once and treat a miss as a conflict.

use thiserror::Error;
use tracing::debug;

use tally_core::ValidationError;

use crate::error::{SaleError, StoreError};
use crate::store::{Counter, CounterStore};

/// A successful adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjusted {
    pub previous: i64,
    pub current: i64,
}

#[derive(Debug, Error)]
pub enum CasError {
    #[error("{counter} does not exist")]
    Missing { counter: Counter },

    /// `step` refused the observed value.
    #[error("{counter} cannot move from {current}")]
    Rejected { counter: Counter, current: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CasError> for SaleError {
    fn from(err: CasError) -> Self {
        match err {
            CasError::Missing { counter } => SaleError::not_found("Counter", counter.to_string()),
            CasError::Rejected { counter, current } => ValidationError::Conflict {
                reason: format!("{} cannot move from {}", counter, current),
            }
            .into(),
            CasError::Store(e) => SaleError::Persistence(e),
        }
    }
}

/// Applies `step` to `counter` under CAS, re-reading on contention.
pub async fn adjust<S, F>(
    store: &S,
    counter: &Counter,
    max_attempts: u32,
    step: F,
) -> Result<Adjusted, CasError>
where
    S: CounterStore + ?Sized,
    F: Fn(i64) -> Option<i64>,
{
    for attempt in 1..=max_attempts {
        let current = store
            .load(counter)
            .await?
            .ok_or_else(|| CasError::Missing { counter: counter.clone() })?;

        let next = step(current).ok_or_else(|| CasError::Rejected {
            counter: counter.clone(),
            current,
        })?;

        if store.try_update(counter, current, next).await? {
            return Ok(Adjusted {
                previous: current,
                current: next,
            });
        }
        debug!(%counter, attempt, "CAS miss, retrying");
    }

    Err(StoreError::Contended {
        counter: counter.to_string(),
        attempts: max_attempts,
    }
    .into())
}

/// Adds `delta` (which may be negative) to `counter`.
pub async fn add<S>(store: &S, counter: &Counter, delta: i64, max_attempts: u32) -> Result<Adjusted, CasError>
where
    S: CounterStore + ?Sized,
{
    adjust(store, counter, max_attempts, |current| current.checked_add(delta)).await
}
