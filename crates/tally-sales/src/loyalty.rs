//! Loyalty ledger: applies a sale's net point change to the customer.
//!
//! Runs after stock is committed. A failure here does not undo the sale;
//! the orchestrator turns it into a warning on the outcome.

use tracing::{debug, info};

use tally_core::loyalty::{apply_delta, points_delta, points_earned};
use tally_core::{Money, NormalizedTender};

use crate::cas::{self, Adjusted, CasError};
use crate::store::{Counter, CounterStore};

/// Net points for a sale: earned on the grand total minus any redeemed.
pub fn sale_points_delta(grand_total: Money, earn_unit: Money, tender: &NormalizedTender) -> i64 {
    points_delta(points_earned(grand_total, earn_unit), tender.points_redeemed)
}

pub struct LoyaltyLedger<'a, S: ?Sized> {
    store: &'a S,
    max_attempts: u32,
}

impl<'a, S> LoyaltyLedger<'a, S>
where
    S: CounterStore + ?Sized,
{
    pub fn new(store: &'a S, max_attempts: u32) -> Self {
        LoyaltyLedger { store, max_attempts }
    }

    /// Adds `delta` to the customer's balance; the balance never goes below
    /// zero. A zero delta writes nothing.
    pub async fn apply(&self, customer_id: &str, delta: i64) -> Result<Option<Adjusted>, CasError> {
        if delta == 0 {
            debug!(customer_id = %customer_id, "No loyalty change");
            return Ok(None);
        }

        let counter = Counter::LoyaltyPoints(customer_id.to_string());
        let adjusted = cas::adjust(self.store, &counter, self.max_attempts, |balance| {
            apply_delta(balance, delta)
        })
        .await?;

        info!(
            customer_id = %customer_id,
            delta,
            balance = adjusted.current,
            "Loyalty points applied"
        );
        Ok(Some(adjusted))
    }
}
