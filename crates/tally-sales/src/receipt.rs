//! Receipt sequencer: `{prefix}-{year}-{sequence:06}` from a per-year
//! counter advanced by CAS, so concurrent tills never share a number.

use chrono::{Datelike, Utc};
use tracing::debug;

use tally_core::receipt::{format_receipt_number, sequence_key};

use crate::cas;
use crate::error::SaleResult;
use crate::store::{Counter, CounterStore};

pub struct ReceiptSequencer<'a, S: ?Sized> {
    store: &'a S,
    prefix: &'a str,
    max_attempts: u32,
}

impl<'a, S> ReceiptSequencer<'a, S>
where
    S: CounterStore + ?Sized,
{
    pub fn new(store: &'a S, prefix: &'a str, max_attempts: u32) -> Self {
        ReceiptSequencer {
            store,
            prefix,
            max_attempts,
        }
    }

    /// Next receipt number for the current year.
    pub async fn next_receipt_number(&self) -> SaleResult<String> {
        self.next_for_year(Utc::now().year()).await
    }

    pub async fn next_for_year(&self, year: i32) -> SaleResult<String> {
        let counter = Counter::Sequence(sequence_key(self.prefix, year));
        let adjusted = cas::add(self.store, &counter, 1, self.max_attempts).await?;

        let number = format_receipt_number(self.prefix, year, adjusted.current);
        debug!(receipt_number = %number, "Receipt number issued");
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequential_per_year() {
        let store = InMemoryStore::new();
        let seq = ReceiptSequencer::new(&store, "INV", 8);

        assert_eq!(seq.next_for_year(2026).await.unwrap(), "INV-2026-000001");
        assert_eq!(seq.next_for_year(2026).await.unwrap(), "INV-2026-000002");
        assert_eq!(seq.next_for_year(2027).await.unwrap(), "INV-2027-000001");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_numbers_are_unique() {
        let store = Arc::new(InMemoryStore::new());

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    ReceiptSequencer::new(store.as_ref(), "INV", 64)
                        .next_for_year(2026)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut numbers = HashSet::new();
        for handle in handles {
            numbers.insert(handle.await.unwrap());
        }
        assert_eq!(numbers.len(), 20);
        assert_eq!(store.sequence_value("receipt:INV:2026"), 20);
    }
}
