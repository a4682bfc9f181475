//! Sequence counter service.
//!
//! Hands out per-inventory sequence values. Each value is handed out at most
//! once; values consumed by failed creation attempts are never reused, so gaps
//! are expected.

use std::time::Duration;

use stockroom_id::{InventoryId, SequenceValue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::{Database, DbError};

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("inventory not found: {0}")]
    NotFound(InventoryId),

    /// The store stayed unreachable for every attempt.
    #[error("sequence counter unavailable after {attempts} attempts: {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: DbError,
    },

    /// The counter has no values left to hand out.
    #[error("sequence counter exhausted for inventory {0}")]
    Exhausted(InventoryId),

    #[error(transparent)]
    Storage(DbError),
}

/// Linear retry schedule for transient store failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries, including the first.
    pub max_attempts: u32,

    /// Delay after the first failure; grows by the same step per attempt.
    pub step: Duration,

    /// Maximum delay.
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_millis(25),
            max: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` (1-based) failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max)
    }
}

#[derive(Clone)]
pub struct SequenceCounter {
    db: Database,
    retry: RetryPolicy,
}

impl SequenceCounter {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Consumes the next value of the inventory's counter.
    ///
    /// The increment is committed by the store on its own, independent of
    /// whatever the caller does with the value afterwards.
    pub async fn next_value(
        &self,
        inventory_id: &InventoryId,
    ) -> Result<SequenceValue, CounterError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.db.store().advance_sequence(inventory_id).await {
                Ok(value) => {
                    debug!(inventory_id = %inventory_id, value = %value, attempt, "Sequence value consumed");
                    return Ok(value);
                }
                Err(DbError::InventoryNotFound(id)) => return Err(CounterError::NotFound(id)),
                Err(DbError::SequenceExhausted(id)) => {
                    warn!(inventory_id = %id, "Sequence counter exhausted");
                    return Err(CounterError::Exhausted(id));
                }
                Err(e) if e.is_transient() => {
                    if attempt >= max_attempts {
                        warn!(
                            inventory_id = %inventory_id,
                            attempts = attempt,
                            error = %e,
                            "Sequence counter unavailable"
                        );
                        return Err(CounterError::Unavailable {
                            attempts: attempt,
                            source: e,
                        });
                    }
                    let delay = self.retry.delay(attempt);
                    debug!(
                        inventory_id = %inventory_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying sequence advance"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(CounterError::Storage(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::db::{InventoryStore, MemoryStore, NewInventory};

    async fn setup() -> (MemoryStore, SequenceCounter, InventoryId) {
        let store = MemoryStore::new();
        let id = InventoryId::new();
        store
            .create_inventory(NewInventory {
                id,
                name: "Spare parts".to_string(),
                owner_email: "owner@example.com".to_string(),
            })
            .await
            .unwrap();
        let counter = SequenceCounter::new(
            Database::from_store(store.clone()),
            RetryPolicy {
                max_attempts: 3,
                step: Duration::from_millis(1),
                max: Duration::from_millis(5),
            },
        );
        (store, counter, id)
    }

    #[test]
    fn retry_delay_is_linear_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            step: Duration::from_millis(10),
            max: Duration::from_millis(25),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(10));
        assert_eq!(policy.delay(2), Duration::from_millis(20));
        assert_eq!(policy.delay(3), Duration::from_millis(25));
    }

    #[tokio::test]
    async fn values_are_consecutive_from_one() {
        let (_store, counter, id) = setup().await;
        for expected in 1..=5 {
            assert_eq!(counter.next_value(&id).await.unwrap().value(), expected);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_never_share_a_value() {
        let (_store, counter, id) = setup().await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let mut values = Vec::new();
                for _ in 0..10 {
                    values.push(counter.next_value(&id).await.unwrap().value());
                }
                values
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.await.unwrap() {
                assert!(seen.insert(value), "value {value} handed out twice");
            }
        }
        assert_eq!(seen.len(), 100);
        assert_eq!(seen.iter().max(), Some(&100));
    }

    #[tokio::test]
    async fn missing_inventory_is_not_retried() {
        let (_store, counter, _id) = setup().await;
        let err = counter.next_value(&InventoryId::new()).await.unwrap_err();
        assert!(matches!(err, CounterError::NotFound(_)));
    }

    #[tokio::test]
    async fn exhausted_counter_is_not_retried() {
        let (store, counter, id) = setup().await;
        store.set_next_sequence(&id, SequenceValue::MAX).await.unwrap();

        let err = counter.next_value(&id).await.unwrap_err();
        assert!(matches!(err, CounterError::Exhausted(_)));
    }

    #[tokio::test]
    async fn outage_surfaces_as_unavailable() {
        let (store, counter, id) = setup().await;
        store.set_counter_outage(true);

        let err = counter.next_value(&id).await.unwrap_err();
        assert!(matches!(err, CounterError::Unavailable { attempts: 3, .. }));

        store.set_counter_outage(false);
        assert_eq!(counter.next_value(&id).await.unwrap(), SequenceValue::FIRST);
    }
}
