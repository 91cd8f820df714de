//! Quantity adjustment
//!
//! Per item: read the record, compute `current + delta`, refuse anything
//! that would go below zero, then write conditionally on the version that
//! was read. A version conflict means another writer got in between; the
//! adjustment is recomputed from a fresh read.
//!
//! An item is only attempted again when its write provably did not apply
//! (conflict, or the read itself failed). A failed or timed-out write is
//! reported as-is so a delta can never be applied twice.

use crate::error::{ProcessingError, Result, StoreError};
use crate::metrics;
use crate::models::{Precondition, ProductPatch, RecordKey, StockLevel, Version};
use crate::store::RecordStore;
use resilience::{with_retry_if, with_timeout, RetryConfig, RetryError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A stock adjustment that was written
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub key: RecordKey,
    pub previous: StockLevel,
    pub updated: u64,
    pub version: Version,
}

enum AttemptError {
    /// The record changed between read and write
    Conflict(ProcessingError),
    /// The read failed transiently; nothing was written
    ReadFailed(ProcessingError),
    Final(ProcessingError),
}

impl AttemptError {
    fn may_retry(&self) -> bool {
        matches!(self, AttemptError::Conflict(_) | AttemptError::ReadFailed(_))
    }

    fn into_inner(self) -> ProcessingError {
        match self {
            AttemptError::Conflict(e) | AttemptError::ReadFailed(e) | AttemptError::Final(e) => e,
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Conflict(e) | AttemptError::ReadFailed(e) | AttemptError::Final(e) => {
                write!(f, "{e}")
            }
        }
    }
}

pub struct QuantityAdjuster {
    store: Arc<dyn RecordStore>,
    io_timeout: Duration,
    conflict_retry: RetryConfig,
}

impl QuantityAdjuster {
    pub fn new(store: Arc<dyn RecordStore>, io_timeout: Duration, conflict_retry: RetryConfig) -> Self {
        Self {
            store,
            io_timeout,
            conflict_retry,
        }
    }

    /// Apply `delta` to the stored quantity of `key`
    pub async fn adjust(&self, key: &RecordKey, delta: i64) -> Result<Adjustment> {
        let result = with_retry_if(
            self.conflict_retry.clone(),
            AttemptError::may_retry,
            || self.attempt(key, delta),
        )
        .await;

        let outcome = result.map_err(|err| match err {
            RetryError::Exhausted {
                attempts,
                last: AttemptError::Conflict(_),
            } => ProcessingError::ConcurrencyConflict {
                key: key.clone(),
                attempts,
            },
            other => other.into_inner().into_inner(),
        });

        match &outcome {
            Ok(_) => metrics::record_quantity_adjustment("applied"),
            Err(e) => metrics::record_quantity_adjustment(e.kind()),
        }
        outcome
    }

    async fn attempt(&self, key: &RecordKey, delta: i64) -> std::result::Result<Adjustment, AttemptError> {
        let read = match with_timeout(self.io_timeout, self.store.get(key)).await {
            Err(elapsed) => return Err(AttemptError::ReadFailed(elapsed.into())),
            Ok(Err(StoreError::NotFound(key))) => {
                return Err(AttemptError::Final(ProcessingError::RecordNotFound(key)))
            }
            Ok(Err(e)) => {
                let e = ProcessingError::from(e);
                return Err(if e.is_retryable() {
                    AttemptError::ReadFailed(e)
                } else {
                    AttemptError::Final(e)
                });
            }
            Ok(Ok(read)) => read,
        };

        let previous = read.value.stock();
        let current = match &previous {
            StockLevel::Known(q) => *q,
            StockLevel::Missing | StockLevel::Unparsable(_) if delta < 0 => {
                return Err(AttemptError::Final(ProcessingError::UnknownStock {
                    key: key.clone(),
                    delta,
                }))
            }
            StockLevel::Missing | StockLevel::Unparsable(_) => 0,
        };

        let updated = i128::from(current) + i128::from(delta);
        if updated < 0 {
            return Err(AttemptError::Final(ProcessingError::NegativeQuantityRejected {
                key: key.clone(),
                current,
                delta,
                updated: updated as i64,
            }));
        }
        let updated = u64::try_from(updated).map_err(|_| {
            AttemptError::Final(ProcessingError::QuantityOverflow {
                key: key.clone(),
                current,
                delta,
            })
        })?;

        let write = with_timeout(
            self.io_timeout,
            self.store.merge_update(
                key,
                &ProductPatch::new().quantity(updated),
                Precondition::Version(read.version),
            ),
        )
        .await;

        match write {
            Ok(Ok(version)) => {
                debug!(key = %key, current, delta, updated, %version, "Quantity written");
                Ok(Adjustment {
                    key: key.clone(),
                    previous,
                    updated,
                    version,
                })
            }
            Ok(Err(conflict @ StoreError::VersionConflict { .. })) => {
                debug!(key = %key, "Version conflict, re-reading");
                Err(AttemptError::Conflict(ProcessingError::Store(conflict)))
            }
            Ok(Err(e)) => Err(AttemptError::Final(e.into())),
            Err(elapsed) => Err(AttemptError::Final(elapsed.into())),
        }
    }
}
