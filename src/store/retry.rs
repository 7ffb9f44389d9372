use std::thread::sleep;
use std::time::Duration;

use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::store::StoreError;

/// A store operation that failed for good.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempt(s): {source}")]
pub struct PersistenceError {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub source: StoreError,
}

/// Bounded retry for transient store failures: exponential backoff from
/// `base_delay_ms` plus up to `base_delay_ms` of jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, first one included.
    pub limit: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(limit: u32, base_delay: Duration) -> Self {
        Self {
            limit,
            base_delay_ms: base_delay.as_millis() as u64,
        }
    }

    /// A single attempt, no retry.
    pub fn none() -> Self {
        Self {
            limit: 1,
            base_delay_ms: 0,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exponent))
    }

    /// Run `op` until it succeeds, fails permanently, or the limit is hit.
    pub fn run<T, F>(&self, operation: impl Into<String>, mut op: F) -> Result<T, PersistenceError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let operation = operation.into();
        let limit = self.limit.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(source) if !source.is_transient() || attempt >= limit => {
                    return Err(PersistenceError {
                        operation,
                        attempts: attempt,
                        source,
                    });
                }
                Err(source) => {
                    let backoff = self.delay_for_attempt(attempt);
                    let jitter = thread_rng().gen_range(0..=self.base_delay_ms);
                    tracing::warn!(
                        target: "dx_sanitizer::store",
                        operation = operation.as_str(),
                        attempt,
                        limit,
                        error = %source,
                        "persistence_retry"
                    );
                    sleep(backoff + Duration::from_millis(jitter));
                }
            }
        }
    }
}
