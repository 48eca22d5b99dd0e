//! Anti-thrash gate shared through the coordination store.
//!
//! Advisory only: two callers racing inside the same narrow window can both
//! pass. The next cycle reconciles whatever they did.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::coordination::CoordinationStore;
use crate::error::ScaleError;

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    /// No attempt within the minimum interval.
    Allowed,
    /// A recent attempt exists; skip this cycle.
    Denied {
        last_attempt_ms: u64,
        retry_in: Duration,
    },
}

/// Checks and records per-collection scaling attempts.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CoordinationStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// Store key for a collection.
    pub fn key_for(collection: &str) -> String {
        format!("autoscaler:{collection}")
    }

    /// Deny if `key` attempted a cycle less than `min_interval` before `now_ms`.
    pub async fn check(&self, key: &str, now_ms: u64, min_interval: Duration) -> Result<GateVerdict, ScaleError> {
        let last = self
            .store
            .get_last_attempt(key)
            .await
            .map_err(ScaleError::coordination(key, "get_last_attempt"))?;

        let Some(last_attempt_ms) = last else {
            return Ok(GateVerdict::Allowed);
        };

        let elapsed = Duration::from_millis(now_ms.saturating_sub(last_attempt_ms));
        if elapsed < min_interval {
            let retry_in = min_interval - elapsed;
            debug!(%key, last_attempt_ms, ?retry_in, "scaling attempt gated");
            Ok(GateVerdict::Denied {
                last_attempt_ms,
                retry_in,
            })
        } else {
            Ok(GateVerdict::Allowed)
        }
    }

    /// Record an attempt at `now_ms`. The record lives for `min_interval`.
    pub async fn record(&self, key: &str, now_ms: u64, min_interval: Duration) -> Result<(), ScaleError> {
        let accepted = self
            .store
            .set_last_attempt(key, now_ms, min_interval)
            .await
            .map_err(ScaleError::coordination(key, "set_last_attempt"))?;

        if accepted {
            Ok(())
        } else {
            Err(ScaleError::GateNotRecorded {
                key: key.to_string(),
            })
        }
    }
}
