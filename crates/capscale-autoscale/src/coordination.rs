//! Coordination store shared by every autoscaler process.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use capscale_state::StateStore;

/// Last-attempt timestamps keyed by collection, shared across processes.
///
/// Records expire on the store's own schedule. An absent or expired record
/// reads as `None` ("never attempted").
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Unix timestamp (ms) of the last recorded attempt for `key`.
    async fn get_last_attempt(&self, key: &str) -> anyhow::Result<Option<u64>>;

    /// Record an attempt at `attempted_at_ms`, kept for `ttl`.
    /// Returns whether the store accepted the write.
    async fn set_last_attempt(&self, key: &str, attempted_at_ms: u64, ttl: Duration) -> anyhow::Result<bool>;
}

#[async_trait]
impl CoordinationStore for StateStore {
    async fn get_last_attempt(&self, key: &str) -> anyhow::Result<Option<u64>> {
        Ok(StateStore::get_last_attempt(self, key, epoch_millis())?)
    }

    async fn set_last_attempt(&self, key: &str, attempted_at_ms: u64, ttl: Duration) -> anyhow::Result<bool> {
        StateStore::set_last_attempt(self, key, attempted_at_ms, ttl)?;
        Ok(true)
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
