//! Collection adapter traits.
//!
//! The autoscaler never talks to a managed store directly. Every read and
//! write of capacity or throttle statistics goes through a
//! [`CollectionClient`], and the set of collections to scale each cycle
//! comes from a [`CollectionSource`].

use std::sync::Arc;

use async_trait::async_trait;

use capscale_core::ThrottleSummary;

/// Remote operations on one throughput-provisioned collection.
///
/// Every method may suspend, fail, or time out. None of them are retried
/// by the autoscaler.
#[async_trait]
pub trait CollectionClient: Send + Sync {
    /// Diagnostic identifier, also used as the rate-limiter key suffix.
    fn friendly_name(&self) -> &str;

    /// Currently provisioned capacity (a multiple of 100).
    async fn get_current_capacity(&self) -> anyhow::Result<u64>;

    /// Number of physical partitions backing the collection.
    async fn get_partition_count(&self) -> anyhow::Result<u32>;

    /// Provision `capacity`. Returns whether the store accepted the change.
    async fn replace_capacity(&self, capacity: u64) -> anyhow::Result<bool>;

    /// Throttle counts for the window ending now ("recent", starting at
    /// `window_cutoff_ms`) and the equally long window before it ("older").
    async fn get_throttle_stats(&self, window_cutoff_ms: u64) -> anyhow::Result<ThrottleSummary>;
}

/// Supplies the collections to scale on each driver tick.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    async fn collections(&self) -> anyhow::Result<Vec<Arc<dyn CollectionClient>>>;
}
