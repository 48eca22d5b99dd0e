//! Collections provisioned by this daemon.
//!
//! Capacity and partition counts live in the state store; throttle
//! statistics come from request outcomes reported through the API.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::warn;

use capscale_autoscale::{CollectionClient, CollectionSource, ConfigProvider};
use capscale_core::{CAPACITY_STEP, ThrottleSummary};
use capscale_metrics::{ThrottleTracker, epoch_millis};
use capscale_state::{CollectionRecord, StateStore};

/// One registered collection, read through the state store.
pub struct LocalCollection {
    id: String,
    store: StateStore,
    tracker: ThrottleTracker,
    config: Arc<dyn ConfigProvider>,
}

impl LocalCollection {
    pub fn new(
        id: impl Into<String>,
        store: StateStore,
        tracker: ThrottleTracker,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            id: id.into(),
            store,
            tracker,
            config,
        }
    }

    fn record(&self) -> anyhow::Result<CollectionRecord> {
        self.store
            .get_collection(&self.id)?
            .with_context(|| format!("collection {} not found", self.id))
    }
}

#[async_trait]
impl CollectionClient for LocalCollection {
    fn friendly_name(&self) -> &str {
        &self.id
    }

    async fn get_current_capacity(&self) -> anyhow::Result<u64> {
        Ok(self.record()?.capacity)
    }

    async fn get_partition_count(&self) -> anyhow::Result<u32> {
        Ok(self.record()?.partitions)
    }

    async fn replace_capacity(&self, capacity: u64) -> anyhow::Result<bool> {
        let record = self.record()?;
        let ceiling = record.ceiling();
        if capacity % CAPACITY_STEP != 0 || capacity > ceiling {
            warn!(collection = %self.id, capacity, ceiling, "refusing capacity");
            return Ok(false);
        }

        match self.store.update_capacity(&self.id, capacity, epoch_millis())? {
            Some(_) => Ok(true),
            None => anyhow::bail!("collection {} removed during update", self.id),
        }
    }

    async fn get_throttle_stats(&self, window_cutoff_ms: u64) -> anyhow::Result<ThrottleSummary> {
        let window = self.config.snapshot().throttle_window;
        Ok(self.tracker.summary(&self.id, window_cutoff_ms, window).await)
    }
}

/// Every collection in the state store, fresh on each tick.
pub struct LocalCollectionSource {
    store: StateStore,
    tracker: ThrottleTracker,
    config: Arc<dyn ConfigProvider>,
}

impl LocalCollectionSource {
    pub fn new(store: StateStore, tracker: ThrottleTracker, config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            store,
            tracker,
            config,
        }
    }
}

#[async_trait]
impl CollectionSource for LocalCollectionSource {
    async fn collections(&self) -> anyhow::Result<Vec<Arc<dyn CollectionClient>>> {
        let records = self.store.list_collections()?;
        Ok(records
            .into_iter()
            .map(|r| {
                Arc::new(LocalCollection::new(
                    r.id,
                    self.store.clone(),
                    self.tracker.clone(),
                    Arc::clone(&self.config),
                )) as Arc<dyn CollectionClient>
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use capscale_core::AutoscalerConfig;

    fn setup() -> (StateStore, ThrottleTracker, LocalCollection) {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_collection(&CollectionRecord {
                id: "c".to_string(),
                capacity: 1000,
                partitions: 2,
                updated_at_ms: 1,
            })
            .unwrap();
        let tracker = ThrottleTracker::new(Duration::from_secs(10), Duration::from_secs(600));
        let local = LocalCollection::new(
            "c",
            store.clone(),
            tracker.clone(),
            Arc::new(AutoscalerConfig::default()),
        );
        (store, tracker, local)
    }

    #[tokio::test]
    async fn reads_record() {
        let (_, _, local) = setup();
        assert_eq!(local.get_current_capacity().await.unwrap(), 1000);
        assert_eq!(local.get_partition_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn replace_within_ceiling() {
        let (store, _, local) = setup();
        assert!(local.replace_capacity(20_000).await.unwrap());
        assert_eq!(store.get_collection("c").unwrap().unwrap().capacity, 20_000);
    }

    #[tokio::test]
    async fn replace_refuses_unaligned_or_over_ceiling() {
        let (store, _, local) = setup();
        assert!(!local.replace_capacity(1050).await.unwrap());
        assert!(!local.replace_capacity(20_100).await.unwrap());
        assert_eq!(store.get_collection("c").unwrap().unwrap().capacity, 1000);
    }

    #[tokio::test]
    async fn missing_collection_errors() {
        let (store, _, local) = setup();
        store.delete_collection("c").unwrap();
        assert!(local.get_current_capacity().await.is_err());
        assert!(local.replace_capacity(1000).await.is_err());
    }

    #[tokio::test]
    async fn throttle_stats_from_tracker() {
        let (_, tracker, local) = setup();
        let now = epoch_millis();
        tracker.record_at("c", now, 200, 50).await;

        let summary = local.get_throttle_stats(now - 60_000).await.unwrap();
        assert_eq!(summary.total_recent_requests, 200);
        assert_eq!(summary.total_recent_throttled, 50);
    }

    #[tokio::test]
    async fn source_lists_registered_collections() {
        let (store, tracker, _) = setup();
        let source = LocalCollectionSource::new(store, tracker, Arc::new(AutoscalerConfig::default()));

        let clients = source.collections().await.unwrap();
        let names: Vec<_> = clients.iter().map(|c| c.friendly_name().to_string()).collect();
        assert_eq!(names, vec!["c".to_string()]);
    }
}
