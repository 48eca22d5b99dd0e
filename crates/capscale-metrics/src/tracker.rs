//! Throttle tracker — per-collection request/throttle counters.
//!
//! Each collection keeps a queue of fixed-width buckets ordered by start
//! time. A summary for cutoff `c` and window `w` adds up buckets starting
//! at or after `c` as "recent" and buckets starting in `[c - w, c)` as
//! "older".

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use capscale_core::ThrottleSummary;

/// Counters for one time bucket.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    start_ms: u64,
    requests: u64,
    throttled: u64,
}

type Buckets = Arc<Mutex<VecDeque<Bucket>>>;

/// Tracks throttle observations for every reporting collection.
#[derive(Clone)]
pub struct ThrottleTracker {
    /// collection id → time-ordered buckets.
    collections: Arc<RwLock<HashMap<String, Buckets>>>,
    bucket_width_ms: u64,
    retention_ms: u64,
}

impl ThrottleTracker {
    /// Create a tracker with the given bucket width and retention period.
    pub fn new(bucket_width: Duration, retention: Duration) -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            bucket_width_ms: duration_ms(bucket_width).max(1),
            retention_ms: duration_ms(retention),
        }
    }

    /// Record request outcomes for a collection at the current time.
    pub async fn record(&self, collection: &str, requests: u64, throttled: u64) {
        self.record_at(collection, epoch_millis(), requests, throttled)
            .await;
    }

    /// Record request outcomes at an explicit time (milliseconds).
    ///
    /// `throttled` is capped at `requests`.
    pub async fn record_at(&self, collection: &str, now_ms: u64, requests: u64, throttled: u64) {
        let buckets = self.buckets_for(collection).await;
        let start_ms = now_ms - now_ms % self.bucket_width_ms;
        let throttled = throttled.min(requests);

        let mut buckets = buckets.lock().await;
        match buckets.iter_mut().rev().find(|b| b.start_ms == start_ms) {
            Some(bucket) => {
                bucket.requests = bucket.requests.saturating_add(requests);
                bucket.throttled = bucket.throttled.saturating_add(throttled);
            }
            None => {
                let bucket = Bucket {
                    start_ms,
                    requests,
                    throttled,
                };
                // Late reports land in their own slot to keep the queue ordered.
                let pos = buckets.partition_point(|b| b.start_ms < start_ms);
                buckets.insert(pos, bucket);
            }
        }
        prune_buckets(&mut buckets, now_ms, self.retention_ms);
    }

    /// Summarize a collection's observations around `cutoff_ms`.
    ///
    /// Unknown collections produce an empty summary.
    pub async fn summary(&self, collection: &str, cutoff_ms: u64, window: Duration) -> ThrottleSummary {
        let collections = self.collections.read().await;
        let Some(buckets) = collections.get(collection) else {
            return ThrottleSummary::default();
        };
        let buckets = buckets.lock().await;

        let older_start = cutoff_ms.saturating_sub(duration_ms(window));
        let mut recent = (0u64, 0u64);
        let mut older = (0u64, 0u64);
        for bucket in buckets.iter() {
            let totals = if bucket.start_ms >= cutoff_ms {
                &mut recent
            } else if bucket.start_ms >= older_start {
                &mut older
            } else {
                continue;
            };
            // Counters saturate; throttled stays <= requests either way.
            totals.0 = totals.0.saturating_add(bucket.requests);
            totals.1 = totals.1.saturating_add(bucket.throttled);
        }

        ThrottleSummary::new(recent, older)
    }

    /// Drop buckets that fell out of the retention period.
    pub async fn prune(&self) {
        self.prune_at(epoch_millis()).await;
    }

    pub async fn prune_at(&self, now_ms: u64) {
        let collections = self.collections.read().await;
        for buckets in collections.values() {
            prune_buckets(&mut *buckets.lock().await, now_ms, self.retention_ms);
        }
    }

    /// Stop tracking a collection.
    pub async fn forget(&self, collection: &str) {
        let mut collections = self.collections.write().await;
        if collections.remove(collection).is_some() {
            debug!(%collection, "throttle tracking removed");
        }
    }

    /// Collections with at least one tracked bucket slot.
    pub async fn tracked_collections(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        collections.keys().cloned().collect()
    }

    async fn buckets_for(&self, collection: &str) -> Buckets {
        if let Some(buckets) = self.collections.read().await.get(collection) {
            return Arc::clone(buckets);
        }
        let mut collections = self.collections.write().await;
        Arc::clone(collections.entry(collection.to_string()).or_insert_with(|| {
            debug!(%collection, "throttle tracking started");
            Arc::new(Mutex::new(VecDeque::new()))
        }))
    }
}

fn prune_buckets(buckets: &mut VecDeque<Bucket>, now_ms: u64, retention_ms: u64) {
    let horizon = now_ms.saturating_sub(retention_ms);
    while buckets.front().is_some_and(|b| b.start_ms < horizon) {
        buckets.pop_front();
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .unwrap_or_default()
}
