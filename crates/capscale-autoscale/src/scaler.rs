//! Autoscaler — throttle-driven capacity scaling.
//!
//! `ScaledCollection` runs one scaling cycle for one collection. The
//! `Autoscaler` drives cycles for every collection a `CollectionSource`
//! reports, concurrently, once per tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{CollectionClient, CollectionSource};
use crate::coordination::{CoordinationStore, epoch_millis};
use crate::decision::{ScaleDecision, decide};
use crate::error::ScaleError;
use crate::provider::{AUTOSCALER_DISABLED, ConfigProvider, FeatureFlags, FlagSet};
use crate::rate_limiter::{GateVerdict, RateLimiter};

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// Kill switch or feature flag off; nothing was read or written.
    Disabled,
    /// Another attempt happened within the minimum interval.
    Throttled,
    /// The decision kept the current capacity.
    Unchanged { capacity: u64 },
    /// Capacity was replaced.
    Scaled { from: u64, to: u64 },
    /// The store refused the new capacity.
    Rejected { from: u64, requested: u64 },
}

/// A collection under autoscaler control.
pub struct ScaledCollection {
    client: Arc<dyn CollectionClient>,
    limiter: RateLimiter,
    config: Arc<dyn ConfigProvider>,
    flags: Arc<dyn FeatureFlags>,
}

impl ScaledCollection {
    pub fn new(
        client: Arc<dyn CollectionClient>,
        store: Arc<dyn CoordinationStore>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            client,
            limiter: RateLimiter::new(store),
            config,
            flags: Arc::new(FlagSet::default()),
        }
    }

    /// Consult `flags` for the global kill switch.
    pub fn with_feature_flags(mut self, flags: Arc<dyn FeatureFlags>) -> Self {
        self.flags = flags;
        self
    }

    pub fn name(&self) -> &str {
        self.client.friendly_name()
    }

    /// Run one scaling cycle at the current time.
    ///
    /// `excluded_context` is carried into the logs only.
    pub async fn scale_collection(&self, excluded_context: &[String]) -> Result<ScaleOutcome, ScaleError> {
        self.scale_collection_at(epoch_millis(), excluded_context)
            .await
    }

    /// Run one scaling cycle as of `now_ms`.
    ///
    /// Any adapter or store failure aborts the cycle before the attempt is
    /// recorded, so the next cycle starts fresh. The attempt is stamped with
    /// `now_ms` plus the time the cycle took, so a slow adapter does not
    /// shorten the next gate.
    pub async fn scale_collection_at(
        &self,
        now_ms: u64,
        excluded_context: &[String],
    ) -> Result<ScaleOutcome, ScaleError> {
        let started = Instant::now();
        let config = self.config.snapshot();
        let name = self.client.friendly_name();

        if !config.enabled || self.flags.is_disabled(AUTOSCALER_DISABLED) {
            debug!(collection = %name, "autoscaler disabled");
            return Ok(ScaleOutcome::Disabled);
        }

        let key = RateLimiter::key_for(name);
        if let GateVerdict::Denied { retry_in, .. } = self
            .limiter
            .check(&key, now_ms, config.min_scale_interval)
            .await?
        {
            debug!(collection = %name, ?retry_in, "skipping: attempted recently");
            return Ok(ScaleOutcome::Throttled);
        }

        let window_ms = u64::try_from(config.throttle_window.as_millis()).unwrap_or(u64::MAX);
        let cutoff_ms = now_ms.saturating_sub(window_ms);

        let (current, partitions, summary) = tokio::try_join!(
            async {
                self.client
                    .get_current_capacity()
                    .await
                    .map_err(ScaleError::collection(name, "get_current_capacity"))
            },
            async {
                self.client
                    .get_partition_count()
                    .await
                    .map_err(ScaleError::collection(name, "get_partition_count"))
            },
            async {
                self.client
                    .get_throttle_stats(cutoff_ms)
                    .await
                    .map_err(ScaleError::collection(name, "get_throttle_stats"))
            },
        )?;

        if partitions == 0 {
            return Err(ScaleError::collection(name, "get_partition_count")(
                anyhow::anyhow!("collection reported zero partitions"),
            ));
        }

        debug!(
            collection = %name,
            current,
            partitions,
            recent_requests = summary.total_recent_requests,
            recent_throttled = summary.total_recent_throttled,
            success_rate = ?summary.recent_success_rate(),
            older_success_rate = ?summary.older_success_rate(),
            excluded = ?excluded_context,
            "evaluating collection"
        );

        let outcome = match decide(current, partitions, &summary, &config) {
            ScaleDecision::NoChange => ScaleOutcome::Unchanged { capacity: current },
            ScaleDecision::ScaleTo(target) => {
                let accepted = self
                    .client
                    .replace_capacity(target)
                    .await
                    .map_err(ScaleError::collection(name, "replace_capacity"))?;

                if accepted {
                    info!(
                        collection = %name,
                        from = current,
                        to = target,
                        success_rate = ?summary.recent_success_rate(),
                        "capacity replaced"
                    );
                    ScaleOutcome::Scaled {
                        from: current,
                        to: target,
                    }
                } else {
                    warn!(collection = %name, from = current, to = target, "capacity change rejected");
                    ScaleOutcome::Rejected {
                        from: current,
                        requested: target,
                    }
                }
            }
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.limiter
            .record(&key, now_ms.saturating_add(elapsed_ms), config.min_scale_interval)
            .await?;

        Ok(outcome)
    }
}

/// Drives scaling cycles for every collection a source reports.
pub struct Autoscaler {
    source: Arc<dyn CollectionSource>,
    store: Arc<dyn CoordinationStore>,
    config: Arc<dyn ConfigProvider>,
    flags: Arc<dyn FeatureFlags>,
    /// Deadline for a single collection's cycle.
    cycle_timeout: Duration,
    excluded_context: Arc<Vec<String>>,
}

impl Autoscaler {
    pub fn new(
        source: Arc<dyn CollectionSource>,
        store: Arc<dyn CoordinationStore>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            source,
            store,
            config,
            flags: Arc::new(FlagSet::default()),
            cycle_timeout: Duration::from_secs(30),
            excluded_context: Arc::new(Vec::new()),
        }
    }

    pub fn with_feature_flags(mut self, flags: Arc<dyn FeatureFlags>) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    pub fn with_excluded_context(mut self, excluded: Vec<String>) -> Self {
        self.excluded_context = Arc::new(excluded);
        self
    }

    /// Run one cycle for every collection concurrently.
    ///
    /// Per-collection failures are returned, not propagated; only a failure
    /// to list collections fails the whole tick.
    pub async fn evaluate_all(&self) -> anyhow::Result<Vec<(String, Result<ScaleOutcome, ScaleError>)>> {
        let clients = self.source.collections().await?;
        let mut handles = Vec::with_capacity(clients.len());

        for client in clients {
            let name = client.friendly_name().to_string();
            let collection = ScaledCollection::new(client, Arc::clone(&self.store), Arc::clone(&self.config))
                .with_feature_flags(Arc::clone(&self.flags));
            let excluded = Arc::clone(&self.excluded_context);
            let timeout = self.cycle_timeout;
            let task_name = name.clone();

            let handle = tokio::spawn(async move {
                match tokio::time::timeout(timeout, collection.scale_collection(&excluded)).await {
                    Ok(result) => result,
                    Err(_) => Err(ScaleError::TimedOut {
                        collection: task_name,
                        after: timeout,
                    }),
                }
            });
            handles.push((name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ScaleError::Aborted {
                    collection: name.clone(),
                    reason: e.to_string(),
                }),
            };
            if let Err(e) = &result {
                warn!(collection = %name, error = %e, "scaling cycle failed");
            }
            results.push((name, result));
        }

        Ok(results)
    }

    /// Run the autoscaler loop.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "autoscaler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.evaluate_all().await {
                        Ok(results) => {
                            let scaled = results
                                .iter()
                                .filter(|(_, r)| matches!(r, Ok(ScaleOutcome::Scaled { .. })))
                                .count();
                            debug!(collections = results.len(), scaled, "autoscaler tick complete");
                        }
                        Err(e) => tracing::error!(error = %e, "autoscaler evaluation failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}
