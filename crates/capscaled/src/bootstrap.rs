//! Config loading, collection seeding and SIGHUP reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use capscale_autoscale::FlagSet;
use capscale_core::config::CollectionSeed;
use capscale_core::{AutoscalerConfig, CapscaleConfig};
use capscale_metrics::epoch_millis;
use capscale_state::{CollectionRecord, StateResult, StateStore};

/// Everything the daemon takes from `capscale.toml`.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub autoscaler: AutoscalerConfig,
    pub flags: FlagSet,
    pub seeds: Vec<CollectionSeed>,
}

/// Load and validate the config file, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    let file = match path {
        Some(path) => CapscaleConfig::from_file(path)?,
        None => CapscaleConfig::default(),
    };

    Ok(LoadedConfig {
        autoscaler: file.autoscaler_config()?,
        flags: FlagSet::new(file.disabled_features()),
        seeds: file.collection_seeds()?,
    })
}

/// Register seed collections the store does not know yet.
///
/// Existing records are left alone so capacity set by the autoscaler
/// survives restarts. Returns how many were inserted.
pub fn seed_collections(store: &StateStore, seeds: &[CollectionSeed]) -> StateResult<usize> {
    let now = epoch_millis();
    let mut inserted = 0;
    for seed in seeds {
        let record = CollectionRecord {
            id: seed.id.clone(),
            capacity: seed.capacity,
            partitions: seed.partitions,
            updated_at_ms: now,
        };
        if store.insert_collection_if_absent(&record)? {
            info!(collection = %seed.id, capacity = seed.capacity, partitions = seed.partitions, "collection seeded");
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// How long the throttle tracker keeps buckets: two throttle windows, so the
/// older half of a summary is always backed by data.
pub fn tracker_retention(config: &AutoscalerConfig) -> Duration {
    config.throttle_window.saturating_mul(2)
}

/// Re-read `path` and publish the result.
///
/// A file that fails to load or validate leaves the running config untouched.
pub fn reload(
    path: &Path,
    store: &StateStore,
    config_tx: &watch::Sender<AutoscalerConfig>,
    flags_tx: &watch::Sender<FlagSet>,
) -> anyhow::Result<()> {
    let loaded = load_config(Some(path))?;
    seed_collections(store, &loaded.seeds)?;
    config_tx.send_replace(loaded.autoscaler);
    flags_tx.send_replace(loaded.flags);
    info!(path = ?path, "configuration reloaded");
    Ok(())
}

/// Reload the config file on every SIGHUP until shutdown.
#[cfg(unix)]
pub async fn reload_on_sighup(
    path: PathBuf,
    store: StateStore,
    config_tx: watch::Sender<AutoscalerConfig>,
    flags_tx: watch::Sender<FlagSet>,
    mut shutdown: watch::Receiver<bool>,
) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGHUP handler");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                if let Err(e) = reload(&path, &store, &config_tx, &flags_tx) {
                    warn!(path = ?path, error = %e, "configuration reload failed, keeping previous");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(not(unix))]
pub async fn reload_on_sighup(
    _path: PathBuf,
    _store: StateStore,
    _config_tx: watch::Sender<AutoscalerConfig>,
    _flags_tx: watch::Sender<FlagSet>,
    mut shutdown: watch::Receiver<bool>,
) {
    let _ = shutdown.changed().await;
}
