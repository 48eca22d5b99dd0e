//! capscaled — the capscale daemon.
//!
//! Single binary that assembles all capscale subsystems:
//! - State store (redb): collection registry and last-attempt records
//! - Throttle tracker
//! - Autoscaler loop
//! - REST API + Prometheus metrics
//!
//! # Usage
//!
//! ```text
//! capscaled standalone --port 8480 --data-dir /var/lib/capscale --config capscale.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use capscale_autoscale::Autoscaler;
use capscale_metrics::{ThrottleTracker, epoch_millis};
use capscale_state::StateStore;
use capscaled::{LocalCollectionSource, load_config, reload_on_sighup, seed_collections, tracker_retention};

/// Width of one throttle-tracker bucket.
const BUCKET_WIDTH: Duration = Duration::from_secs(10);

/// How often expired tracker buckets and attempt records are dropped.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "capscaled", about = "capscale daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run in standalone mode (API server and autoscaler in one process).
    Standalone {
        /// Port to listen on.
        #[arg(long, default_value = "8480")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/capscale")]
        data_dir: PathBuf,

        /// Path to capscale.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Autoscaler tick interval in seconds.
        #[arg(long, default_value = "60")]
        interval: u64,

        /// Deadline for one collection's scaling cycle, in seconds.
        #[arg(long, default_value = "30")]
        cycle_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,capscaled=debug,capscale=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            port,
            data_dir,
            config,
            interval,
            cycle_timeout,
        } => {
            run_standalone(
                port,
                data_dir,
                config,
                Duration::from_secs(interval),
                Duration::from_secs(cycle_timeout),
            )
            .await
        }
    }
}

async fn run_standalone(
    port: u16,
    data_dir: PathBuf,
    config_path: Option<PathBuf>,
    interval: Duration,
    cycle_timeout: Duration,
) -> anyhow::Result<()> {
    info!("capscale daemon starting in standalone mode");

    let loaded = load_config(config_path.as_deref())?;
    info!(
        path = ?config_path,
        enabled = loaded.autoscaler.enabled,
        target_success_rate = loaded.autoscaler.target_success_rate,
        seeds = loaded.seeds.len(),
        "configuration loaded"
    );

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("capscale.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let seeded = seed_collections(&store, &loaded.seeds)?;
    info!(seeded, "collections seeded");

    let tracker = ThrottleTracker::new(BUCKET_WIDTH, tracker_retention(&loaded.autoscaler));

    let (config_tx, config_rx) = watch::channel(loaded.autoscaler);
    let (flags_tx, flags_rx) = watch::channel(loaded.flags);

    let source = LocalCollectionSource::new(store.clone(), tracker.clone(), Arc::new(config_rx.clone()));
    let autoscaler = Autoscaler::new(Arc::new(source), Arc::new(store.clone()), Arc::new(config_rx.clone()))
        .with_feature_flags(Arc::new(flags_rx))
        .with_cycle_timeout(cycle_timeout);
    info!(interval_secs = interval.as_secs(), "autoscaler initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let autoscale_shutdown = shutdown_rx.clone();
    let housekeeping_shutdown = shutdown_rx.clone();
    let reload_shutdown = shutdown_rx.clone();

    // ── Start background tasks ─────────────────────────────────

    let autoscale_handle = tokio::spawn(async move {
        autoscaler.run(interval, autoscale_shutdown).await;
    });

    let housekeeping_handle = tokio::spawn(housekeeping(store.clone(), tracker.clone(), housekeeping_shutdown));

    let reload_handle = match config_path {
        Some(path) => Some(tokio::spawn(reload_on_sighup(
            path,
            store.clone(),
            config_tx,
            flags_tx,
            reload_shutdown,
        ))),
        None => None,
    };

    // ── Start API server ───────────────────────────────────────

    let router = capscale_api::build_router(store, tracker, config_rx);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = autoscale_handle.await;
    let _ = housekeeping_handle.await;
    if let Some(handle) = reload_handle {
        let _ = handle.await;
    }

    info!("capscale daemon stopped");
    Ok(())
}

/// Drop stale throttle buckets and expired last-attempt records.
async fn housekeeping(store: StateStore, tracker: ThrottleTracker, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(HOUSEKEEPING_INTERVAL) => {
                tracker.prune().await;
                match store.purge_expired_attempts(epoch_millis()) {
                    Ok(0) => {}
                    Ok(purged) => info!(purged, "expired attempt records purged"),
                    Err(e) => warn!(error = %e, "attempt purge failed"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
