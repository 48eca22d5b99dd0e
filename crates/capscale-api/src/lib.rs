//! capscale-api — REST API for capscale.
//!
//! Provides axum route handlers for registering collections, reporting
//! request outcomes into the throttle tracker, and Prometheus scraping.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/collections` | List all collections |
//! | GET | `/api/v1/collections/:id` | Get a collection |
//! | PUT | `/api/v1/collections/:id` | Register or update a collection |
//! | DELETE | `/api/v1/collections/:id` | Remove a collection |
//! | POST | `/api/v1/collections/:id/requests` | Report request outcomes |
//! | GET | `/api/v1/collections/:id/throttle` | Current throttle summary |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::watch;

use capscale_core::AutoscalerConfig;
use capscale_metrics::ThrottleTracker;
use capscale_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub tracker: ThrottleTracker,
    /// Live autoscaler config; supplies the throttle window for summaries.
    pub config: watch::Receiver<AutoscalerConfig>,
}

/// Build the complete API router (REST + metrics).
pub fn build_router(
    store: StateStore,
    tracker: ThrottleTracker,
    config: watch::Receiver<AutoscalerConfig>,
) -> Router {
    let api_state = ApiState {
        store,
        tracker,
        config,
    };

    let api_routes = Router::new()
        .route("/collections", get(handlers::list_collections))
        .route(
            "/collections/{id}",
            get(handlers::get_collection)
                .put(handlers::put_collection)
                .delete(handlers::delete_collection),
        )
        .route("/collections/{id}/requests", post(handlers::report_requests))
        .route("/collections/{id}/throttle", get(handlers::get_throttle))
        .with_state(api_state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state))
}
