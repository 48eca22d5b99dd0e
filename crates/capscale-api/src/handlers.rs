//! REST API handlers.
//!
//! Collection records go through `StateStore`; request outcomes go to the
//! in-memory `ThrottleTracker`. Every handler returns JSON except `/metrics`.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{debug, info};

use capscale_core::ThrottleSummary;
use capscale_core::config::CollectionSeed;
use capscale_metrics::epoch_millis;
use capscale_state::CollectionRecord;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// Summary of the current throttle window for a collection.
async fn current_summary(state: &ApiState, id: &str) -> ThrottleSummary {
    let window = state.config.borrow().throttle_window;
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    let cutoff_ms = epoch_millis().saturating_sub(window_ms);
    state.tracker.summary(id, cutoff_ms, window).await
}

// ── Collections ────────────────────────────────────────────────

/// GET /api/v1/collections
pub async fn list_collections(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_collections() {
        Ok(collections) => ApiResponse::ok(collections).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/collections/:id
pub async fn get_collection(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_collection(&id) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => error_response("collection not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// Register/update request body.
#[derive(serde::Deserialize)]
pub struct CollectionRequest {
    pub capacity: u64,
    pub partitions: u32,
}

/// PUT /api/v1/collections/:id
pub async fn put_collection(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<CollectionRequest>,
) -> impl IntoResponse {
    let seed = CollectionSeed {
        id: id.clone(),
        capacity: req.capacity,
        partitions: req.partitions,
    };
    if let Err(e) = seed.validate() {
        return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    let existed = match state.store.get_collection(&id) {
        Ok(record) => record.is_some(),
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response();
        }
    };

    let record = CollectionRecord {
        id,
        capacity: req.capacity,
        partitions: req.partitions,
        updated_at_ms: epoch_millis(),
    };
    match state.store.put_collection(&record) {
        Ok(()) => {
            info!(collection = %record.id, capacity = record.capacity, partitions = record.partitions, "collection registered");
            let status = if existed { StatusCode::OK } else { StatusCode::CREATED };
            (status, ApiResponse::ok(record)).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// DELETE /api/v1/collections/:id
pub async fn delete_collection(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_collection(&id) {
        Ok(true) => {
            state.tracker.forget(&id).await;
            ApiResponse::ok("deleted").into_response()
        }
        Ok(false) => error_response("collection not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Throttle reporting ─────────────────────────────────────────

/// Request outcome report body.
#[derive(serde::Deserialize)]
pub struct RequestReport {
    pub requests: u64,
    #[serde(default)]
    pub throttled: u64,
}

/// POST /api/v1/collections/:id/requests
pub async fn report_requests(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(report): Json<RequestReport>,
) -> impl IntoResponse {
    if report.throttled > report.requests {
        return error_response(
            &format!(
                "throttled {} exceeds requests {}",
                report.throttled, report.requests
            ),
            StatusCode::BAD_REQUEST,
        )
        .into_response();
    }

    match state.store.get_collection(&id) {
        Ok(Some(_)) => {
            state
                .tracker
                .record(&id, report.requests, report.throttled)
                .await;
            debug!(collection = %id, requests = report.requests, throttled = report.throttled, "request outcomes recorded");
            (
                StatusCode::ACCEPTED,
                ApiResponse::ok(serde_json::json!({
                    "collection": id,
                    "requests": report.requests,
                    "throttled": report.throttled,
                })),
            )
                .into_response()
        }
        Ok(None) => error_response("collection not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/collections/:id/throttle
pub async fn get_throttle(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_collection(&id) {
        Ok(Some(_)) => {
            let summary = current_summary(&state, &id).await;
            ApiResponse::ok(serde_json::json!({
                "collection": id,
                "summary": summary,
                "recent_success_rate": summary.recent_success_rate(),
                "older_success_rate": summary.older_success_rate(),
            }))
            .into_response()
        }
        Ok(None) => error_response("collection not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let collections = state.store.list_collections().unwrap_or_default();
    let mut rows = Vec::with_capacity(collections.len());

    for record in collections {
        let summary = current_summary(&state, &record.id).await;
        rows.push((record, summary));
    }

    let body = capscale_metrics::render_prometheus(&rows);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
