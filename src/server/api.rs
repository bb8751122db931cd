//! HTTP surface of the gateway.
//!
//! Control routes live under `/_gateway/`:
//! - GET  /_gateway/health
//! - GET  /_gateway/stats
//! - GET  /_gateway/metrics
//! - POST /_gateway/push
//! - POST /_gateway/notifications/click
//! - POST /_gateway/sync
//! - POST /_gateway/sync/queue
//!
//! Every other path is handed to the gateway (see [`proxy`](crate::server::proxy)).

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::gateway::lifecycle::LifecycleState;
use crate::gateway::notify::NotificationClick;
use crate::gateway::sync::{DeferredSubmission, SyncError, SyncReport};
use crate::gateway::{EventOutcome, GatewayError, OfflineGateway, WorkerEvent};
use crate::server::proxy::intercept;

/// Application state shared across handlers.
pub struct AppState {
    pub gateway: Arc<OfflineGateway>,
    pub start_time: Instant,
}

/// Build the axum router with the control routes and the intercepting fallback.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.gateway.config().server.max_body_bytes;
    Router::new()
        .route("/_gateway/health", get(health))
        .route("/_gateway/stats", get(cache_stats))
        .route("/_gateway/metrics", get(metrics))
        .route("/_gateway/push", post(push))
        .route("/_gateway/notifications/click", post(notification_click))
        .route("/_gateway/sync", post(sync))
        .route("/_gateway/sync/queue", post(queue_submission))
        .fallback(intercept)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub state: LifecycleState,
    pub uptime_secs: u64,
    pub cache: CacheStatsResponse,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub bytes_used: usize,
    pub quota_bytes: usize,
    pub generations: Vec<GenerationStatsResponse>,
}

#[derive(Debug, Serialize)]
pub struct GenerationStatsResponse {
    pub name: String,
    pub entries: usize,
    pub bytes_used: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub tag: Option<String>,
}

/// Body of `POST /_gateway/sync/queue`.
#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub id: String,
    pub pending: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let gateway_state = state.gateway.state().await;
    let status = if gateway_state.can_intercept() {
        "ok"
    } else {
        "starting"
    };
    Json(HealthResponse {
        status: status.to_string(),
        state: gateway_state,
        uptime_secs: state.start_time.elapsed().as_secs(),
        cache: collect_stats(&state).await,
    })
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    Json(collect_stats(&state).await)
}

async fn collect_stats(state: &AppState) -> CacheStatsResponse {
    let store = state.gateway.store().read().await;
    CacheStatsResponse {
        bytes_used: store.bytes_used(),
        quota_bytes: store.quota_bytes(),
        generations: store
            .stats()
            .into_iter()
            .map(|g| GenerationStatsResponse {
                name: g.name,
                entries: g.entries,
                bytes_used: g.bytes_used,
            })
            .collect(),
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.gateway.metrics().render() {
        Ok(text) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

async fn push(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let data = if body.is_empty() { None } else { Some(body) };
    match state.gateway.dispatch(WorkerEvent::Push(data)).await {
        Ok(_) => StatusCode::ACCEPTED.into_response(),
        Err(e @ GatewayError::PushPayload(_)) => {
            error_response(StatusCode::BAD_REQUEST, e).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

async fn notification_click(
    State(state): State<Arc<AppState>>,
    Json(click): Json<NotificationClick>,
) -> impl IntoResponse {
    match state
        .gateway
        .dispatch(WorkerEvent::NotificationClick(click))
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

async fn sync(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let req: SyncRequest = if body.is_empty() {
        SyncRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e).into_response(),
        }
    };
    let tag = req
        .tag
        .unwrap_or_else(|| state.gateway.config().sync.tag.clone());

    match state.gateway.dispatch(WorkerEvent::Sync { tag }).await {
        Ok(EventOutcome::Synced(report)) => Json(report).into_response(),
        Ok(_) => Json(SyncReport::default()).into_response(),
        Err(e) => {
            warn!(error = %e, "Background sync failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

async fn queue_submission(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueueRequest>,
) -> impl IntoResponse {
    let mut submission = DeferredSubmission::new(req.method, req.path, req.body);
    submission.headers = req.headers;
    let id = submission.id.clone();

    match state.gateway.defer(submission).await {
        Ok(()) => {}
        Err(e @ GatewayError::Sync(SyncError::InvalidMethod(_) | SyncError::InvalidPath { .. })) => {
            warn!(error = %e, "Refusing submission");
            return error_response(StatusCode::BAD_REQUEST, e).into_response();
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
    let pending = state.gateway.sync_queue().len().await;
    info!(id, pending, "Queued submission");
    (StatusCode::ACCEPTED, Json(QueuedResponse { id, pending })).into_response()
}
