//! HTTP routes.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;
use shop_hub::{serve_socket, Event, HeartbeatConfig, HubHandle};
use shop_ratelimit::{rate_limit, RateLimiter};
use shop_telemetry::Metrics;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::identity::IdentityResolver;

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub limiter: Arc<RateLimiter>,
    pub identity: Arc<dyn IdentityResolver>,
    pub heartbeat: HeartbeatConfig,
}

/// `/healthz` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    pub rate_limit_entries: usize,
}

/// Build the router.
///
/// Only `/api` routes are rate limited. WebSocket and probe endpoints are
/// not.
pub fn create_router(state: AppState, cors_allowed_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/api/events", post(publish_event))
        .route_layer(from_fn_with_state(state.limiter.clone(), rate_limit));

    Router::new()
        .route("/ws/orders", get(ws_handler))
        .route("/ws/announcements", get(ws_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(api)
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// WebSocket upgrade into the hub.
async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = state.identity.resolve(&headers);
    let AppState { hub, heartbeat, .. } = state;
    ws.on_upgrade(move |socket| serve_socket(socket, hub, identity, heartbeat))
}

/// Event ingress for producers. Admin only.
async fn publish_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<Event>,
) -> Response {
    let identity = state.identity.resolve(&headers);
    if !identity.is_admin() {
        warn!(
            user_id = identity.user_id,
            role = %identity.role,
            "Rejected event publish from non-admin"
        );
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "admin role required" })),
        )
            .into_response();
    }

    let kind = event.kind();
    let subject_id = event.subject_id();
    state.hub.broadcast(event).await;
    info!(
        user_id = identity.user_id,
        event_type = kind,
        subject_id,
        "Event accepted for broadcast"
    );

    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "type": kind })),
    )
        .into_response()
}

async fn healthz(State(state): State<AppState>) -> Response {
    let rate_limit_entries = state.limiter.entry_count();
    match state.hub.stats().await {
        Some(stats) => Json(HealthResponse {
            status: "ok",
            sessions: stats.sessions,
            rate_limit_entries,
        })
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "hub_stopped",
                sessions: 0,
                rate_limit_entries,
            }),
        )
            .into_response(),
    }
}

async fn metrics() -> Response {
    match Metrics::gather_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
