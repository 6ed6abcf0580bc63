use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::metrics::get_metrics;
use crate::startup::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "account-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Not ready while the remote license check is blocked.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let blocked = match &state.remote {
        Some(remote) => remote.is_blocked().await,
        None => false,
    };
    if blocked {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "blocked", "reason": "remote account check failing" })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({ "status": "ready", "resolvers": state.context.resolvers().names() })),
        )
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics(),
    )
}
