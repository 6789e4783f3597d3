use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::debug;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    debug!("GET /health");
    Json(HealthResponse {
        status: "ok",
        service: "macrolens",
        version: env!("CARGO_PKG_VERSION"),
    })
}
