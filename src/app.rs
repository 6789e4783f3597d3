use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{adjustments, attribution, correlations, events, health, insights};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/events", events::router())
        .nest("/api/adjustments", adjustments::router())
        .nest("/api/attribution", attribution::router())
        .nest("/api/keywords", insights::keywords_router())
        .nest("/api/sentiment", insights::sentiment_router())
        .nest("/api/impacts", insights::impacts_router())
        .nest("/api/correlations", correlations::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
