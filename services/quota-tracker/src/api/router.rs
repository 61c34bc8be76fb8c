use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::ApiState;

pub fn create_router(state: Arc<ApiState>) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout));

    Router::new()
        .route("/api/quota/check", post(handlers::check_quota))
        .route("/api/quota/increment", post(handlers::increment_quota))
        .route("/api/quota/claim", post(handlers::claim_quota))
        .route("/api/quota/:subject_id", get(handlers::get_quota))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(middleware)
}
