use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, speech, voices};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/audio/speech", post(speech::create_speech))
        .route("/v1/voices", get(voices::list_voices))
        .route("/v1/models", get(voices::list_models))
        .layer(TraceLayer::new_for_http())
}

/// Public health check plus the API routes, bound to `state`
///
/// Cross-cutting layers (CORS, security headers) are applied in main.rs.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api::health_check))
        .merge(create_api_router())
        .with_state(state)
}
