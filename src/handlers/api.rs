use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::core::RegistryStats;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Language of the active default backend, if one is loaded
    pub active_language: Option<String>,
    pub custom_models_loaded: usize,
    pub registry: RegistryStats,
}

/// Health check
///
/// Reports `OK` once a default backend is active, `DEGRADED` otherwise.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let registry = state.registry();
    let active = registry.active();

    Json(HealthResponse {
        status: if active.is_some() { "OK" } else { "DEGRADED" },
        active_language: active.map(|backend| backend.language_tag().to_string()),
        custom_models_loaded: registry.cached_custom_models().len(),
        registry: registry.stats(),
    })
}
