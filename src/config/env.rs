use std::env;
use std::path::PathBuf;

use super::utils::{non_empty, parse_classifier, parse_device, parse_language};
use super::{
    DEFAULT_CUSTOM_MODELS_PATH, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WORKER_TIMEOUT_SECONDS,
    DEFAULT_WORKER_URL, ServerConfig,
};

fn var(name: &str) -> Option<String> {
    non_empty(env::var(name).ok())
}

/// Load configuration from environment variables, falling back to defaults
///
/// `.env` values are already part of the environment by the time this runs
/// (see `main.rs`).
pub fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let host = var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match var("PORT") {
        Some(value) => value
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT value '{value}': {e}"))?,
        None => DEFAULT_PORT,
    };

    let worker_url = var("WORKER_URL").unwrap_or_else(|| DEFAULT_WORKER_URL.to_string());

    let device = match var("SYNTH_DEVICE") {
        Some(value) => parse_device(&value, "SYNTH_DEVICE")?,
        None => Default::default(),
    };

    let worker_timeout_seconds = match var("WORKER_TIMEOUT_SECONDS") {
        Some(value) => value
            .parse::<u64>()
            .map_err(|e| format!("Invalid WORKER_TIMEOUT_SECONDS value '{value}': {e}"))?,
        None => DEFAULT_WORKER_TIMEOUT_SECONDS,
    };

    let default_language = match var("DEFAULT_LANGUAGE") {
        Some(value) => parse_language(&value, "DEFAULT_LANGUAGE")?,
        None => Default::default(),
    };

    let custom_models_path = var("CUSTOM_MODELS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CUSTOM_MODELS_PATH));

    let classifier = match var("LANGUAGE_CLASSIFIER") {
        Some(value) => parse_classifier(&value, "LANGUAGE_CLASSIFIER")?,
        None => Default::default(),
    };

    Ok(ServerConfig {
        host,
        port,
        worker_url,
        device,
        worker_timeout_seconds,
        default_language,
        custom_models_path,
        classifier,
        cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
    })
}
