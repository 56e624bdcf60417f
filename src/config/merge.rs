use std::path::PathBuf;

use super::ServerConfig;
use super::env::load_from_env;
use super::utils::{non_empty, parse_classifier, parse_device, parse_language};
use super::yaml::YamlConfig;

/// Build the final configuration: environment (with defaults) as the base,
/// YAML values layered on top
pub fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = non_empty(server.host) {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
    }

    if let Some(worker) = yaml.worker {
        if let Some(url) = non_empty(worker.url) {
            config.worker_url = url;
        }
        if let Some(device) = non_empty(worker.device) {
            config.device = parse_device(&device, "worker.device")?;
        }
        if let Some(timeout) = worker.timeout_seconds {
            config.worker_timeout_seconds = timeout;
        }
    }

    if let Some(models) = yaml.models {
        if let Some(language) = non_empty(models.default_language) {
            config.default_language = parse_language(&language, "models.default_language")?;
        }
        if let Some(path) = non_empty(models.custom_models_path) {
            config.custom_models_path = PathBuf::from(path);
        }
    }

    if let Some(detection) = yaml.detection {
        if let Some(classifier) = non_empty(detection.classifier) {
            config.classifier = parse_classifier(&classifier, "detection.classifier")?;
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = non_empty(security.cors_allowed_origins) {
            config.cors_allowed_origins = Some(origins);
        }
    }

    Ok(config)
}
