use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables and defaults.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 18000
///
/// worker:
///   url: "http://127.0.0.1:8888"
///   device: "cuda"
///   timeout_seconds: 300
///
/// models:
///   default_language: "EN"
///   custom_models_path: "/etc/speech-router/models.json"
///
/// detection:
///   classifier: "worker"
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub worker: Option<WorkerYaml>,
    pub models: Option<ModelsYaml>,
    pub detection: Option<DetectionYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Inference worker configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WorkerYaml {
    pub url: Option<String>,
    /// One of auto, cpu, cuda, mps
    pub device: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Model selection configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModelsYaml {
    /// Language preloaded at startup
    pub default_language: Option<String>,
    pub custom_models_path: Option<String>,
}

/// Language detection configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DetectionYaml {
    /// `worker` (default) or `script` (in-process stand-in)
    pub classifier: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
