//! Configuration module for the speech router
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use speech_router::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Device, LanguageCode};

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 18000;
pub const DEFAULT_WORKER_URL: &str = "http://127.0.0.1:8888";
pub const DEFAULT_WORKER_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_CUSTOM_MODELS_PATH: &str = "models.json";

/// Which language classifier serves detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// In-process Unicode script and stopword heuristic, for running without
    /// the worker's classifier
    Script,
    /// `POST /classify` on the inference worker
    #[default]
    Worker,
}

impl ClassifierKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "script" => Some(Self::Script),
            "worker" => Some(Self::Worker),
            _ => None,
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the speech router:
/// - Server settings (host, port)
/// - Inference worker location, device and timeout
/// - Startup language and the custom model catalog location
/// - Language detection settings
/// - Security settings (CORS)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Inference worker
    pub worker_url: String,
    pub device: Device,
    pub worker_timeout_seconds: u64,

    // Models
    /// Language whose backend is loaded at startup
    pub default_language: LanguageCode,
    /// JSON or YAML custom model catalog; a missing file means no custom models
    pub custom_models_path: PathBuf,

    // Detection
    pub classifier: ClassifierKind,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            worker_url: DEFAULT_WORKER_URL.to_string(),
            device: Device::default(),
            worker_timeout_seconds: DEFAULT_WORKER_TIMEOUT_SECONDS,
            default_language: LanguageCode::default(),
            custom_models_path: PathBuf::from(DEFAULT_CUSTOM_MODELS_PATH),
            classifier: ClassifierKind::default(),
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables override defaults. The .env file is loaded in
    /// main.rs before this is called.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables or YAML values have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_port(self.port)?;
        validation::validate_worker(&self.worker_url, self.worker_timeout_seconds)?;
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_seconds)
    }
}
