//! Request orchestration.
//!
//! [`SpeechRouter::handle`] takes one synthesis request through resolution,
//! backend selection and rendering. Backend selection follows a fixed
//! precedence, the first that produces a backend wins:
//!
//! 1. explicit `config_path` + `ckpt_path` override (built per request, never cached)
//! 2. `model` naming a custom catalog entry
//! 3. the voice naming a custom catalog entry
//! 4. the default backend chosen by the resolver
//!
//! A custom or override backend that fails to build is logged and skipped.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::backend::{Backend, BackendLoadError, RenderRequest, SynthesisError};
use super::catalog::CustomModelCatalog;
use super::classifier::LanguageClassifier;
use super::format::AudioFormat;
use super::language::{DEFAULT_EN_VOICE, DEFAULT_MODEL, LanguageCode};
use super::registry::BackendRegistry;
use super::resolver::{ResolvedVoice, VoiceHint, VoiceResolver, fallback_voice};

pub type RouterResult<T> = Result<T, RouterError>;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No synthesis backend available: {0}")]
    BackendUnavailable(#[source] BackendLoadError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_voice() -> String {
    format!("{}/{}", LanguageCode::En, DEFAULT_EN_VOICE)
}

fn default_response_format() -> String {
    AudioFormat::default().as_str().to_string()
}

fn default_speed() -> f32 {
    1.0
}

/// Inbound speech request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    #[serde(default = "default_model")]
    pub model: String,
    pub input: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_response_format")]
    pub response_format: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Accepted for client compatibility; not used by any backend
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    #[serde(default)]
    pub ckpt_path: Option<PathBuf>,
}

impl SynthesisRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            model: default_model(),
            input: input.into(),
            voice: default_voice(),
            response_format: default_response_format(),
            speed: default_speed(),
            instructions: None,
            config_path: None,
            ckpt_path: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = format.into();
        self
    }

    fn validate(&self) -> RouterResult<()> {
        if self.input.trim().is_empty() {
            return Err(RouterError::InvalidRequest("input must not be empty".into()));
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(RouterError::InvalidRequest(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}

/// Which backend rendered a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "model_id")]
pub enum Route {
    Default,
    Override,
    CustomModel(String),
    CustomVoice(String),
}

impl Route {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Default => "default",
            Self::Override => "override",
            Self::CustomModel(id) | Self::CustomVoice(id) => id.as_str(),
        }
    }
}

/// Rendered audio plus what was actually used to render it.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub audio: Bytes,
    pub format: AudioFormat,
    pub language: LanguageCode,
    pub voice: String,
    pub route: Route,
}

impl SynthesisOutput {
    #[inline]
    pub fn media_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

struct Target {
    backend: Arc<Backend>,
    language: LanguageCode,
    voice: String,
    speaker_id: u32,
    route: Route,
}

pub struct SpeechRouter {
    resolver: VoiceResolver,
}

impl SpeechRouter {
    pub fn new(
        classifier: Arc<dyn LanguageClassifier>,
        registry: Arc<BackendRegistry>,
        catalog: Arc<CustomModelCatalog>,
    ) -> Self {
        Self {
            resolver: VoiceResolver::new(classifier, registry, catalog),
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        self.resolver.registry()
    }

    pub fn catalog(&self) -> &Arc<CustomModelCatalog> {
        self.resolver.catalog()
    }

    pub fn resolver(&self) -> &VoiceResolver {
        &self.resolver
    }

    pub async fn handle(&self, request: &SynthesisRequest) -> RouterResult<SynthesisOutput> {
        let format = AudioFormat::from_str_or_default(&request.response_format);
        request.validate()?;

        if let Some(instructions) = request.instructions.as_deref() {
            debug!(instructions = %instructions, "Ignoring instructions field");
        }

        let resolved = self
            .resolver
            .resolve(&request.voice, &request.input)
            .await
            .map_err(RouterError::BackendUnavailable)?;

        let target = self.select(request, &resolved).await;

        info!(
            language = %target.language,
            voice = %target.voice,
            speaker_id = target.speaker_id,
            route = %target.route.as_str(),
            format = %format,
            "Synthesizing"
        );

        let audio = target
            .backend
            .render(RenderRequest {
                text: &request.input,
                speaker_id: target.speaker_id,
                speed: request.speed,
                format,
            })
            .await?;

        Ok(SynthesisOutput {
            audio,
            format,
            language: target.language,
            voice: target.voice,
            route: target.route,
        })
    }

    async fn select(&self, request: &SynthesisRequest, resolved: &ResolvedVoice) -> Target {
        let registry = self.registry();
        let catalog = self.catalog();

        match (&request.config_path, &request.ckpt_path) {
            (Some(config_path), Some(ckpt_path)) => {
                let language = VoiceHint::parse(&request.voice)
                    .language
                    .as_deref()
                    .map(LanguageCode::normalize)
                    .unwrap_or_default();
                match registry
                    .override_backend(language, config_path, ckpt_path)
                    .await
                {
                    Ok(backend) => {
                        return Target {
                            language: backend.language(),
                            backend,
                            voice: resolved.voice_id.clone(),
                            speaker_id: 0,
                            route: Route::Override,
                        };
                    }
                    Err(e) => warn!("Override backend unavailable, using regular routing: {e}"),
                }
            }
            (None, None) => {}
            _ => warn!("Ignoring override: config_path and ckpt_path must be given together"),
        }

        if request.model != DEFAULT_MODEL {
            if let Some(entry) = catalog.lookup(&request.model) {
                match registry.custom_backend(&request.model, entry).await {
                    Ok(backend) => {
                        return Target {
                            language: entry.language,
                            backend,
                            voice: resolved.voice_id.clone(),
                            speaker_id: entry.speaker_id,
                            route: Route::CustomModel(entry.model_id.clone()),
                        };
                    }
                    Err(e) => warn!(model = %request.model, "Custom model unavailable: {e}"),
                }
            }
        }

        if resolved.custom_voice {
            if let Some(entry) = catalog.lookup(&resolved.voice_id) {
                match registry.custom_backend(&resolved.voice_id, entry).await {
                    Ok(backend) => {
                        return Target {
                            language: entry.language,
                            backend,
                            voice: resolved.voice_id.clone(),
                            speaker_id: entry.speaker_id,
                            route: Route::CustomVoice(entry.model_id.clone()),
                        };
                    }
                    Err(e) => warn!(voice = %resolved.voice_id, "Custom voice unavailable: {e}"),
                }
            }
        }

        default_target(resolved)
    }
}

/// Route to the resolver's backend, re-validating the voice in case it named
/// a custom model that could not be built.
fn default_target(resolved: &ResolvedVoice) -> Target {
    let speakers = resolved.backend.speakers();
    let voice = if speakers.contains(&resolved.voice_id) {
        resolved.voice_id.clone()
    } else {
        fallback_voice(speakers, resolved.language, resolved.chinese_text)
    };
    let speaker_id = speakers.get(&voice).unwrap_or_default();

    Target {
        backend: Arc::clone(&resolved.backend),
        language: resolved.language,
        voice,
        speaker_id,
        route: Route::Default,
    }
}
