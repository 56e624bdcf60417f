//! Synthesis backends.
//!
//! A [`Backend`] is one loaded language-specific synthesis model together with
//! the speaker table it exposes. The model itself is opaque to the router and
//! sits behind two capabilities:
//!
//! - [`BackendBuilder`]: `build(language, config, weights, device) -> Backend`
//! - [`SynthesisEngine`]: `render(text, speaker, speed, format) -> audio bytes`
//!
//! Backends are immutable once built. The registry hands them out as
//! `Arc<Backend>`, so a speaker table always travels with the engine it
//! belongs to.

pub mod worker;

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::format::AudioFormat;
use super::language::LanguageCode;

pub use worker::{WorkerBackendBuilder, WorkerClassifier, WorkerEngine};

/// Result type for backend construction
pub type BackendLoadResult<T> = Result<T, BackendLoadError>;

/// Result type for rendering
pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Backend construction failure.
///
/// Cloneable so a single failure can be shared between requests that were
/// waiting on the same build.
#[derive(Debug, Clone, Error)]
pub enum BackendLoadError {
    #[error("Failed to load backend for {target}: {reason}")]
    Build { target: String, reason: String },

    #[error("Backend for {target} exposes no speakers")]
    NoSpeakers { target: String },
}

impl BackendLoadError {
    pub fn build(target: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Build {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    #[error("Synthesis failed: {0}")]
    Render(String),

    #[error("Synthesis worker request failed: {0}")]
    Transport(String),
}

/// Compute device the backend should be placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Let the engine pick the best available hardware
    #[default]
    Auto,
    Cpu,
    Cuda,
    Mps,
}

impl Device {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Mps => "mps",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "cpu" => Some(Self::Cpu),
            "cuda" | "gpu" => Some(Self::Cuda),
            "mps" => Some(Self::Mps),
            _ => None,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered speaker table of one backend.
///
/// Insertion order is preserved and is the order used by the "first available
/// speaker" fallback. Speaker names are unique; re-inserting a name updates
/// its index in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerSet {
    entries: Vec<(String, u32)>,
}

impl SpeakerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, id: u32) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = id,
            None => self.entries.push((name, id)),
        }
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, id)| *id)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// First speaker in table order.
    pub fn first(&self) -> Option<&str> {
        self.entries.first().map(|(name, _)| name.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for SpeakerSet {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        let mut set = SpeakerSet::new();
        for (name, id) in iter {
            set.insert(name, id);
        }
        set
    }
}

/// Parameters for constructing a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub language: LanguageCode,
    /// Model configuration; `None` uses the engine's stock model for `language`.
    pub config_path: Option<PathBuf>,
    /// Model weights; `None` uses the engine's stock model for `language`.
    pub ckpt_path: Option<PathBuf>,
    pub device: Device,
}

impl BackendSpec {
    /// Stock model for a language.
    pub fn stock(language: LanguageCode, device: Device) -> Self {
        Self {
            language,
            config_path: None,
            ckpt_path: None,
            device,
        }
    }

    /// Model loaded from explicit configuration and weights.
    pub fn with_weights(
        language: LanguageCode,
        config_path: impl Into<PathBuf>,
        ckpt_path: impl Into<PathBuf>,
        device: Device,
    ) -> Self {
        Self {
            language,
            config_path: Some(config_path.into()),
            ckpt_path: Some(ckpt_path.into()),
            device,
        }
    }

    /// Human readable description used in logs and errors.
    pub fn describe(&self) -> String {
        match &self.ckpt_path {
            Some(ckpt) => format!("{} ({})", self.language, ckpt.display()),
            None => self.language.to_string(),
        }
    }
}

/// One render call.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub text: &'a str,
    pub speaker_id: u32,
    pub speed: f32,
    pub format: AudioFormat,
}

/// The opaque rendering capability of a loaded model.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    async fn render(&self, request: RenderRequest<'_>) -> SynthesisResult<Bytes>;

    /// Free the model's resources ahead of drop. Rendering after release is
    /// unspecified.
    async fn release(&self) {}
}

/// The opaque model construction capability.
#[async_trait]
pub trait BackendBuilder: Send + Sync {
    async fn build(&self, spec: &BackendSpec) -> BackendLoadResult<Backend>;
}

/// A loaded synthesis model.
pub struct Backend {
    language: LanguageCode,
    /// Language tag as reported by the engine, e.g. `ZH_MIX_EN`
    language_tag: String,
    device: Device,
    speakers: SpeakerSet,
    engine: Box<dyn SynthesisEngine>,
}

impl Backend {
    /// Wrap a loaded engine. Fails when the engine exposes no speakers, since
    /// voice resolution needs at least one to fall back to.
    pub fn new(
        language: LanguageCode,
        language_tag: impl Into<String>,
        device: Device,
        speakers: SpeakerSet,
        engine: Box<dyn SynthesisEngine>,
    ) -> BackendLoadResult<Self> {
        if speakers.is_empty() {
            return Err(BackendLoadError::NoSpeakers {
                target: language.to_string(),
            });
        }
        Ok(Self {
            language,
            language_tag: language_tag.into(),
            device,
            speakers,
            engine,
        })
    }

    #[inline]
    pub fn language(&self) -> LanguageCode {
        self.language
    }

    pub fn language_tag(&self) -> &str {
        &self.language_tag
    }

    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    pub fn speakers(&self) -> &SpeakerSet {
        &self.speakers
    }

    pub async fn render(&self, request: RenderRequest<'_>) -> SynthesisResult<Bytes> {
        self.engine.render(request).await
    }

    pub async fn release(&self) {
        self.engine.release().await
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("language", &self.language)
            .field("language_tag", &self.language_tag)
            .field("device", &self.device)
            .field("speakers", &self.speakers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SilentEngine;

    #[async_trait]
    impl SynthesisEngine for SilentEngine {
        async fn render(&self, _request: RenderRequest<'_>) -> SynthesisResult<Bytes> {
            Ok(Bytes::from_static(b"\0\0"))
        }
    }

    #[test]
    fn test_speaker_set_preserves_insertion_order() {
        let speakers: SpeakerSet = [("EN-US", 0), ("EN-BR", 1), ("EN-AU", 2), ("EN-Default", 3)]
            .into_iter()
            .collect();

        assert_eq!(speakers.first(), Some("EN-US"));
        assert_eq!(
            speakers.names().collect::<Vec<_>>(),
            vec!["EN-US", "EN-BR", "EN-AU", "EN-Default"]
        );
        assert_eq!(speakers.get("EN-AU"), Some(2));
        assert!(!speakers.contains("ZH"));
    }

    #[test]
    fn test_speaker_set_reinsert_keeps_position() {
        let mut speakers = SpeakerSet::new();
        speakers.insert("A", 0);
        speakers.insert("B", 1);
        speakers.insert("A", 7);

        assert_eq!(speakers.len(), 2);
        assert_eq!(speakers.first(), Some("A"));
        assert_eq!(speakers.get("A"), Some(7));
    }

    #[test]
    fn test_backend_rejects_empty_speaker_set() {
        let result = Backend::new(
            LanguageCode::Fr,
            "FR",
            Device::Cpu,
            SpeakerSet::new(),
            Box::new(SilentEngine),
        );
        assert!(matches!(result, Err(BackendLoadError::NoSpeakers { .. })));
    }

    #[tokio::test]
    async fn test_backend_render_delegates_to_engine() {
        let backend = Backend::new(
            LanguageCode::Zh,
            "ZH_MIX_EN",
            Device::Auto,
            [("ZH", 1)].into_iter().collect(),
            Box::new(SilentEngine),
        )
        .unwrap();

        let audio = backend
            .render(RenderRequest {
                text: "你好",
                speaker_id: 1,
                speed: 1.0,
                format: AudioFormat::Wav,
            })
            .await
            .unwrap();

        assert_eq!(audio.len(), 2);
        assert_eq!(backend.language_tag(), "ZH_MIX_EN");
        assert_eq!(backend.language(), LanguageCode::Zh);
    }

    #[test]
    fn test_device_parse() {
        assert_eq!(Device::parse("AUTO"), Some(Device::Auto));
        assert_eq!(Device::parse("gpu"), Some(Device::Cuda));
        assert_eq!(Device::parse("tpu"), None);
    }

    #[test]
    fn test_spec_describe() {
        let stock = BackendSpec::stock(LanguageCode::Es, Device::Cpu);
        assert_eq!(stock.describe(), "ES");

        let custom = BackendSpec::with_weights(
            LanguageCode::En,
            "/models/a/config.json",
            "/models/a/G_100.pth",
            Device::Cpu,
        );
        assert_eq!(custom.describe(), "EN (/models/a/G_100.pth)");
    }
}
