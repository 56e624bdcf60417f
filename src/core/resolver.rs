//! Voice resolution.
//!
//! Turns a caller's voice hint plus the detected language of the text into a
//! concrete `(language, voice)` pair and the backend that will render it.
//!
//! Resolution runs in two phases so that the final language is known before
//! any model is loaded:
//!
//! 1. [`plan`] (pure): parse the hint, pick and normalize the working language,
//!    apply the Chinese override and substitute the default voice.
//! 2. [`finalize`]: given the backend the registry actually produced, adjust
//!    for a failed load and validate the voice against its speaker table.
//!
//! Neither phase fails. The worst case is the first speaker of whatever
//! backend is active.

use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::{Backend, BackendLoadResult, SpeakerSet};
use super::catalog::CustomModelCatalog;
use super::classifier::{Detection, LanguageClassifier};
use super::language::{DEFAULT_EN_VOICE, DEFAULT_MODEL, LanguageCode};
use super::registry::{BackendRegistry, DefaultBackend};

/// Parsed `voice` request field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceHint {
    /// Raw lowercase language part, e.g. `en`
    pub language: Option<String>,
    pub voice: Option<String>,
}

impl VoiceHint {
    /// `"<language>/<voice>"` when the input contains exactly one `/`,
    /// otherwise the whole input is the voice.
    pub fn parse(raw: &str) -> Self {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };

        let mut parts = raw.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            // An empty language part is still a language; it normalizes to EN
            (Some(language), Some(voice), None) => Self {
                language: Some(language.trim().to_lowercase()),
                voice: non_empty(voice),
            },
            _ => Self {
                language: None,
                voice: non_empty(raw),
            },
        }
    }
}

/// Language and voice decided before any backend is acquired.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionPlan {
    pub hint: VoiceHint,
    pub detected: Option<Detection>,
    /// Normalized working language; the backend to acquire
    pub language: LanguageCode,
    /// Text was detected as Chinese and is routed to the Chinese backend
    pub chinese_text: bool,
    pub voice_id: String,
    /// `voice_id` names a custom model and bypasses speaker validation
    pub custom_voice: bool,
}

/// Decide the working language and voice.
pub fn plan(
    hint: VoiceHint,
    detected: Option<Detection>,
    catalog: &CustomModelCatalog,
) -> ResolutionPlan {
    let raw_language = hint
        .language
        .as_deref()
        .or(detected.as_ref().map(|d| d.language.as_str()))
        .unwrap_or("en");
    let mut language = LanguageCode::normalize(raw_language);

    let detected_chinese = detected.as_ref().is_some_and(Detection::is_chinese);
    // Mixed text written partly in Latin letters must not reach the English model
    if detected_chinese && language == LanguageCode::En {
        language = LanguageCode::Zh;
    }
    let chinese_text = detected_chinese && language == LanguageCode::Zh;

    let custom_voice = hint
        .voice
        .as_deref()
        .is_some_and(|voice| catalog.contains(voice));

    let voice_id = match hint.voice.as_deref() {
        Some(voice) if custom_voice => voice.to_string(),
        Some(voice) if voice != DEFAULT_MODEL && voice != language.as_str() => voice.to_string(),
        _ => language.default_voice().to_string(),
    };

    ResolutionPlan {
        hint,
        detected,
        language,
        chinese_text,
        voice_id,
        custom_voice,
    }
}

/// Validation chain for a voice missing from `speakers`: the language code,
/// `ZH` for Chinese text, the default English voice, then the first speaker.
pub fn fallback_voice(speakers: &SpeakerSet, language: LanguageCode, chinese_text: bool) -> String {
    let candidates = [
        Some(language.as_str()),
        chinese_text.then_some(LanguageCode::Zh.as_str()),
        (language == LanguageCode::En).then_some(DEFAULT_EN_VOICE),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|candidate| speakers.contains(candidate))
        .or_else(|| speakers.first())
        .unwrap_or(language.as_str())
        .to_string()
}

/// A fully resolved voice and the backend that serves it.
#[derive(Debug, Clone)]
pub struct ResolvedVoice {
    /// Language the plan asked for
    pub requested_language: LanguageCode,
    /// Language actually served; differs from `requested_language` after a failed load
    pub language: LanguageCode,
    pub voice_id: String,
    /// Index into the backend's speaker table; `None` for custom voices
    pub speaker_id: Option<u32>,
    pub backend: Arc<Backend>,
    pub detected: Option<Detection>,
    pub custom_voice: bool,
    pub chinese_text: bool,
}

/// Adjust a plan to the backend the registry produced.
pub fn finalize(plan: ResolutionPlan, acquired: DefaultBackend) -> ResolvedVoice {
    let fell_back = acquired.is_fallback();
    let backend = acquired.into_backend();
    let speakers = backend.speakers();
    let language = backend.language();
    let mut voice_id = plan.voice_id;

    if fell_back && !plan.custom_voice {
        let candidate = language.default_voice();
        voice_id = if speakers.contains(candidate) {
            candidate.to_string()
        } else {
            language.as_str().to_string()
        };
    }

    if !plan.custom_voice && !speakers.contains(&voice_id) {
        let replacement = fallback_voice(speakers, language, plan.chinese_text);
        debug!(
            requested = %voice_id,
            resolved = %replacement,
            language = %language,
            "Voice not in speaker table"
        );
        voice_id = replacement;
    }

    let speaker_id = if plan.custom_voice {
        None
    } else {
        speakers.get(&voice_id)
    };

    ResolvedVoice {
        requested_language: plan.language,
        language,
        voice_id,
        speaker_id,
        backend,
        detected: plan.detected,
        custom_voice: plan.custom_voice,
        chinese_text: plan.chinese_text,
    }
}

/// Runs classification, planning and backend acquisition for one request.
pub struct VoiceResolver {
    classifier: Arc<dyn LanguageClassifier>,
    registry: Arc<BackendRegistry>,
    catalog: Arc<CustomModelCatalog>,
}

impl VoiceResolver {
    pub fn new(
        classifier: Arc<dyn LanguageClassifier>,
        registry: Arc<BackendRegistry>,
        catalog: Arc<CustomModelCatalog>,
    ) -> Self {
        Self {
            classifier,
            registry,
            catalog,
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<CustomModelCatalog> {
        &self.catalog
    }

    /// Resolve a voice hint for `text`.
    ///
    /// Only fails when no default backend has ever been loaded.
    pub async fn resolve(&self, raw_hint: &str, text: &str) -> BackendLoadResult<ResolvedVoice> {
        let hint = VoiceHint::parse(raw_hint);

        let detected = match self.classifier.classify(text).await {
            Ok(detection) => Some(detection),
            Err(e) => {
                warn!("Language detection failed, assuming English: {e}");
                None
            }
        };

        let plan = plan(hint, detected, &self.catalog);
        debug!(
            hint_language = ?plan.hint.language,
            hint_voice = ?plan.hint.voice,
            detected = ?plan.detected.as_ref().map(|d| d.language.as_str()),
            language = %plan.language,
            voice = %plan.voice_id,
            "Planned voice resolution"
        );

        let acquired = self.registry.swap(plan.language).await?;
        Ok(finalize(plan, acquired))
    }
}
