//! In-process stand-ins for the synthesis worker and language classifier.
//!
//! Backends render a readable `LANG|speaker|format|text` payload so tests can
//! assert which backend and speaker served a request.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use speech_router::{
    Backend, BackendBuilder, BackendLoadError, BackendLoadResult, BackendRegistry, BackendSpec,
    ClassificationError, ClassificationResult, CustomModelCatalog, CustomModelEntry, Detection,
    Device, LanguageClassifier, LanguageCode, RenderRequest, SpeakerSet, SynthesisEngine,
    SynthesisError, SynthesisResult,
};

/// Text that makes [`FakeEngine`] fail to render
pub const EXPLODE: &str = "explode";

/// Classifier answering from a fixed table, `en` for anything unknown
#[derive(Default)]
pub struct ScriptedClassifier {
    answers: HashMap<String, String>,
    failing: bool,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            answers: HashMap::new(),
            failing: true,
        }
    }

    pub fn answer(mut self, text: &str, language: &str) -> Self {
        self.answers.insert(text.to_string(), language.to_string());
        self
    }
}

#[async_trait]
impl LanguageClassifier for ScriptedClassifier {
    async fn classify(&self, text: &str) -> ClassificationResult<Detection> {
        if self.failing {
            return Err(ClassificationError::Unavailable("scripted failure".into()));
        }
        let language = self.answers.get(text).map(String::as_str).unwrap_or("en");
        Ok(Detection::new(language, 0.99))
    }
}

pub struct FakeEngine {
    tag: String,
}

#[async_trait]
impl SynthesisEngine for FakeEngine {
    async fn render(&self, request: RenderRequest<'_>) -> SynthesisResult<Bytes> {
        if request.text.contains(EXPLODE) {
            return Err(SynthesisError::Render("engine crashed".into()));
        }
        Ok(Bytes::from(format!(
            "{}|{}|{}|{}",
            self.tag, request.speaker_id, request.format, request.text
        )))
    }
}

/// Stock speaker tables, shaped like the real language models
pub fn stock_speakers(language: LanguageCode) -> SpeakerSet {
    match language {
        LanguageCode::En => [("EN-US", 0), ("EN-BR", 1), ("EN-AU", 2), ("EN-Default", 3)]
            .into_iter()
            .collect(),
        LanguageCode::Zh => [("ZH", 1)].into_iter().collect(),
        other => [(other.as_str(), 0)].into_iter().collect(),
    }
}

/// Builder recording every spec it was asked for
#[derive(Default)]
pub struct FakeBuilder {
    failing: Mutex<HashSet<LanguageCode>>,
    fail_weights: bool,
    speakers: HashMap<LanguageCode, SpeakerSet>,
    delay: Option<Duration>,
    built: Mutex<Vec<BackendSpec>>,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_language(self, language: LanguageCode) -> Self {
        self.failing.lock().insert(language);
        self
    }

    /// Fail every build that carries explicit weight paths
    pub fn failing_weights(mut self) -> Self {
        self.fail_weights = true;
        self
    }

    pub fn with_speakers(mut self, language: LanguageCode, speakers: SpeakerSet) -> Self {
        self.speakers.insert(language, speakers);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail(&self, language: LanguageCode) {
        self.failing.lock().insert(language);
    }

    pub fn recover(&self, language: LanguageCode) {
        self.failing.lock().remove(&language);
    }

    pub fn built(&self) -> Vec<BackendSpec> {
        self.built.lock().clone()
    }

    /// Number of stock (non-custom) loads for `language`
    pub fn stock_loads(&self, language: LanguageCode) -> usize {
        self.built
            .lock()
            .iter()
            .filter(|spec| spec.language == language && spec.ckpt_path.is_none())
            .count()
    }
}

#[async_trait]
impl BackendBuilder for FakeBuilder {
    async fn build(&self, spec: &BackendSpec) -> BackendLoadResult<Backend> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.built.lock().push(spec.clone());

        let custom = spec.ckpt_path.is_some();
        if (custom && self.fail_weights) || (!custom && self.failing.lock().contains(&spec.language))
        {
            return Err(BackendLoadError::build(spec.describe(), "out of memory"));
        }

        let speakers = self
            .speakers
            .get(&spec.language)
            .cloned()
            .unwrap_or_else(|| stock_speakers(spec.language));
        let tag = if custom {
            format!("{}-custom", spec.language)
        } else {
            spec.language.as_str().to_string()
        };

        Backend::new(
            spec.language,
            tag.clone(),
            spec.device,
            speakers,
            Box::new(FakeEngine { tag }),
        )
    }
}

pub fn catalog_entry(model_id: &str, language: LanguageCode, speaker_id: u32) -> CustomModelEntry {
    CustomModelEntry {
        model_id: model_id.to_string(),
        language,
        config_path: PathBuf::from(format!("/models/{model_id}/config.json")),
        ckpt_path: PathBuf::from(format!("/models/{model_id}/G_latest.pth")),
        speaker_id,
    }
}

pub fn registry(builder: &Arc<FakeBuilder>) -> Arc<BackendRegistry> {
    Arc::new(BackendRegistry::new(
        Arc::clone(builder) as Arc<dyn BackendBuilder>,
        Device::Cpu,
    ))
}

pub fn catalog(entries: impl IntoIterator<Item = CustomModelEntry>) -> Arc<CustomModelCatalog> {
    Arc::new(CustomModelCatalog::from_entries(entries))
}
