use axum::{extract::State, response::Json};
use serde::Serialize;
use std::sync::Arc;

use crate::core::{Backend, DEFAULT_MODEL, LanguageCode};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct Speaker {
    /// Voice id accepted in the `voice` request field
    pub id: String,
    /// Engine speaker index
    pub speaker_id: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendVoices {
    pub language: LanguageCode,
    /// Language tag reported by the engine, e.g. `ZH_MIX_EN`
    pub language_tag: String,
    pub device: String,
    pub speakers: Vec<Speaker>,
}

impl BackendVoices {
    fn from_backend(backend: &Backend) -> Self {
        Self {
            language: backend.language(),
            language_tag: backend.language_tag().to_string(),
            device: backend.device().to_string(),
            speakers: backend
                .speakers()
                .iter()
                .map(|(id, speaker_id)| Speaker {
                    id: id.to_string(),
                    speaker_id,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomVoices {
    pub model_id: String,
    #[serde(flatten)]
    pub backend: BackendVoices,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoicesResponse {
    /// The active default backend; `None` before the first load
    pub default: Option<BackendVoices>,
    /// Custom backends built so far
    pub custom: Vec<CustomVoices>,
}

/// List the voices of every loaded backend
pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<VoicesResponse> {
    let registry = state.registry();

    let default = registry
        .active()
        .map(|backend| BackendVoices::from_backend(&backend));

    let custom = registry
        .cached_custom_models()
        .into_iter()
        .map(|(model_id, backend)| CustomVoices {
            model_id,
            backend: BackendVoices::from_backend(&backend),
        })
        .collect();

    Json(VoicesResponse { default, custom })
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: &'static str,
    /// `default` for the language-routed model, `custom` for catalog entries
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub object: &'static str,
    pub data: Vec<ModelInfo>,
}

/// List selectable models: the default sentinel plus the custom catalog
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let mut data = vec![ModelInfo {
        id: DEFAULT_MODEL.to_string(),
        object: "model",
        kind: "default",
        language: None,
        speaker_id: None,
    }];

    data.extend(state.catalog().iter().map(|entry| ModelInfo {
        id: entry.model_id.clone(),
        object: "model",
        kind: "custom",
        language: Some(entry.language),
        speaker_id: Some(entry.speaker_id),
    }));

    Json(ModelsResponse {
        object: "list",
        data,
    })
}
