//! Custom model catalog.
//!
//! A static table of alternate models, keyed by a caller-chosen identifier,
//! read once at startup. The source file is JSON or YAML:
//!
//! ```yaml
//! custom_models:
//!   - model_id: narrator-v2
//!     language: EN
//!     config_path: /models/narrator/config.json
//!     ckpt_path: /models/narrator/G_40000.pth
//!     speaker_id: 0
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::language::LanguageCode;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read custom model catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse custom model catalog {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// One custom model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomModelEntry {
    pub model_id: String,
    pub language: LanguageCode,
    pub config_path: PathBuf,
    pub ckpt_path: PathBuf,
    /// Speaker index used when this entry supplies the backend
    pub speaker_id: u32,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    custom_models: Vec<RawEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEntry {
    model_id: Option<String>,
    language: Option<String>,
    config_path: Option<PathBuf>,
    ckpt_path: Option<PathBuf>,
    speaker_id: Option<u32>,
}

/// Accepts canonical codes (`ZH`, `ZH_MIX_EN`) as well as raw ones (`ja`).
fn parse_entry_language(raw: &str) -> LanguageCode {
    LanguageCode::from_canonical(raw).unwrap_or_else(|| LanguageCode::normalize(raw))
}

/// Immutable lookup table of custom models.
#[derive(Debug, Clone, Default)]
pub struct CustomModelCatalog {
    entries: BTreeMap<String, CustomModelEntry>,
}

impl CustomModelCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CustomModelEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.model_id.clone(), entry))
                .collect(),
        }
    }

    /// Load the catalog, degrading to an empty one on any error.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(catalog) => {
                info!(
                    path = %path.display(),
                    models = catalog.len(),
                    "Loaded custom model catalog"
                );
                catalog
            }
            Err(e) => {
                warn!("{e}; continuing without custom models");
                Self::empty()
            }
        }
    }

    pub fn try_load(path: &Path) -> CatalogResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    fn parse(path: &Path, contents: &str) -> CatalogResult<Self> {
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );

        let file: CatalogFile = if is_yaml {
            serde_yaml::from_str(contents).map_err(|e| CatalogError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            serde_json::from_str(contents).map_err(|e| CatalogError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        let mut entries = BTreeMap::new();
        for (index, raw) in file.custom_models.into_iter().enumerate() {
            let Some(model_id) = raw.model_id.filter(|id| !id.trim().is_empty()) else {
                warn!(index, "Skipping custom model without model_id");
                continue;
            };
            let (Some(config_path), Some(ckpt_path)) = (raw.config_path, raw.ckpt_path) else {
                warn!(model_id = %model_id, "Skipping custom model without config_path/ckpt_path");
                continue;
            };
            let language = raw
                .language
                .as_deref()
                .map(parse_entry_language)
                .unwrap_or_default();

            let entry = CustomModelEntry {
                model_id: model_id.clone(),
                language,
                config_path,
                ckpt_path,
                speaker_id: raw.speaker_id.unwrap_or(0),
            };
            if entries.insert(model_id.clone(), entry).is_some() {
                warn!(model_id = %model_id, "Duplicate custom model id, later entry wins");
            }
        }

        Ok(Self { entries })
    }

    #[inline]
    pub fn lookup(&self, model_id: &str) -> Option<&CustomModelEntry> {
        self.entries.get(model_id)
    }

    #[inline]
    pub fn contains(&self, model_id: &str) -> bool {
        self.entries.contains_key(model_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomModelEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
