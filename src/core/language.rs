//! Language codes understood by the synthesis backends.
//!
//! Backends are selected by a canonical uppercase code. Raw codes coming from
//! callers or from the language classifier are lowercase ISO-639-1 style
//! (`en`, `zh`, `ja`, ...) and are mapped through a fixed table; anything the
//! table does not know falls back to English.

use serde::{Deserialize, Serialize};

/// Voice used when English is selected without an explicit speaker.
pub const DEFAULT_EN_VOICE: &str = "EN-Default";

/// Sentinel model name. As a voice it means "pick the default voice".
pub const DEFAULT_MODEL: &str = "tts-1";

/// Canonical backend language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LanguageCode {
    #[default]
    #[serde(rename = "EN")]
    En,
    #[serde(rename = "ZH")]
    Zh,
    #[serde(rename = "JP")]
    Jp,
    #[serde(rename = "KR")]
    Kr,
    #[serde(rename = "ES")]
    Es,
    #[serde(rename = "FR")]
    Fr,
}

impl LanguageCode {
    /// Canonical uppercase form used for backend selection.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "EN",
            Self::Zh => "ZH",
            Self::Jp => "JP",
            Self::Kr => "KR",
            Self::Es => "ES",
            Self::Fr => "FR",
        }
    }

    /// Normalize a raw (caller or classifier) language code.
    ///
    /// `en`, `es`, `fr`, `zh` map to their uppercase form, `ja` to `JP`, `ko`
    /// to `KR`. Every other input, including the empty string, maps to `EN`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "en" => Self::En,
            "es" => Self::Es,
            "fr" => Self::Fr,
            "zh" => Self::Zh,
            "ja" => Self::Jp,
            "ko" => Self::Kr,
            _ => Self::En,
        }
    }

    /// Parse a canonical code such as `ZH` or a backend tag such as `ZH_MIX_EN`.
    ///
    /// Only the part before the first `_` is considered. Returns `None` for
    /// anything that is not one of the canonical codes.
    pub fn from_canonical(tag: &str) -> Option<Self> {
        let base = tag.split('_').next().unwrap_or(tag);
        match base.trim().to_uppercase().as_str() {
            "EN" => Some(Self::En),
            "ZH" => Some(Self::Zh),
            "JP" => Some(Self::Jp),
            "KR" => Some(Self::Kr),
            "ES" => Some(Self::Es),
            "FR" => Some(Self::Fr),
            _ => None,
        }
    }

    /// The language-named default voice.
    ///
    /// English maps to [`DEFAULT_EN_VOICE`]; every other language uses its own code.
    #[inline]
    pub fn default_voice(&self) -> &'static str {
        match self {
            Self::En => DEFAULT_EN_VOICE,
            other => other.as_str(),
        }
    }

    pub fn all() -> &'static [LanguageCode] {
        &[Self::En, Self::Zh, Self::Jp, Self::Kr, Self::Es, Self::Fr]
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
