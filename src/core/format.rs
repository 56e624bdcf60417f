//! Audio container formats the router can request from a backend.

use serde::{Deserialize, Serialize};

/// Supported response formats.
///
/// The default response format is mp3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MP3 format (default)
    #[default]
    Mp3,
    /// WAV format
    Wav,
    /// FLAC format
    Flac,
}

impl AudioFormat {
    /// Convert to the wire/file-extension value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
        }
    }

    /// Get the MIME type for this format.
    #[inline]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Flac => "audio/flac",
        }
    }

    /// Strict parse. Returns `None` for anything outside `mp3|wav|flac`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }

    /// Parse from string, degrading unknown formats to mp3 with a warning.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            tracing::warn!(
                requested = %s,
                "Invalid response format, using default format: mp3"
            );
            Self::default()
        })
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
