//! Language identification capability.
//!
//! The router treats language identification as an opaque collaborator:
//! `classify(text) -> (language, confidence)`. Failures are soft; the
//! resolver assumes English when no detection is available.
//!
//! The primary implementation is the worker's `POST /classify`
//! ([`WorkerClassifier`](crate::core::WorkerClassifier)). [`ScriptClassifier`]
//! is an in-process stand-in for deployments or tests without it: it looks at
//! Unicode scripts first (Hangul, Kana, Han) and falls back to a small
//! stopword vote for Latin-script text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for classification
pub type ClassificationResult<T> = Result<T, ClassificationError>;

#[derive(Debug, Clone, Error)]
pub enum ClassificationError {
    #[error("Text contains no classifiable letters")]
    NoLetters,

    #[error("Language classifier unavailable: {0}")]
    Unavailable(String),
}

/// A language detection result.
///
/// `language` is the raw lowercase code reported by the classifier (`zh`,
/// `ja`, `es`, ...), not the canonical backend code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub language: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(language: impl Into<String>, confidence: f32) -> Self {
        Self {
            language: language.into().to_lowercase(),
            confidence,
        }
    }

    /// Whether the classifier reported Chinese.
    #[inline]
    pub fn is_chinese(&self) -> bool {
        self.language == "zh"
    }
}

/// The opaque language identification capability.
#[async_trait]
pub trait LanguageClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> ClassificationResult<Detection>;
}

/// Han characters carry more signal per character than Latin letters, so a
/// few ideographs outweigh the Latin words mixed into them.
const HAN_WEIGHT: usize = 3;

const EN_WORDS: &[&str] = &[
    "the", "and", "is", "are", "was", "of", "to", "in", "it", "i", "you", "that", "this", "not",
    "can", "with", "for", "on", "be", "have", "but", "my", "we", "they", "he", "she", "a", "an",
    "doesn't", "don't", "what", "will",
];

const ES_WORDS: &[&str] = &[
    "el", "la", "los", "las", "de", "del", "que", "y", "en", "un", "una", "es", "no", "me", "se",
    "por", "con", "para", "lo", "su", "al", "como", "pero", "hace", "yo", "muy", "está", "son",
    "puedo", "hola",
];

const FR_WORDS: &[&str] = &[
    "je", "tu", "il", "elle", "nous", "vous", "le", "la", "les", "de", "du", "des", "un", "une",
    "et", "est", "ne", "pas", "que", "qui", "en", "pour", "dans", "avec", "ce", "sur", "au",
    "peux", "bonjour", "suis",
];

const DE_WORDS: &[&str] = &[
    "der", "die", "das", "und", "ist", "nicht", "ich", "du", "ein", "eine", "zu", "mit", "auf",
    "für", "es", "kann", "sie", "wir", "den", "dem",
];

const ES_MARKERS: &[char] = &['ñ', '¿', '¡', 'á', 'í', 'ó', 'ú'];
const FR_MARKERS: &[char] = &['è', 'ê', 'à', 'ç', 'ù', 'â', 'î', 'ô', 'œ', 'û', 'ë', 'ï'];
const DE_MARKERS: &[char] = &['ß', 'ä', 'ö', 'ü'];

#[derive(Debug, Default)]
struct ScriptCounts {
    hangul: usize,
    kana: usize,
    han: usize,
    latin: usize,
}

fn is_hangul(cp: u32) -> bool {
    (0xAC00..=0xD7AF).contains(&cp)
        || (0x1100..=0x11FF).contains(&cp)
        || (0x3130..=0x318F).contains(&cp)
}

fn is_kana(cp: u32) -> bool {
    (0x3040..=0x30FF).contains(&cp) || (0x31F0..=0x31FF).contains(&cp)
}

fn is_han(cp: u32) -> bool {
    (0x4E00..=0x9FFF).contains(&cp)
        || (0x3400..=0x4DBF).contains(&cp)
        || (0xF900..=0xFAFF).contains(&cp)
        || (0x20000..=0x2A6DF).contains(&cp)
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || ((0xC0..=0x24F).contains(&(c as u32)) && c.is_alphabetic())
}

fn count_scripts(text: &str) -> ScriptCounts {
    let mut counts = ScriptCounts::default();
    for c in text.chars() {
        let cp = c as u32;
        if is_hangul(cp) {
            counts.hangul += 1;
        } else if is_kana(cp) {
            counts.kana += 1;
        } else if is_han(cp) {
            counts.han += 1;
        } else if is_latin_letter(c) {
            counts.latin += 1;
        }
    }
    counts
}

/// Unicode-script and stopword based stand-in for the worker classifier.
#[derive(Debug, Clone, Default)]
pub struct ScriptClassifier;

impl ScriptClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous classification used by the trait implementation.
    pub fn detect(&self, text: &str) -> ClassificationResult<Detection> {
        let counts = count_scripts(text);
        let total = counts.hangul + counts.kana + counts.han + counts.latin;
        if total == 0 {
            return Err(ClassificationError::NoLetters);
        }
        let ratio = |n: usize| (n as f32 / total as f32).clamp(0.0, 1.0);

        if counts.hangul > 0 && counts.hangul >= counts.kana {
            return Ok(Detection::new("ko", ratio(counts.hangul)));
        }
        // Japanese mixes kanji with kana; any kana decides it
        if counts.kana > 0 {
            return Ok(Detection::new("ja", ratio(counts.kana + counts.han)));
        }
        if counts.han > 0 && counts.han * HAN_WEIGHT >= counts.latin {
            return Ok(Detection::new("zh", ratio(counts.han)));
        }

        Ok(self.detect_latin(text))
    }

    fn detect_latin(&self, text: &str) -> Detection {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !(c.is_alphabetic() || c == '\''))
            .filter(|w| !w.is_empty())
            .collect();

        let vote = |stopwords: &[&str], markers: &[char]| -> usize {
            let word_hits = words.iter().filter(|w| stopwords.contains(w)).count();
            let marker_hits = lowered.chars().filter(|c| markers.contains(c)).count();
            word_hits + 2 * marker_hits
        };

        let candidates = [
            ("en", vote(EN_WORDS, &[])),
            ("es", vote(ES_WORDS, ES_MARKERS)),
            ("fr", vote(FR_WORDS, FR_MARKERS)),
            ("de", vote(DE_WORDS, DE_MARKERS)),
        ];

        let total: usize = candidates.iter().map(|(_, score)| score).sum();
        // First maximum wins so ties resolve towards English
        let (language, score) = candidates
            .iter()
            .fold(("en", 0usize), |best, &(lang, score)| {
                if score > best.1 { (lang, score) } else { best }
            });

        let confidence = if total == 0 {
            0.0
        } else {
            score as f32 / total as f32
        };
        Detection::new(language, confidence)
    }
}

#[async_trait]
impl LanguageClassifier for ScriptClassifier {
    async fn classify(&self, text: &str) -> ClassificationResult<Detection> {
        self.detect(text)
    }
}
