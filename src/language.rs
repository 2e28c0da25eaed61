//! Language detection for cleaned email text.
//!
//! The builder only depends on the [`LanguageDetector`] trait. The bundled
//! [`ScriptDetector`] covers English, German and Russian with a two-stage
//! heuristic:
//!
//! 1. **Script analysis**: a Cyrillic-dominant text is Russian.
//! 2. **Latin disambiguation**: stop-word frequency plus umlauts / `ß`
//!    separate German from English.

use serde::{Deserialize, Serialize};

/// A language classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// ISO 639-1 code, lower-case
    pub code: String,

    /// Confidence score (0.0–1.0)
    pub confidence: f64,
}

impl Detection {
    pub fn new(code: impl Into<String>, confidence: f64) -> Self {
        Self {
            code: code.into(),
            confidence,
        }
    }
}

/// Classifies the language of a text.
pub trait LanguageDetector: Send + Sync {
    /// Returns `None` when the text is empty or too ambiguous to classify.
    fn detect(&self, text: &str) -> Option<Detection>;
}

/// Script and stop-word based detector for `en`, `de` and `ru`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptDetector;

const ENGLISH_MARKERS: &[&str] = &[
    "the", "is", "are", "was", "were", "with", "from", "this", "that", "and", "for", "not", "but",
    "have", "has", "had", "will", "would", "can", "could", "should", "it", "they", "we", "you",
    "he", "she", "of", "to", "in", "on", "at", "please", "hello", "hi",
];

const GERMAN_MARKERS: &[&str] = &[
    "der", "die", "das", "und", "ist", "nicht", "mit", "ein", "eine", "zu", "den", "von", "sie",
    "ich", "wir", "sich", "auf", "für", "auch", "es", "im", "dem", "bitte", "hallo", "wie",
    "haben", "wird", "noch", "nach",
];

impl LanguageDetector for ScriptDetector {
    fn detect(&self, text: &str) -> Option<Detection> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut cyrillic = 0u32;
        let mut latin = 0u32;
        let mut total_alpha = 0u32;

        for c in trimmed.chars().filter(|c| c.is_alphabetic()) {
            total_alpha += 1;
            match c {
                '\u{0400}'..='\u{052F}' => cyrillic += 1,
                '\u{0041}'..='\u{024F}' | '\u{1E00}'..='\u{1EFF}' => latin += 1,
                _ => {}
            }
        }

        if total_alpha == 0 {
            return None;
        }

        let cyrillic_ratio = f64::from(cyrillic) / f64::from(total_alpha);
        let latin_ratio = f64::from(latin) / f64::from(total_alpha);

        if cyrillic_ratio > 0.5 {
            return Some(Detection::new(
                "ru",
                (0.70 + cyrillic_ratio * 0.25).min(0.95),
            ));
        }

        if latin_ratio > 0.5 {
            return detect_latin(trimmed);
        }

        None
    }
}

/// Disambiguate English and German by stop words and diacritics.
#[allow(clippy::cast_precision_loss)]
fn detect_latin(text: &str) -> Option<Detection> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();

    let english = words.iter().filter(|w| ENGLISH_MARKERS.contains(*w)).count() as f64;
    let mut german = words.iter().filter(|w| GERMAN_MARKERS.contains(*w)).count() as f64;

    if lower.contains(['ä', 'ö', 'ü', 'ß']) {
        german += 2.0;
    }

    let word_count = words.len().max(1) as f64;
    let en = english / word_count;
    let de = german / word_count;

    if en.max(de) < 0.01 || (en - de).abs() < f64::EPSILON {
        return None;
    }

    let (code, margin) = if en > de { ("en", en - de) } else { ("de", de - en) };
    Some(Detection::new(code, (0.60 + margin.min(0.25)).min(0.85)))
}
