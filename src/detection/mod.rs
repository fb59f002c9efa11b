//! Guessing whether input text is English or a tool's target language.
//!
//! Scores come from weighted regex patterns plus two coarse signals: whether
//! the text leaves ASCII, and (for Haitian Creole) the average word length.
//! The result only steers the translation direction; it is not a language
//! identifier in any stronger sense.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::catalog::TranslatorConfig;
use crate::direction::Direction;

mod profiles;

pub use profiles::{LanguageProfile, PROFILE_KEYS, profile};

pub const UNKNOWN: &str = "unknown";
pub const ENGLISH: &str = "english";

/// Targets whose own script patterns already reward non-ASCII text.
const SCRIPT_SCORED_TARGETS: &[&str] = &["chinese", "cuneiform"];

const DOMINANCE_RATIO: f32 = 1.5;
const AMBIGUOUS_CONFIDENCE: f32 = 0.3;
const MIN_CONFIDENCE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedLanguage {
    English,
    Target(String),
    Unknown,
}

impl DetectedLanguage {
    pub fn as_str(&self) -> &str {
        match self {
            DetectedLanguage::English => ENGLISH,
            DetectedLanguage::Target(key) => key,
            DetectedLanguage::Unknown => UNKNOWN,
        }
    }
}

impl fmt::Display for DetectedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DetectedLanguage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuggestedDirection {
    #[serde(rename = "to-english")]
    ToEnglish,
    #[serde(rename = "from-english")]
    FromEnglish,
}

impl SuggestedDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestedDirection::ToEnglish => "to-english",
            SuggestedDirection::FromEnglish => "from-english",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub detected_language: DetectedLanguage,
    pub confidence: f32,
    pub suggested_direction: SuggestedDirection,
}

/// Raw scores, exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scores {
    pub english: u32,
    pub target: u32,
}

pub fn score(text: &str, target: &str) -> Scores {
    let clean = text.to_lowercase();
    let clean = clean.trim();

    let mut english = profiles::english().score(clean);
    let target_profile = profile(target).unwrap_or_else(profiles::empty);
    let mut target_score = target_profile.score(clean);

    let has_non_ascii = !clean.is_ascii();
    if has_non_ascii {
        if !SCRIPT_SCORED_TARGETS.contains(&target) {
            target_score += 3;
        }
    } else {
        english += 1;
    }

    if target == "creole" && average_word_length(clean) < 4.0 {
        target_score += 1;
    }

    Scores {
        english,
        target: target_score,
    }
}

fn average_word_length(text: &str) -> f32 {
    let words = text.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return 0.0;
    }
    let total: usize = words.iter().map(|word| word.chars().count()).sum();
    total as f32 / words.len() as f32
}

pub fn detect_language(text: &str, target: &str) -> Detection {
    if text.trim().is_empty() {
        return Detection {
            detected_language: DetectedLanguage::Unknown,
            confidence: 0.0,
            suggested_direction: SuggestedDirection::ToEnglish,
        };
    }

    let Scores {
        english,
        target: target_score,
    } = score(text, target);
    let (e, t) = (english as f32, target_score as f32);

    let (detected_language, confidence) = if english == 0 && target_score == 0 {
        (DetectedLanguage::Unknown, 0.0)
    } else if e > t * DOMINANCE_RATIO {
        (DetectedLanguage::English, ((e - t) / e).min(1.0))
    } else if t > e * DOMINANCE_RATIO {
        (
            DetectedLanguage::Target(target.to_string()),
            ((t - e) / t).min(1.0),
        )
    } else {
        (DetectedLanguage::Unknown, AMBIGUOUS_CONFIDENCE)
    };

    let suggested_direction = if detected_language == DetectedLanguage::English {
        SuggestedDirection::FromEnglish
    } else {
        SuggestedDirection::ToEnglish
    };

    Detection {
        detected_language,
        confidence: confidence.max(MIN_CONFIDENCE),
        suggested_direction,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDirection {
    pub direction: Direction,
    pub auto_detected: bool,
    pub explanation: String,
    pub detection: Detection,
}

/// Picks the direction a translator should run in for `text`.
///
/// A direction chosen by the user is kept as-is. Otherwise the heuristic's
/// suggestion is mapped onto the translator's own `*-to-en` / `en-to-*`
/// directions, falling back to its default.
pub fn determine_translation_direction(
    text: &str,
    translator: &TranslatorConfig,
    user_direction: Option<&Direction>,
) -> ResolvedDirection {
    let detection = detect_language(text, translator.detection_key());

    if let Some(direction) = user_direction {
        return ResolvedDirection {
            direction: direction.clone(),
            auto_detected: false,
            explanation: format!("Using the requested direction: {}", direction),
            detection,
        };
    }

    let suggested = match detection.suggested_direction {
        SuggestedDirection::ToEnglish => translator
            .directions
            .iter()
            .find(|direction| direction.is_to_english()),
        SuggestedDirection::FromEnglish => translator
            .directions
            .iter()
            .find(|direction| direction.is_from_english()),
    };
    let direction = suggested
        .cloned()
        .unwrap_or_else(|| translator.default_direction.clone());

    let detected = if detection.detected_language == DetectedLanguage::English {
        "English".to_string()
    } else {
        translator.language_name.clone()
    };
    let explanation = format!(
        "Detected {}, translating {} → {}",
        detected,
        translator.language_label(&direction.source),
        translator.language_label(&direction.target),
    );

    ResolvedDirection {
        direction,
        auto_detected: true,
        explanation,
        detection,
    }
}
