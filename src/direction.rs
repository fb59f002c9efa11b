use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use tracing::warn;

use crate::catalog::TranslatorConfig;
use crate::detection;

pub const ENGLISH_CODE: &str = "en";

/// A translation direction such as `zh-to-en`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Direction {
    pub source: String,
    pub target: String,
}

impl Direction {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn is_to_english(&self) -> bool {
        self.target == ENGLISH_CODE
    }

    pub fn is_from_english(&self) -> bool {
        self.source == ENGLISH_CODE
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.target.clone(), self.source.clone())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-to-{}", self.source, self.target)
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let raw = value.trim().to_lowercase();
        let (source, target) = raw
            .split_once("-to-")
            .ok_or_else(|| anyhow!("invalid direction '{}' (expected src-to-dst)", value))?;
        if source.is_empty() || target.is_empty() || source == target {
            return Err(anyhow!("invalid direction '{}'", value));
        }
        Ok(Direction::new(source, target))
    }
}

impl TryFrom<String> for Direction {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Direction> for String {
    fn from(value: Direction) -> Self {
        value.to_string()
    }
}

/// Result of one detect-only round trip.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResponse {
    pub detected_direction: Option<String>,
    pub detected_input_language: Option<String>,
    pub confidence: Option<f64>,
}

pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = Result<ProbeResponse>> + Send + 'a>>;

/// Something that can guess a direction for a piece of text.
pub trait DirectionProbe: Send + Sync {
    fn probe<'a>(&'a self, text: &'a str) -> ProbeFuture<'a>;
}

/// Runs the detection heuristic in-process.
#[derive(Debug, Clone)]
pub struct LocalProbe {
    translator: TranslatorConfig,
}

impl LocalProbe {
    pub fn new(translator: TranslatorConfig) -> Self {
        Self { translator }
    }
}

impl DirectionProbe for LocalProbe {
    fn probe<'a>(&'a self, text: &'a str) -> ProbeFuture<'a> {
        Box::pin(async move {
            let resolved = detection::determine_translation_direction(text, &self.translator, None);
            Ok(ProbeResponse {
                detected_direction: Some(resolved.direction.to_string()),
                detected_input_language: Some(resolved.detection.detected_language.to_string()),
                confidence: Some(f64::from(resolved.detection.confidence)),
            })
        })
    }
}

/// Asks a running server for a detect-only answer.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(api_base: &str, tool: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/api/{}", api_base.trim_end_matches('/'), tool),
        }
    }
}

impl DirectionProbe for HttpProbe {
    fn probe<'a>(&'a self, text: &'a str) -> ProbeFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&serde_json::json!({ "text": text, "detectOnly": true }))
                .send()
                .await
                .with_context(|| format!("failed to reach {}", self.url))?;
            if !response.status().is_success() {
                return Err(anyhow!("language detection failed ({})", response.status()));
            }
            response
                .json::<ProbeResponse>()
                .await
                .with_context(|| "failed to parse detection response")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub detected_direction: Direction,
    pub detected_input_language: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DirectionOptions {
    pub locale: Option<String>,
    /// Languages the tool accepts. Empty means any detected language.
    pub supported_languages: Vec<String>,
    pub warning_message: Option<String>,
}

/// Direction selection for a bidirectional tool.
///
/// Auto-detection moves the active direction until the user picks one by
/// hand; from then on detection only updates the detected language and the
/// warning.
#[derive(Debug, Clone)]
pub struct DirectionState {
    directions: Vec<Direction>,
    default_direction: Direction,
    active_direction: Direction,
    is_manual_direction: bool,
    detected_language: String,
    language_warning: String,
    supported_languages: Vec<String>,
    fallback_warning: String,
}

pub fn default_warning(locale: Option<&str>) -> &'static str {
    match locale {
        Some(locale) if locale.to_lowercase().starts_with("zh") => "请输入受支持的语言内容",
        _ => "Please input text in the supported languages.",
    }
}

fn normalise_confidence(confidence: Option<f64>) -> f64 {
    match confidence {
        Some(value) if !value.is_nan() => value.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

impl DirectionState {
    pub fn new(
        directions: Vec<Direction>,
        default_direction: Direction,
        options: DirectionOptions,
    ) -> Result<Self> {
        if !directions.contains(&default_direction) {
            return Err(anyhow!(
                "default direction \"{}\" must be included in the directions list",
                default_direction
            ));
        }
        let fallback_warning = options
            .warning_message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| default_warning(options.locale.as_deref()).to_string());
        Ok(Self {
            directions,
            active_direction: default_direction.clone(),
            default_direction,
            is_manual_direction: false,
            detected_language: detection::UNKNOWN.to_string(),
            language_warning: String::new(),
            supported_languages: options.supported_languages,
            fallback_warning,
        })
    }

    pub fn for_translator(translator: &TranslatorConfig, options: DirectionOptions) -> Result<Self> {
        Self::new(
            translator.directions.clone(),
            translator.default_direction.clone(),
            options,
        )
    }

    pub fn active_direction(&self) -> &Direction {
        &self.active_direction
    }

    pub fn is_manual_direction(&self) -> bool {
        self.is_manual_direction
    }

    pub fn detected_language(&self) -> &str {
        &self.detected_language
    }

    pub fn language_warning(&self) -> &str {
        &self.language_warning
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    fn is_supported_language(&self, language: &str) -> bool {
        if language.is_empty() || language == detection::UNKNOWN {
            return false;
        }
        self.supported_languages.is_empty()
            || self.supported_languages.iter().any(|item| item == language)
    }

    fn reported_direction(&self, detected: &Direction) -> Direction {
        if self.is_manual_direction {
            self.active_direction.clone()
        } else {
            detected.clone()
        }
    }

    pub async fn run_language_detection(
        &mut self,
        text: &str,
        probe: &dyn DirectionProbe,
    ) -> DetectionSummary {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            let default_direction = self.default_direction.clone();
            let detected_direction = self.reported_direction(&default_direction);
            if !self.is_manual_direction {
                self.active_direction = default_direction;
            }
            self.is_manual_direction = false;
            self.detected_language = detection::UNKNOWN.to_string();
            self.language_warning.clear();
            return DetectionSummary {
                detected_direction,
                detected_input_language: detection::UNKNOWN.to_string(),
                confidence: 0.0,
            };
        }

        match probe.probe(trimmed).await {
            Ok(response) => {
                let confidence = normalise_confidence(response.confidence);
                let detected_input_language = response
                    .detected_input_language
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| detection::UNKNOWN.to_string());
                let next_direction = response
                    .detected_direction
                    .and_then(|raw| raw.parse::<Direction>().ok())
                    .filter(|direction| self.directions.contains(direction))
                    .unwrap_or_else(|| self.default_direction.clone());

                if !self.is_manual_direction {
                    self.active_direction = next_direction.clone();
                }
                self.detected_language = detected_input_language.clone();

                if !self.is_supported_language(&detected_input_language) && confidence < 0.3 {
                    self.language_warning = self.fallback_warning.clone();
                } else {
                    self.language_warning.clear();
                }

                DetectionSummary {
                    detected_direction: self.reported_direction(&next_direction),
                    detected_input_language,
                    confidence,
                }
            }
            Err(err) => {
                warn!("language detection failed: {:#}", err);
                if !self.is_manual_direction {
                    self.language_warning = self.fallback_warning.clone();
                }
                let default_direction = self.default_direction.clone();
                DetectionSummary {
                    detected_direction: self.reported_direction(&default_direction),
                    detected_input_language: detection::UNKNOWN.to_string(),
                    confidence: 0.0,
                }
            }
        }
    }

    /// Cycles to the next configured direction and enters manual mode.
    pub fn toggle_direction(&mut self) {
        if self.directions.is_empty() {
            return;
        }
        let current = self
            .directions
            .iter()
            .position(|direction| *direction == self.active_direction);
        let next = current.map(|index| (index + 1) % self.directions.len()).unwrap_or(0);
        self.active_direction = self.directions[next].clone();
        self.is_manual_direction = true;
        self.language_warning.clear();
    }

    pub fn set_manual_direction(&mut self, direction: &Direction) {
        if !self.directions.contains(direction) {
            warn!("attempted to set unsupported direction \"{}\"", direction);
            return;
        }
        self.active_direction = direction.clone();
        self.is_manual_direction = true;
        self.language_warning.clear();
    }

    /// Follows a server-side correction without leaving auto mode.
    pub fn set_auto_direction(&mut self, direction: &Direction) {
        if !self.directions.contains(direction) {
            warn!("attempted to set unsupported direction \"{}\"", direction);
            return;
        }
        self.active_direction = direction.clone();
    }

    pub fn reset_direction(&mut self) {
        self.active_direction = self.default_direction.clone();
        self.is_manual_direction = false;
        self.detected_language = detection::UNKNOWN.to_string();
        self.language_warning.clear();
    }

    pub fn clear_warning(&mut self) {
        self.language_warning.clear();
    }
}
