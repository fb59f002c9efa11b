use serde::{Deserialize, Serialize};

use crate::direction::Direction;
use crate::translator::InputType;

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct TranslateBody {
    pub(crate) text: Option<String>,
    pub(crate) image_data: Option<String>,
    pub(crate) image_mime_type: Option<String>,
    pub(crate) audio_data: Option<String>,
    pub(crate) audio_mime_type: Option<String>,
    pub(crate) mode: Option<String>,
    pub(crate) direction: Option<String>,
    pub(crate) input_type: Option<String>,
    pub(crate) detect_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LanguageInfo {
    pub(crate) detected: bool,
    pub(crate) detected_language: String,
    pub(crate) direction: String,
    /// Rounded percentage.
    pub(crate) confidence: u32,
    pub(crate) explanation: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranslateResponse {
    pub(crate) translated: String,
    pub(crate) original: String,
    pub(crate) mode: String,
    pub(crate) mode_name: String,
    pub(crate) direction: Option<Direction>,
    pub(crate) input_type: InputType,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) transcription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detected_input_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) auto_detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) language_info: Option<LanguageInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DetectResponse {
    pub(crate) detected_input_language: Option<String>,
    pub(crate) detected_direction: Option<Direction>,
    pub(crate) confidence: Option<f64>,
    pub(crate) auto_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) language_info: Option<LanguageInfo>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct BatchBody {
    pub(crate) texts: Vec<String>,
    pub(crate) mode: Option<String>,
    pub(crate) direction: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchItem {
    pub(crate) original: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) translated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchResponse {
    pub(crate) results: Vec<BatchItem>,
    pub(crate) succeeded: usize,
    pub(crate) failed: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolHealth {
    pub(crate) status: &'static str,
    pub(crate) message: String,
    pub(crate) timestamp: String,
    pub(crate) methods: Vec<&'static str>,
    pub(crate) directions: Vec<Direction>,
    pub(crate) default_direction: Direction,
    pub(crate) modes: Vec<String>,
    pub(crate) default_mode: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranslatorSummary {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) kind: crate::catalog::TranslatorKind,
    pub(crate) bidirectional: bool,
    pub(crate) language_detection: bool,
    pub(crate) directions: Vec<Direction>,
    pub(crate) modes: Vec<String>,
    pub(crate) supports_image: bool,
    pub(crate) supports_audio: bool,
    pub(crate) credit_cost: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
