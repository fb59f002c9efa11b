use axum::Json;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::catalog::TranslatorConfig;
use crate::data;
use crate::detection;
use crate::error::{ServiceError, ServiceResult};
use crate::translator::{InputType, TranslationRequest, TranslationResult};

use super::models::{
    BatchItem, DetectResponse, ErrorResponse, LanguageInfo, TranslateBody, TranslateResponse,
};

pub(crate) const SUPPORTED_IMAGE_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// A [`ServiceError`] on its way out as `{ "error": ... }`.
#[derive(Debug)]
pub(crate) struct ApiError(pub(crate) ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        } else {
            warn!("request rejected ({}): {}", status.as_u16(), self.0);
        }
        let body = ErrorResponse {
            error: self.0.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

pub(crate) fn parse_input_type(raw: Option<&str>) -> ServiceResult<InputType> {
    match raw.map(|value| value.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("text") => Ok(InputType::Text),
        Some("image") => Ok(InputType::Image),
        Some("audio") => Ok(InputType::Audio),
        Some(other) => Err(ServiceError::invalid(format!(
            "Invalid input type: {}. Expected text, image or audio",
            other
        ))),
    }
}

pub(crate) fn ensure_supported_image(mime: &str) -> ServiceResult<()> {
    if SUPPORTED_IMAGE_TYPES.contains(&mime) {
        Ok(())
    } else {
        Err(ServiceError::invalid(format!(
            "Unsupported image type. Supported types: {}",
            SUPPORTED_IMAGE_TYPES.join(", ")
        )))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub(crate) fn request_from_body(body: TranslateBody) -> ServiceResult<TranslationRequest> {
    let input_type = parse_input_type(body.input_type.as_deref())?;
    let mut request = TranslationRequest {
        text: non_empty(body.text),
        mode: body.mode,
        direction: body.direction,
        detect_only: body.detect_only,
        input_type,
        ..TranslationRequest::default()
    };

    match input_type {
        InputType::Text => {
            if request.text.is_none() {
                return Err(ServiceError::invalid("No text provided"));
            }
        }
        InputType::Image => {
            let (Some(payload), Some(mime)) =
                (non_empty(body.image_data), non_empty(body.image_mime_type))
            else {
                return Err(ServiceError::invalid("No image data provided"));
            };
            let mime = mime.trim().to_lowercase();
            ensure_supported_image(&mime)?;
            let image = data::load_attachment_from_base64(&payload, Some(&mime))
                .map_err(|err| ServiceError::invalid(format!("Invalid image data: {}", err)))?;
            request.image = Some(image);
        }
        InputType::Audio => {
            let (Some(payload), Some(mime)) =
                (non_empty(body.audio_data), non_empty(body.audio_mime_type))
            else {
                return Err(ServiceError::invalid("No audio data provided"));
            };
            let audio = data::load_attachment_from_base64(&payload, Some(mime.trim()))
                .map_err(|err| ServiceError::invalid(format!("Invalid audio data: {}", err)))?;
            request.audio = Some(audio);
        }
    }
    Ok(request)
}

fn detected_label(detected: &str, translator: &TranslatorConfig) -> String {
    match detected {
        detection::ENGLISH => "English".to_string(),
        detection::UNKNOWN => "Unknown".to_string(),
        _ => translator.language_name.clone(),
    }
}

pub(crate) fn language_info(
    result: &TranslationResult,
    translator: &TranslatorConfig,
) -> Option<LanguageInfo> {
    let metadata = &result.metadata;
    let detected = metadata.detected_language.as_deref()?;
    let direction = metadata.direction.as_ref()?;
    let source = translator.language_label(&direction.source);
    let target = translator.language_label(&direction.target);
    let confidence = metadata.confidence.unwrap_or(0.0).clamp(0.0, 1.0);
    let explanation = if metadata.auto_detected {
        format!("Auto-detected {} input, translated to {}", source, target)
    } else {
        format!("Manual translation: {} → {}", source, target)
    };
    Some(LanguageInfo {
        detected: true,
        detected_language: detected_label(detected, translator),
        direction: format!("{} → {}", source, target),
        confidence: (confidence * 100.0).round() as u32,
        explanation,
    })
}

pub(crate) fn translate_response(
    result: TranslationResult,
    translator: &TranslatorConfig,
) -> TranslateResponse {
    let info = language_info(&result, translator);
    let mode_name = translator
        .mode(&result.mode)
        .and_then(|mode| mode.label.clone())
        .unwrap_or_else(|| result.mode.clone());
    let metadata = result.metadata;
    let detected = metadata.detected_language.is_some();
    TranslateResponse {
        translated: result.translated,
        original: result.original,
        mode: result.mode,
        mode_name,
        direction: metadata.direction,
        input_type: metadata.input_type,
        message: "Translation successful".to_string(),
        extracted_text: non_empty(metadata.extracted_text),
        transcription: non_empty(metadata.transcription),
        detected_input_language: metadata.detected_language,
        confidence: metadata.confidence.filter(|_| detected),
        auto_detected: detected.then_some(metadata.auto_detected),
        language_info: info,
    }
}

pub(crate) fn detect_response(
    result: &TranslationResult,
    translator: &TranslatorConfig,
) -> DetectResponse {
    DetectResponse {
        detected_input_language: result.metadata.detected_language.clone(),
        detected_direction: result.metadata.direction.clone(),
        confidence: result.metadata.confidence,
        auto_detected: result.metadata.auto_detected,
        language_info: language_info(result, translator),
    }
}

pub(crate) fn batch_item(original: String, outcome: ServiceResult<TranslationResult>) -> BatchItem {
    match outcome {
        Ok(result) => BatchItem {
            original,
            translated: Some(result.translated),
            direction: result.metadata.direction,
            error: None,
        },
        Err(err) => {
            warn!("batch item failed: {}", err);
            BatchItem {
                original,
                translated: None,
                direction: None,
                error: Some(err.public_message()),
            }
        }
    }
}
