use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tera::{Context as TeraContext, Tera};

use crate::catalog::TranslatorConfig;
use crate::direction::Direction;
use crate::error::{ServiceError, ServiceResult};

const IMAGE_PROMPT: &str = include_str!("image_prompt.tera");
const AUDIO_PROMPT: &str = include_str!("audio_prompt.tera");
const AUDIO_FORMAT: &str = include_str!("audio_format.tera");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }
}

/// Picks the instruction for `mode`, preferring the directional prompts of a
/// bidirectional translator.
pub fn system_prompt<'a>(
    translator: &'a TranslatorConfig,
    mode: &str,
    direction: Option<&Direction>,
) -> ServiceResult<&'a str> {
    let config = translator
        .mode(mode)
        .ok_or_else(|| ServiceError::invalid(format!("Unsupported mode: {}", mode)))?;

    if let Some(direction) = direction
        && translator.bidirectional
        && let (Some(to_english), Some(from_english)) = (
            config.to_english_prompt.as_deref(),
            config.from_english_prompt.as_deref(),
        )
    {
        return Ok(if direction.is_to_english() {
            to_english
        } else {
            from_english
        });
    }

    config.prompt.as_deref().ok_or_else(|| {
        ServiceError::invalid(format!(
            "Mode {} of {} has no prompt for this direction",
            mode, translator.id
        ))
    })
}

pub fn build_prompt(
    text: &str,
    translator: &TranslatorConfig,
    mode: &str,
    direction: Option<&Direction>,
) -> ServiceResult<String> {
    let instruction = system_prompt(translator, mode, direction)?;
    Ok(format!("{}\n\n\"{}\"", instruction.trim_end(), text))
}

pub fn source_language_name(translator: &TranslatorConfig, direction: Option<&Direction>) -> String {
    direction
        .map(|direction| translator.language_label(&direction.source))
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn target_language_name(translator: &TranslatorConfig, direction: Option<&Direction>) -> String {
    direction
        .map(|direction| translator.language_label(&direction.target))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Prompt sent alongside an image or audio attachment.
///
/// Translators may override the wording per media kind. When the translator
/// asks for a structured answer, the expected section layout is appended so
/// [`parse_multimodal_response`] can split it again.
pub fn build_multimodal_prompt(
    translator: &TranslatorConfig,
    mode: &str,
    direction: Option<&Direction>,
    kind: MediaKind,
) -> ServiceResult<String> {
    let instruction = system_prompt(translator, mode, direction)?;
    let multimodal = translator.multimodal.as_ref();

    let mut context = TeraContext::new();
    context.insert("source_language", &source_language_name(translator, direction));
    context.insert("target_language", &target_language_name(translator, direction));
    context.insert("system_prompt", instruction.trim_end());
    context.insert("mode_name", mode);

    let custom = multimodal.and_then(|config| match kind {
        MediaKind::Image => config.image_prompt.as_deref(),
        MediaKind::Audio => config.audio_prompt.as_deref(),
    });
    let template = custom.unwrap_or(match kind {
        MediaKind::Image => IMAGE_PROMPT,
        MediaKind::Audio => AUDIO_PROMPT,
    });
    let mut prompt = Tera::one_off(template.trim_end(), &context, false)
        .with_context(|| format!("failed to render {} prompt", kind.as_str()))?;

    if let Some(format) = multimodal.and_then(|config| config.response_format.as_deref()) {
        let layout = match kind {
            MediaKind::Image => format,
            MediaKind::Audio => AUDIO_FORMAT,
        };
        let rendered = Tera::one_off(layout.trim_end(), &context, false)
            .with_context(|| "failed to render response format")?;
        prompt.push_str("\n\nRespond in this format:\n");
        prompt.push_str(&rendered);
    }

    Ok(prompt)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultimodalParts {
    pub translation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

struct SectionPatterns {
    extracted: Regex,
    image_translation: Regex,
    context: Regex,
    transcription: Regex,
    audio_translation: Regex,
    data_url: Regex,
}

fn patterns() -> Option<&'static SectionPatterns> {
    static PATTERNS: OnceLock<Option<SectionPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(SectionPatterns {
                extracted: Regex::new(r"(?s)\[EXTRACTED TEXT\]\n(.*?)\n\[TRANSLATION\]").ok()?,
                image_translation: Regex::new(r"(?s)\[TRANSLATION\]\n(.*?)(?:\n\[CONTEXT\]|$)")
                    .ok()?,
                context: Regex::new(r"(?s)\[CONTEXT\]\n(.*)$").ok()?,
                transcription: Regex::new(r"(?s)\[TRANSCRIPTION\]\n(.*?)\n\[TRANSLATION\]").ok()?,
                audio_translation: Regex::new(r"(?s)\[TRANSLATION\]\n(.*)$").ok()?,
                data_url: Regex::new(r"^data:(?:image|audio)/[\w.+-]+;base64,").ok()?,
            })
        })
        .as_ref()
}

fn capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|section| section.as_str().trim().to_string())
}

/// Splits a sectioned model answer. Without a requested format, or when the
/// model ignored it, the whole answer is the translation.
pub fn parse_multimodal_response(text: &str, kind: MediaKind, has_format: bool) -> MultimodalParts {
    let whole = MultimodalParts {
        translation: text.trim().to_string(),
        ..MultimodalParts::default()
    };
    if !has_format {
        return whole;
    }
    let Some(patterns) = patterns() else {
        return whole;
    };

    match kind {
        MediaKind::Image => MultimodalParts {
            translation: capture(&patterns.image_translation, text).unwrap_or(whole.translation),
            extracted_text: capture(&patterns.extracted, text),
            context: capture(&patterns.context, text),
            transcription: None,
        },
        MediaKind::Audio => MultimodalParts {
            translation: capture(&patterns.audio_translation, text).unwrap_or(whole.translation),
            transcription: capture(&patterns.transcription, text),
            extracted_text: None,
            context: None,
        },
    }
}

pub fn strip_data_url_prefix(data: &str) -> &str {
    match patterns().and_then(|patterns| patterns.data_url.find(data)) {
        Some(prefix) => &data[prefix.end()..],
        None => data,
    }
}
