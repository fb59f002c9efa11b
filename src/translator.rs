use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::catalog::{TranslatorConfig, TranslatorKind};
use crate::cipher::{self, CipherLanguage};
use crate::data::MediaAttachment;
use crate::detection;
use crate::direction::Direction;
use crate::error::{ServiceError, ServiceResult};
use crate::prompts::{self, MediaKind};
use crate::providers::{GenerationConfig, Provider, ProviderResponse, ProviderUsage};
use crate::queue::RequestQueue;

const CIPHER_CONFIDENCE: f64 = 0.9;
const HEALTH_PROMPT: &str = "Reply with the single word OK.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Image,
    Audio,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Image => "image",
            InputType::Audio => "audio",
        }
    }

    fn media_kind(&self) -> Option<MediaKind> {
        match self {
            InputType::Text => None,
            InputType::Image => Some(MediaKind::Image),
            InputType::Audio => Some(MediaKind::Audio),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TranslationRequest {
    pub text: Option<String>,
    pub image: Option<MediaAttachment>,
    pub audio: Option<MediaAttachment>,
    /// Falls back to the translator's default mode.
    pub mode: Option<String>,
    /// `src-to-dst` or one of the translator's aliases.
    pub direction: Option<String>,
    pub detect_only: bool,
    pub input_type: InputType,
}

impl TranslationRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationMetadata {
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
    pub processing_ms: u64,
    pub direction: Option<Direction>,
    pub detected_language: Option<String>,
    pub confidence: Option<f64>,
    pub auto_detected: bool,
    pub explanation: Option<String>,
    pub extracted_text: Option<String>,
    pub transcription: Option<String>,
    pub input_type: InputType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub translated: String,
    pub original: String,
    pub mode: String,
    pub metadata: TranslationMetadata,
}

/// Where the direction for one request came from.
#[derive(Debug, Clone)]
struct DirectionChoice {
    direction: Direction,
    detected_language: Option<String>,
    confidence: Option<f64>,
    auto_detected: bool,
    explanation: Option<String>,
}

impl DirectionChoice {
    fn fixed(direction: Direction) -> Self {
        Self {
            direction,
            detected_language: None,
            confidence: None,
            auto_detected: false,
            explanation: None,
        }
    }
}

/// Runs translation requests against a provider through the shared queue.
#[derive(Debug, Clone)]
pub struct Translator<P: Provider> {
    provider: P,
    queue: Arc<RequestQueue>,
}

impl<P: Provider> Translator<P> {
    pub fn new(provider: P, queue: Arc<RequestQueue>) -> Self {
        Self { provider, queue }
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn translate(
        &self,
        request: TranslationRequest,
        translator: &TranslatorConfig,
    ) -> ServiceResult<TranslationResult> {
        let started = Instant::now();
        let mode = request
            .mode
            .as_deref()
            .map(str::trim)
            .filter(|mode| !mode.is_empty())
            .unwrap_or(&translator.default_mode)
            .to_string();
        let mode_config = translator.mode(&mode).ok_or_else(|| {
            ServiceError::invalid(format!(
                "Invalid mode. Available modes: {}",
                translator.mode_names().join(", ")
            ))
        })?;

        let user_direction = match request.direction.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(translator.resolve_direction(raw).ok_or_else(
                || {
                    ServiceError::invalid(format!(
                        "Invalid direction: {}. Available directions: {}",
                        raw,
                        join_directions(&translator.directions)
                    ))
                },
            )?),
            _ => None,
        };

        let original = request.text.clone().unwrap_or_default();
        let choice = match request.input_type {
            InputType::Text => {
                if original.trim().is_empty() {
                    return Err(ServiceError::invalid("No text provided"));
                }
                choose_direction(&original, translator, user_direction)
            }
            InputType::Image | InputType::Audio => DirectionChoice::fixed(
                user_direction.unwrap_or_else(|| translator.default_direction.clone()),
            ),
        };
        debug!(
            "{}: mode={} direction={} auto={}",
            translator.id, mode, choice.direction, choice.auto_detected
        );

        let mut metadata = TranslationMetadata {
            direction: Some(choice.direction.clone()),
            detected_language: choice.detected_language,
            confidence: choice.confidence,
            auto_detected: choice.auto_detected,
            explanation: choice.explanation,
            input_type: request.input_type,
            ..TranslationMetadata::default()
        };

        if request.detect_only {
            metadata.processing_ms = started.elapsed().as_millis() as u64;
            return Ok(TranslationResult {
                translated: String::new(),
                original,
                mode,
                metadata,
            });
        }

        let translated = match (translator.kind, translator.cipher, request.input_type) {
            (TranslatorKind::Cipher, Some(kind), InputType::Text) => {
                cipher::apply(kind, &choice.direction, &original)
            }
            (TranslatorKind::Cipher, _, _) => {
                return Err(ServiceError::invalid(format!(
                    "{} only translates text",
                    translator.name
                )));
            }
            (TranslatorKind::Ai, _, InputType::Text) => {
                let prompt =
                    prompts::build_prompt(&original, translator, &mode, Some(&choice.direction))?;
                let provider = self
                    .provider
                    .clone()
                    .with_generation(GenerationConfig::from_mode(mode_config))
                    .append_user_input(prompt);
                let response = self.generate(provider).await?;
                fill_usage(&mut metadata, &response);
                response.text
            }
            (TranslatorKind::Ai, _, input_type) => {
                let kind = input_type
                    .media_kind()
                    .ok_or_else(|| ServiceError::invalid("Unsupported input type"))?;
                let media = match kind {
                    MediaKind::Image => request.image,
                    MediaKind::Audio => request.audio,
                }
                .ok_or_else(|| {
                    ServiceError::invalid(format!("No {} data provided", kind.as_str()))
                })?;
                ensure_media_support(translator, kind)?;

                let prompt = prompts::build_multimodal_prompt(
                    translator,
                    &mode,
                    Some(&choice.direction),
                    kind,
                )?;
                let has_format = translator
                    .multimodal
                    .as_ref()
                    .is_some_and(|config| config.response_format.is_some());
                let provider = self
                    .provider
                    .clone()
                    .with_generation(GenerationConfig::from_mode(mode_config))
                    .append_user_input(prompt)
                    .append_user_data(media);
                let response = self.generate(provider).await?;
                fill_usage(&mut metadata, &response);

                let parts = prompts::parse_multimodal_response(&response.text, kind, has_format);
                metadata.extracted_text = parts.extracted_text;
                metadata.transcription = parts.transcription;
                parts.translation
            }
        };

        let translated = match translator.post_process {
            Some(post) => post.apply(&translated),
            None => translated,
        };
        metadata.processing_ms = started.elapsed().as_millis() as u64;
        info!(
            "{} translated {} input in {} ms",
            translator.id,
            request.input_type.as_str(),
            metadata.processing_ms
        );

        Ok(TranslationResult {
            translated,
            original,
            mode,
            metadata,
        })
    }

    /// Sends a trivial prompt to confirm the upstream model answers.
    pub async fn health_check(&self) -> ServiceResult<ProviderResponse> {
        let provider = self
            .provider
            .clone()
            .append_user_input(HEALTH_PROMPT.to_string());
        self.generate(provider).await
    }

    async fn generate(&self, provider: P) -> ServiceResult<ProviderResponse> {
        self.queue
            .run(|| {
                let provider = provider.clone();
                async move {
                    provider
                        .generate()
                        .await
                        .map_err(|err| ServiceError::from_upstream(format!("{:#}", err)))
                }
            })
            .await
    }
}

fn choose_direction(
    text: &str,
    translator: &TranslatorConfig,
    user_direction: Option<Direction>,
) -> DirectionChoice {
    if let (TranslatorKind::Cipher, Some(kind)) = (translator.kind, translator.cipher) {
        if let Some(direction) = user_direction {
            return DirectionChoice::fixed(direction);
        }
        if !translator.supports_detection() {
            return DirectionChoice::fixed(translator.default_direction.clone());
        }
        let detected = cipher::detect(kind, text);
        let suggested = match detected {
            CipherLanguage::Encoded => translator.directions.iter().find(|d| d.is_to_english()),
            CipherLanguage::English => translator.directions.iter().find(|d| d.is_from_english()),
            CipherLanguage::Unknown => None,
        };
        let direction = suggested
            .cloned()
            .unwrap_or_else(|| translator.default_direction.clone());
        let confidence = match detected {
            CipherLanguage::Unknown => 0.0,
            _ => CIPHER_CONFIDENCE,
        };
        let explanation = format!(
            "Detected {}, translating {} → {}",
            detected.label(kind),
            translator.language_label(&direction.source),
            translator.language_label(&direction.target),
        );
        return DirectionChoice {
            direction,
            detected_language: Some(detected.label(kind).to_string()),
            confidence: Some(confidence),
            auto_detected: true,
            explanation: Some(explanation),
        };
    }

    if !translator.supports_detection() {
        return DirectionChoice::fixed(
            user_direction.unwrap_or_else(|| translator.default_direction.clone()),
        );
    }

    let resolved =
        detection::determine_translation_direction(text, translator, user_direction.as_ref());
    DirectionChoice {
        direction: resolved.direction,
        detected_language: Some(resolved.detection.detected_language.to_string()),
        confidence: Some(f64::from(resolved.detection.confidence)),
        auto_detected: resolved.auto_detected,
        explanation: Some(resolved.explanation),
    }
}

fn ensure_media_support(translator: &TranslatorConfig, kind: MediaKind) -> ServiceResult<()> {
    let supported = translator.multimodal.as_ref().is_some_and(|config| match kind {
        MediaKind::Image => config.supports_image,
        MediaKind::Audio => config.supports_audio,
    });
    if supported {
        Ok(())
    } else {
        Err(ServiceError::invalid(format!(
            "{} does not support {} input",
            translator.name,
            kind.as_str()
        )))
    }
}

fn fill_usage(metadata: &mut TranslationMetadata, response: &ProviderResponse) {
    metadata.model = response.model.clone();
    metadata.usage = response.usage.clone();
}

pub(crate) fn join_directions(directions: &[Direction]) -> String {
    directions
        .iter()
        .map(Direction::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::data::{PNG_MIME, load_attachment_from_bytes};
    use crate::queue::QueueConfig;
    use crate::test_util::StubProvider;
    use std::time::Duration;

    fn translator(provider: StubProvider) -> Translator<StubProvider> {
        let queue = RequestQueue::new(QueueConfig {
            retry_delay: Duration::ZERO,
            ..QueueConfig::default()
        });
        Translator::new(provider, Arc::new(queue))
    }

    fn config(id: &str) -> TranslatorConfig {
        Catalog::builtin().unwrap().get(id).unwrap().clone()
    }

    fn png() -> MediaAttachment {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0; 16]);
        load_attachment_from_bytes(bytes, None, Some("menu.png")).unwrap()
    }

    #[tokio::test]
    async fn auto_detects_chinese_input() {
        let stub = StubProvider::replying("Hello, the weather is nice today");
        let service = translator(stub.clone());
        let result = service
            .translate(
                TranslationRequest::text("你好，今天天气很好"),
                &config("chinese-english-translator"),
            )
            .await
            .unwrap();

        assert_eq!(result.translated, "Hello, the weather is nice today");
        assert_eq!(result.mode, "general");
        let metadata = &result.metadata;
        assert_eq!(metadata.direction, Some("zh-to-en".parse().unwrap()));
        assert_eq!(metadata.detected_language.as_deref(), Some("chinese"));
        assert!(metadata.auto_detected);
        assert_eq!(metadata.model.as_deref(), Some("stub-model"));

        let calls = stub.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].user[0].ends_with("\"你好，今天天气很好\""));
    }

    #[tokio::test]
    async fn manual_direction_is_kept() {
        let stub = StubProvider::replying("你好");
        let service = translator(stub);
        let mut request = TranslationRequest::text("Hello");
        request.direction = Some("en-to-zh".to_string());
        let result = service
            .translate(request, &config("chinese-english-translator"))
            .await
            .unwrap();
        assert_eq!(result.metadata.direction, Some("en-to-zh".parse().unwrap()));
        assert!(!result.metadata.auto_detected);
    }

    #[tokio::test]
    async fn rejects_unknown_mode_and_direction() {
        let service = translator(StubProvider::replying("x"));
        let target = config("chinese-english-translator");

        let mut request = TranslationRequest::text("hi");
        request.mode = Some("poetic".to_string());
        let err = service.translate(request, &target).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid mode. Available modes: general, idioms, legal, literary, technical"
        );

        let mut request = TranslationRequest::text("hi");
        request.direction = Some("fr-to-en".to_string());
        let err = service.translate(request, &target).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn detect_only_skips_the_provider() {
        let stub = StubProvider::replying("unused");
        let service = translator(stub.clone());
        let mut request = TranslationRequest::text("Hello, how are you today?");
        request.detect_only = true;
        let result = service
            .translate(request, &config("chinese-english-translator"))
            .await
            .unwrap();
        assert_eq!(result.translated, "");
        assert_eq!(result.metadata.direction, Some("en-to-zh".parse().unwrap()));
        assert_eq!(result.metadata.detected_language.as_deref(), Some("english"));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn cipher_translators_run_locally() {
        let stub = StubProvider::replying("unused");
        let service = translator(stub.clone());
        let target = config("al-bhed-translator");

        let encoded = service
            .translate(TranslationRequest::text("This is a test sentence"), &target)
            .await
            .unwrap();
        assert_eq!(encoded.translated, "Drec ec y dacd cahdahla");
        assert_eq!(encoded.metadata.detected_language.as_deref(), Some("english"));

        let decoded = service
            .translate(TranslationRequest::text("Drec ec y dacd cahdahla"), &target)
            .await
            .unwrap();
        assert_eq!(decoded.translated, "This is a test sentence");
        assert_eq!(decoded.metadata.direction, Some("albhed-to-en".parse().unwrap()));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn image_input_uses_multimodal_prompt() {
        let reply = "[EXTRACTED TEXT]\n你好\n[TRANSLATION]\nHello";
        let stub = StubProvider::replying(reply);
        let service = translator(stub.clone());
        let request = TranslationRequest {
            image: Some(png()),
            input_type: InputType::Image,
            ..TranslationRequest::default()
        };
        let result = service
            .translate(request, &config("chinese-english-translator"))
            .await
            .unwrap();

        assert_eq!(result.translated, "Hello");
        assert_eq!(result.metadata.extracted_text.as_deref(), Some("你好"));
        assert_eq!(result.metadata.input_type, InputType::Image);
        assert_eq!(stub.calls()[0].data_mimes, vec![PNG_MIME.to_string()]);
    }

    #[tokio::test]
    async fn media_requires_data_and_support() {
        let service = translator(StubProvider::replying("x"));
        let request = TranslationRequest {
            input_type: InputType::Audio,
            ..TranslationRequest::default()
        };
        let err = service
            .translate(request, &config("chinese-english-translator"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No audio data provided");

        let request = TranslationRequest {
            image: Some(png()),
            input_type: InputType::Image,
            ..TranslationRequest::default()
        };
        let err = service
            .translate(request, &config("esperanto-translator"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not support image input"));
    }

    #[tokio::test]
    async fn provider_quota_errors_are_classified() {
        let service = translator(StubProvider::failing(
            "Gemini API error (429 Too Many Requests): Resource has been exhausted (e.g. check quota).",
        ));
        let err = service
            .translate(
                TranslationRequest::text("Bonjour"),
                &config("esperanto-translator"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Quota(_)));
        assert_eq!(service.queue().stats().total_failed, 1);
    }

    #[tokio::test]
    async fn post_processing_is_applied() {
        let service = translator(StubProvider::replying("Good   morning \n\n everyone"));
        let result = service
            .translate(
                TranslationRequest::text("おはようございます"),
                &config("japanese-to-english-translator"),
            )
            .await
            .unwrap();
        assert_eq!(result.translated, "Good morning everyone");
    }

    #[tokio::test]
    async fn health_check_generates_once() {
        let stub = StubProvider::replying("OK");
        let service = translator(stub.clone());
        let response = service.health_check().await.unwrap();
        assert_eq!(response.text, "OK");
        assert_eq!(stub.calls()[0].user, vec![HEALTH_PROMPT.to_string()]);
    }
}
