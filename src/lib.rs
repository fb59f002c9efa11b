use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;

pub mod catalog;
pub mod cipher;
pub mod data;
pub mod detection;
pub mod direction;
pub mod error;
pub mod interactive;
pub mod logging;
pub mod prompts;
pub mod providers;
pub mod queue;
pub mod server;
pub mod settings;
mod translator;

#[cfg(test)]
mod test_util;

pub use catalog::{Catalog, TranslatorConfig};
pub use error::{ServiceError, ServiceResult};
pub use providers::{Gemini, Provider, ProviderUsage, RetryPolicy};
pub use queue::{QueueConfig, RequestQueue};
pub use settings::Settings;
pub use translator::{
    InputType, TranslationMetadata, TranslationRequest, TranslationResult, Translator,
};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings_path: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TranslateArgs {
    pub tool: String,
    pub mode: Option<String>,
    pub direction: Option<String>,
    pub detect_only: bool,
    /// Image or audio file sent instead of text.
    pub data: Option<String>,
    pub data_mime: Option<String>,
    pub with_using_model: bool,
    pub with_using_tokens: bool,
}

pub fn load_environment(config: &Config) -> Result<(Settings, Catalog)> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let catalog = Catalog::load(settings.catalog_path.as_deref())?;
    Ok((settings, catalog))
}

/// Gemini client wired to the configured queue.
pub fn build_translator(config: &Config, settings: &Settings) -> Result<Translator<Gemini>> {
    let key_override = config
        .key
        .as_deref()
        .or(settings.gemini_api_key.as_deref());
    let key = providers::resolve_key(key_override)
        .with_context(|| "no API key found for Gemini")?;
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| settings.gemini_model.clone());
    let provider = Gemini::new(key)
        .with_model(model)
        .with_base_url(settings.gemini_base_url.clone())
        .with_retry(settings.gemini_max_retries, RetryPolicy::default().base_delay)
        .with_backoff_budget(settings.queue.backoff_budget());
    let queue = Arc::new(RequestQueue::new(settings.queue));
    Ok(Translator::new(provider, queue))
}

fn find_tool<'a>(catalog: &'a Catalog, tool: &str) -> Result<&'a TranslatorConfig> {
    catalog
        .get(tool)
        .ok_or_else(|| anyhow!("unknown translator '{}' (see `vibetrans tools`)", tool))
}

/// Runs the direction heuristic only; no API key needed.
pub fn detect(config: &Config, tool: &str, input: &str) -> Result<String> {
    let (_, catalog) = load_environment(config)?;
    let translator = find_tool(&catalog, tool)?;
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("input is empty"));
    }
    let resolved = detection::determine_translation_direction(input, translator, None);
    Ok(serde_json::to_string_pretty(&resolved)?)
}

pub async fn translate(config: &Config, args: TranslateArgs, input: Option<String>) -> Result<String> {
    let (settings, catalog) = load_environment(config)?;
    let translator_config = find_tool(&catalog, &args.tool)?;
    let request = build_request(&args, input)?;
    let translator = build_translator(config, &settings)?;

    let result = translator.translate(request, translator_config).await?;
    if args.detect_only {
        return Ok(serde_json::to_string_pretty(&result.metadata)?);
    }
    Ok(format_execution_output(
        &result,
        args.with_using_model,
        args.with_using_tokens,
    ))
}

fn build_request(args: &TranslateArgs, input: Option<String>) -> Result<TranslationRequest> {
    let mut request = TranslationRequest {
        mode: args.mode.clone(),
        direction: args.direction.clone(),
        detect_only: args.detect_only,
        ..TranslationRequest::default()
    };
    if let Some(path) = args.data.as_deref() {
        let attachment = data::load_attachment(Path::new(path), args.data_mime.as_deref())?;
        match attachment.kind() {
            prompts::MediaKind::Image => {
                request.input_type = InputType::Image;
                request.image = Some(attachment);
            }
            prompts::MediaKind::Audio => {
                request.input_type = InputType::Audio;
                request.audio = Some(attachment);
            }
        }
        return Ok(request);
    }
    let input = input.unwrap_or_default();
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("stdin is empty"));
    }
    request.text = Some(input.to_string());
    Ok(request)
}

fn format_execution_output(
    result: &TranslationResult,
    with_using_model: bool,
    with_using_tokens: bool,
) -> String {
    let mut output = result.translated.clone();
    let mut meta_lines = Vec::new();

    if let Some(extracted) = result.metadata.extracted_text.as_deref() {
        meta_lines.push(format!("extracted: {}", extracted));
    }
    if let Some(transcription) = result.metadata.transcription.as_deref() {
        meta_lines.push(format!("transcription: {}", transcription));
    }
    if with_using_model {
        let model = result.metadata.model.as_deref().unwrap_or("unavailable");
        meta_lines.push(format!("model: {}", model));
    }
    if with_using_tokens {
        meta_lines.push(format_usage(result.metadata.usage.as_ref()));
    }

    if !meta_lines.is_empty() {
        output.push('\n');
        output.push_str(&meta_lines.join("\n"));
    }
    output
}

fn format_usage(usage: Option<&ProviderUsage>) -> String {
    let Some(usage) = usage else {
        return "tokens: unavailable".to_string();
    };
    let total = usage.total_tokens.or_else(|| {
        usage
            .prompt_tokens
            .zip(usage.completion_tokens)
            .map(|(prompt, completion)| prompt + completion)
    });

    let mut parts = Vec::new();
    if let Some(prompt) = usage.prompt_tokens {
        parts.push(format!("prompt={}", prompt));
    }
    if let Some(completion) = usage.completion_tokens {
        parts.push(format!("completion={}", completion));
    }
    if let Some(total) = total {
        parts.push(format!("total={}", total));
    }

    if parts.is_empty() {
        "tokens: unavailable".to_string()
    } else {
        format!("tokens: {}", parts.join(", "))
    }
}

/// One line per translator: id, name, directions, modes.
pub fn tools(config: &Config) -> Result<String> {
    let (_, catalog) = load_environment(config)?;
    Ok(format_tools(&catalog))
}

fn format_tools(catalog: &Catalog) -> String {
    catalog
        .all()
        .map(|tool| {
            let directions = tool
                .directions
                .iter()
                .map(|direction| direction.to_string())
                .collect::<Vec<_>>()
                .join(",");
            format!(
                "{}\t{}\t{}\t{}",
                tool.id,
                tool.name,
                directions,
                tool.mode_names().join(",")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn check(config: &Config) -> Result<String> {
    let (settings, _) = load_environment(config)?;
    let translator = build_translator(config, &settings)?;
    let response = translator.health_check().await?;
    let model = response
        .model
        .unwrap_or_else(|| translator.model_name().to_string());
    Ok(format!("ok\tmodel: {}", model))
}

pub async fn serve(config: &Config, addr: Option<String>) -> Result<()> {
    let (settings, catalog) = load_environment(config)?;
    let translator = build_translator(config, &settings)?;
    let addr = addr.unwrap_or_else(|| settings.server_addr.clone());
    server::run_server(&addr, catalog, translator).await
}
