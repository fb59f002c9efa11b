use anyhow::{Result, anyhow};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

use crate::catalog::ModeConfig;
use crate::data::MediaAttachment;

mod gemini;
mod retry;

pub use gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, Gemini};
pub use retry::RetryPolicy;

/// Checked in order when no key is passed explicitly.
pub const KEY_ENV_VARS: &[&str] = &[
    "GOOGLE_GENERATIVE_AI_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
];

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TOP_P: f64 = 0.8;
const DEFAULT_TOP_K: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl GenerationConfig {
    pub fn from_mode(mode: &ModeConfig) -> Self {
        let defaults = Self::default();
        Self {
            temperature: mode.temperature.unwrap_or(defaults.temperature),
            max_output_tokens: mode.max_tokens.unwrap_or(defaults.max_output_tokens),
            top_p: mode.top_p.unwrap_or(defaults.top_p),
            top_k: mode.top_k.unwrap_or(defaults.top_k),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderResponse {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

#[derive(Debug, Clone, Copy)]
pub enum MessageRole {
    System,
    User,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone)]
pub enum MessagePart {
    Text(String),
    Data(MediaAttachment),
}

impl Message {
    pub fn system(content: String) -> Self {
        Self {
            role: MessageRole::System,
            parts: vec![MessagePart::Text(content)],
        }
    }

    pub fn user(content: String) -> Self {
        Self {
            role: MessageRole::User,
            parts: vec![MessagePart::Text(content)],
        }
    }

    pub fn user_data(data: MediaAttachment) -> Self {
        Self {
            role: MessageRole::User,
            parts: vec![MessagePart::Data(data)],
        }
    }
}

pub type ProviderFuture = Pin<Box<dyn Future<Output = Result<ProviderResponse>> + Send>>;

/// A text-generation backend, configured by chaining and consumed by
/// [`Provider::generate`].
pub trait Provider: Clone + Send + Sync + 'static {
    fn append_system_input(self, input: String) -> Self;
    fn append_user_input(self, input: String) -> Self;
    fn append_user_data(self, data: MediaAttachment) -> Self;
    fn with_generation(self, config: GenerationConfig) -> Self;
    fn model_name(&self) -> &str;
    fn generate(self) -> ProviderFuture;
}

pub fn resolve_key(override_key: Option<&str>) -> Result<String> {
    if let Some(key) = override_key.filter(|key| !key.trim().is_empty()) {
        return Ok(key.trim().to_string());
    }
    KEY_ENV_VARS
        .iter()
        .find_map(|name| get_env(name))
        .ok_or_else(|| anyhow!("no API key found (checked {})", KEY_ENV_VARS.join(", ")))
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
