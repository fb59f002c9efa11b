use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::direction::DirectionOptions;
use crate::providers::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::queue::QueueConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const HOME_DIR_NAME: &str = ".vibetrans";
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_MAX_RETRIES: usize = 5;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_addr: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_max_retries: usize,
    pub queue: QueueConfig,
    pub detection_locale: Option<String>,
    pub detection_warning: Option<String>,
    pub supported_languages: Vec<String>,
    pub catalog_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            gemini_api_key: None,
            gemini_max_retries: DEFAULT_MAX_RETRIES,
            queue: QueueConfig::default(),
            detection_locale: None,
            detection_warning: None,
            supported_languages: Vec::new(),
            catalog_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    gemini: Option<GeminiSettings>,
    queue: Option<QueueSettings>,
    detection: Option<DetectionSettings>,
    catalog: Option<CatalogSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiSettings {
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    max_retries: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct QueueSettings {
    concurrency: Option<usize>,
    retry_attempts: Option<usize>,
    retry_delay_ms: Option<u64>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectionSettings {
    locale: Option<String>,
    warning_message: Option<String>,
    supported_languages: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSettings {
    path: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(server) = incoming.server
            && let Some(addr) = non_empty(server.addr)
        {
            self.server_addr = addr;
        }
        if let Some(gemini) = incoming.gemini {
            if let Some(model) = non_empty(gemini.model) {
                self.gemini_model = model;
            }
            if let Some(base_url) = non_empty(gemini.base_url) {
                self.gemini_base_url = base_url;
            }
            if let Some(key) = non_empty(gemini.api_key) {
                self.gemini_api_key = Some(key);
            }
            if let Some(retries) = gemini.max_retries
                && retries > 0
            {
                self.gemini_max_retries = retries;
            }
        }
        if let Some(queue) = incoming.queue {
            if let Some(concurrency) = queue.concurrency
                && concurrency > 0
            {
                self.queue.concurrency = concurrency;
            }
            if let Some(attempts) = queue.retry_attempts
                && attempts > 0
            {
                self.queue.retry_attempts = attempts;
            }
            if let Some(delay) = queue.retry_delay_ms {
                self.queue.retry_delay = Duration::from_millis(delay);
            }
            if let Some(timeout) = queue.timeout_ms
                && timeout > 0
            {
                self.queue.timeout = Duration::from_millis(timeout);
            }
        }
        if let Some(detection) = incoming.detection {
            if let Some(locale) = non_empty(detection.locale) {
                self.detection_locale = Some(locale);
            }
            if let Some(message) = non_empty(detection.warning_message) {
                self.detection_warning = Some(message);
            }
            if let Some(languages) = detection.supported_languages {
                self.supported_languages = languages
                    .into_iter()
                    .map(|language| language.trim().to_lowercase())
                    .filter(|language| !language.is_empty())
                    .collect();
            }
        }
        if let Some(catalog) = incoming.catalog
            && let Some(path) = non_empty(catalog.path)
        {
            self.catalog_path = Some(expand_home(&path));
        }
    }

    pub fn direction_options(&self) -> DirectionOptions {
        DirectionOptions {
            locale: self.detection_locale.clone(),
            supported_languages: self.supported_languages.clone(),
            warning_message: self.detection_warning.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return Path::new(&home).join(rest);
    }
    PathBuf::from(path)
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(HOME_DIR_NAME))
        }
    })
}
