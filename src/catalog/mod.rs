use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::direction::{Direction, ENGLISH_CODE};

include!(concat!(env!("OUT_DIR"), "/embedded_translators.rs"));

const ROUTE_SUFFIX: &str = "-translator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslatorKind {
    Ai,
    Cipher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherKind {
    AlBhed,
    Runic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostProcess {
    CollapseWhitespace,
}

impl PostProcess {
    pub fn apply(&self, text: &str) -> String {
        match self {
            PostProcess::CollapseWhitespace => {
                text.split_whitespace().collect::<Vec<_>>().join(" ")
            }
        }
    }
}

/// One prompt variant of a translator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeConfig {
    pub label: Option<String>,
    pub prompt: Option<String>,
    pub to_english_prompt: Option<String>,
    pub from_english_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
}

impl ModeConfig {
    pub fn has_directional_prompts(&self) -> bool {
        self.to_english_prompt.is_some() && self.from_english_prompt.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultimodalConfig {
    #[serde(default)]
    pub supports_image: bool,
    #[serde(default)]
    pub supports_audio: bool,
    pub image_prompt: Option<String>,
    pub audio_prompt: Option<String>,
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub id: String,
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: TranslatorKind,
    pub cipher: Option<CipherKind>,
    #[serde(default)]
    pub bidirectional: bool,
    pub language_code: String,
    pub language_name: String,
    pub detection_profile: Option<String>,
    #[serde(default)]
    pub language_detection: bool,
    pub directions: Vec<Direction>,
    pub default_direction: Direction,
    /// Legacy direction names accepted from older clients, e.g. `toAramaic`.
    #[serde(default)]
    pub aliases: BTreeMap<String, Direction>,
    /// Extra route names that resolve to this translator.
    #[serde(default)]
    pub slugs: Vec<String>,
    pub default_mode: String,
    #[serde(default)]
    pub modes: BTreeMap<String, ModeConfig>,
    pub multimodal: Option<MultimodalConfig>,
    pub post_process: Option<PostProcess>,
    #[serde(default = "default_credit_cost")]
    pub credit_cost: u32,
}

fn default_kind() -> TranslatorKind {
    TranslatorKind::Ai
}

fn default_credit_cost() -> u32 {
    1
}

impl TranslatorConfig {
    pub fn detection_key(&self) -> &str {
        self.detection_profile.as_deref().unwrap_or("")
    }

    pub fn mode(&self, name: &str) -> Option<&ModeConfig> {
        self.modes.get(name)
    }

    pub fn mode_names(&self) -> Vec<String> {
        self.modes.keys().cloned().collect()
    }

    /// Human label for a language code used in this translator's directions.
    pub fn language_label(&self, code: &str) -> String {
        if code == ENGLISH_CODE {
            "English".to_string()
        } else if code == self.language_code {
            self.language_name.clone()
        } else {
            "Unknown".to_string()
        }
    }

    /// Accepts `src-to-dst` or one of the legacy aliases.
    pub fn resolve_direction(&self, raw: &str) -> Option<Direction> {
        let raw = raw.trim();
        if let Some((_, direction)) = self
            .aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(raw))
        {
            return Some(direction.clone());
        }
        raw.parse::<Direction>()
            .ok()
            .filter(|direction| self.directions.contains(direction))
    }

    pub fn supports_detection(&self) -> bool {
        self.language_detection && self.bidirectional
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(anyhow!("translator id is empty"));
        }
        if self.directions.is_empty() {
            return Err(anyhow!("translator {} has no directions", self.id));
        }
        if !self.directions.contains(&self.default_direction) {
            return Err(anyhow!(
                "translator {}: default direction {} is not listed",
                self.id,
                self.default_direction
            ));
        }
        if self.bidirectional && self.directions.len() < 2 {
            return Err(anyhow!(
                "translator {} is bidirectional but lists one direction",
                self.id
            ));
        }
        if !self.modes.contains_key(&self.default_mode) {
            return Err(anyhow!(
                "translator {}: default mode {} is not defined",
                self.id,
                self.default_mode
            ));
        }
        for (alias, direction) in &self.aliases {
            if !self.directions.contains(direction) {
                return Err(anyhow!(
                    "translator {}: alias {} points at unlisted direction {}",
                    self.id,
                    alias,
                    direction
                ));
            }
        }
        if self.kind == TranslatorKind::Cipher && self.cipher.is_none() {
            return Err(anyhow!("translator {} is a cipher without a cipher kind", self.id));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    translators: Vec<TranslatorConfig>,
}

/// Registry of translator tools keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    translators: BTreeMap<String, TranslatorConfig>,
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        let mut catalog = Catalog::default();
        for (name, raw) in embedded_translators() {
            let config: TranslatorConfig = toml::from_str(raw)
                .with_context(|| format!("failed to parse embedded translator: {}", name))?;
            catalog
                .add(config)
                .with_context(|| format!("invalid embedded translator: {}", name))?;
        }
        Ok(catalog)
    }

    /// Built-in translators plus those in `extra`, which win on id clashes.
    pub fn load(extra: Option<&Path>) -> Result<Self> {
        let mut catalog = Self::builtin()?;
        if let Some(path) = extra {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read catalog: {}", path.display()))?;
            catalog
                .merge_toml(&content)
                .with_context(|| format!("failed to load catalog: {}", path.display()))?;
        }
        Ok(catalog)
    }

    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: CatalogFile = toml::from_str(content)?;
        for config in parsed.translators {
            self.add(config)?;
        }
        Ok(())
    }

    pub fn add(&mut self, config: TranslatorConfig) -> Result<()> {
        config.validate()?;
        if self.translators.contains_key(&config.id) {
            warn!("translator {} is already registered; overwriting", config.id);
        } else {
            debug!("registered translator {}", config.id);
        }
        self.translators.insert(config.id.clone(), config);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.translators.remove(id).is_some()
    }

    /// Resolves an id, a registered slug, or an id with/without the
    /// `-translator` suffix.
    pub fn get(&self, name: &str) -> Option<&TranslatorConfig> {
        let name = name.trim().trim_matches('/');
        if let Some(config) = self.translators.get(name) {
            return Some(config);
        }
        if let Some(config) = self
            .translators
            .values()
            .find(|config| config.slugs.iter().any(|slug| slug == name))
        {
            return Some(config);
        }
        let alternate = match name.strip_suffix(ROUTE_SUFFIX) {
            Some(stripped) => stripped.to_string(),
            None => format!("{}{}", name, ROUTE_SUFFIX),
        };
        self.translators.get(&alternate)
    }

    pub fn all(&self) -> impl Iterator<Item = &TranslatorConfig> {
        self.translators.values()
    }

    pub fn len(&self) -> usize {
        self.translators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRA: &str = r#"
[[translators]]
id = "klingon-translator"
name = "Klingon Translator"
language_code = "tlh"
language_name = "Klingon"
bidirectional = true
directions = ["tlh-to-en", "en-to-tlh"]
default_direction = "en-to-tlh"
default_mode = "general"

[translators.modes.general]
prompt = "Translate between Klingon and English."
"#;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.len() >= 10);
        for config in catalog.all() {
            config.validate().unwrap();
        }
    }

    #[test]
    fn resolves_ids_and_slugs() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(
            catalog.get("chinese-to-english-translator").unwrap().id,
            "chinese-english-translator"
        );
        assert_eq!(catalog.get("aramaic").unwrap().id, "aramaic-translator");
        assert_eq!(catalog.get("/aramaic-translator/").unwrap().id, "aramaic-translator");
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn resolves_legacy_direction_aliases() {
        let catalog = Catalog::builtin().unwrap();
        let aramaic = catalog.get("aramaic-translator").unwrap();
        assert_eq!(aramaic.resolve_direction("toAramaic").unwrap().to_string(), "en-to-arc");
        assert_eq!(aramaic.resolve_direction("arc-to-en").unwrap().to_string(), "arc-to-en");
        assert!(aramaic.resolve_direction("zh-to-en").is_none());
        assert_eq!(aramaic.resolve_direction("TOENGLISH").unwrap().to_string(), "arc-to-en");
        assert_eq!(aramaic.resolve_direction(" ARC-TO-EN ").unwrap().to_string(), "arc-to-en");
    }

    #[test]
    fn merge_add_and_remove() {
        let mut catalog = Catalog::builtin().unwrap();
        let before = catalog.len();
        catalog.merge_toml(EXTRA).unwrap();
        assert_eq!(catalog.len(), before + 1);
        let klingon = catalog.get("klingon").unwrap();
        assert_eq!(klingon.language_label("tlh"), "Klingon");
        assert_eq!(klingon.language_label("en"), "English");
        assert_eq!(klingon.credit_cost, 1);
        assert!(catalog.remove("klingon-translator"));
        assert!(!catalog.remove("klingon-translator"));
    }

    #[test]
    fn rejects_inconsistent_config() {
        let mut catalog = Catalog::default();
        let broken = EXTRA.replace("default_direction = \"en-to-tlh\"", "default_direction = \"en-to-fr\"");
        assert!(catalog.merge_toml(&broken).is_err());
        let broken = EXTRA.replace("default_mode = \"general\"", "default_mode = \"poetic\"");
        assert!(catalog.merge_toml(&broken).is_err());
    }

    #[test]
    fn collapse_whitespace_post_process() {
        assert_eq!(
            PostProcess::CollapseWhitespace.apply("  こんにちは \n  world  "),
            "こんにちは world"
        );
    }
}
