use crate::defaults;
use crate::engine::{EngineProfile, EngineRegistry, Task};
use crate::error::{Result, SmartsumError};
use crate::pipeline::PipelineConfig;
use crate::summarize::SummaryOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub engine: EngineConfig,
    pub translate: TranslateConfig,
    pub summarize: SummarizeConfig,
}

/// Record database location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// Speech engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding `ggml-<model>.bin` files
    pub models_dir: PathBuf,
    /// Model for anything without a more specific entry
    pub default_model: String,
    /// Model for speech translation, when it should differ from `default_model`
    pub translate_model: Option<String>,
    /// Transcription model per language code
    pub languages: BTreeMap<String, String>,
    pub beam_size: u32,
    pub threads: Option<usize>,
    /// Upper bound on one engine run, e.g. "90m". "none" disables it.
    pub timeout: String,
    pub segment_buffer: usize,
}

/// Text translation server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslateConfig {
    /// LibreTranslate base URL
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Where `fetch-langs` stores downloaded `.argosmodel` archives
    pub packages_dir: PathBuf,
    /// Argos Translate `packages/` directory the archives are unpacked into
    pub install_dir: PathBuf,
    pub index_url: String,
}

/// Summarization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummarizeConfig {
    /// Ollama base URL
    pub url: String,
    pub model: String,
    pub multilingual_model: String,
    /// Languages routed to `multilingual_model`
    pub multilingual_languages: Vec<String>,
    pub max_words: usize,
    pub min_words: usize,
    pub general_max_input_words: usize,
    pub multilingual_max_input_words: usize,
    pub timeout_secs: u64,
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("smartsum")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("smartsum.db"),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("smartsum")
                .join("models"),
            default_model: defaults::DEFAULT_MODEL.to_string(),
            translate_model: None,
            languages: BTreeMap::from([(
                defaults::HEBREW_LANGUAGE.to_string(),
                defaults::HEBREW_MODEL.to_string(),
            )]),
            beam_size: defaults::BEAM_SIZE,
            threads: None,
            timeout: humantime::format_duration(Duration::from_secs(
                defaults::ENGINE_TIMEOUT_SECS,
            ))
            .to_string(),
            segment_buffer: defaults::SEGMENT_BUFFER,
        }
    }
}

fn argos_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("argos-translate")
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            url: defaults::TRANSLATE_URL.to_string(),
            api_key: None,
            timeout_secs: 120,
            packages_dir: argos_dir().join("downloads"),
            install_dir: argos_dir().join("packages"),
            index_url: defaults::ARGOS_INDEX_URL.to_string(),
        }
    }
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            url: defaults::OLLAMA_URL.to_string(),
            model: defaults::OLLAMA_MODEL.to_string(),
            multilingual_model: defaults::OLLAMA_MULTILINGUAL_MODEL.to_string(),
            multilingual_languages: vec![
                defaults::HEBREW_LANGUAGE.to_string(),
                defaults::FARSI_LANGUAGE.to_string(),
            ],
            max_words: defaults::SUMMARY_MAX_WORDS,
            min_words: defaults::SUMMARY_MIN_WORDS,
            general_max_input_words: defaults::GENERAL_MAX_INPUT_WORDS,
            multilingual_max_input_words: defaults::MULTILINGUAL_MAX_INPUT_WORDS,
            timeout_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Parsed run timeout; `None` when disabled.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        parse_timeout(&self.timeout)
    }

    /// Capability registry built from the configured models.
    pub fn registry(&self) -> EngineRegistry {
        let mut registry = EngineRegistry::new();
        registry.register_default(EngineProfile::new("general", &self.default_model));
        if let Some(model) = &self.translate_model {
            registry.register(None, Some(Task::Translate), EngineProfile::new("translate", model));
        }
        for (language, model) in &self.languages {
            registry.register(
                Some(language),
                Some(Task::Transcribe),
                EngineProfile::new(language, model),
            );
        }
        registry
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            beam_size: self.beam_size,
            engine_timeout: self.timeout()?,
            segment_buffer: self.segment_buffer,
        })
    }
}

impl SummarizeConfig {
    pub fn options(&self) -> SummaryOptions {
        SummaryOptions {
            max_words: self.max_words,
            min_words: self.min_words,
            language: None,
        }
    }
}

/// Parse a human duration such as "45m" or "1h 30m". "none", "off" and "0"
/// mean no limit.
pub fn parse_timeout(value: &str) -> Result<Option<Duration>> {
    let value = value.trim();
    if matches!(value.to_lowercase().as_str(), "" | "none" | "off" | "0") {
        return Ok(None);
    }
    humantime::parse_duration(value)
        .map(Some)
        .map_err(|e| SmartsumError::ConfigInvalidValue {
            key: "engine.timeout".to_string(),
            message: format!("'{}': {}", value, e),
        })
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false) =>
            {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SMARTSUM_DB → store.path
    /// - SMARTSUM_MODELS_DIR → engine.models_dir
    /// - SMARTSUM_ENGINE_TIMEOUT → engine.timeout
    /// - SMARTSUM_TRANSLATE_URL → translate.url
    /// - SMARTSUM_OLLAMA_URL → summarize.url
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("SMARTSUM_DB")
            && !path.is_empty()
        {
            self.store.path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("SMARTSUM_MODELS_DIR")
            && !dir.is_empty()
        {
            self.engine.models_dir = PathBuf::from(dir);
        }

        if let Ok(timeout) = std::env::var("SMARTSUM_ENGINE_TIMEOUT")
            && !timeout.is_empty()
        {
            self.engine.timeout = timeout;
        }

        if let Ok(url) = std::env::var("SMARTSUM_TRANSLATE_URL")
            && !url.is_empty()
        {
            self.translate.url = url;
        }

        if let Ok(url) = std::env::var("SMARTSUM_OLLAMA_URL")
            && !url.is_empty()
        {
            self.summarize.url = url;
        }

        self
    }

    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        self.engine.timeout()?;
        if self.engine.beam_size == 0 {
            return Err(SmartsumError::ConfigInvalidValue {
                key: "engine.beam_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.summarize.min_words > self.summarize.max_words {
            return Err(SmartsumError::ConfigInvalidValue {
                key: "summarize.min_words".to_string(),
                message: format!(
                    "{} exceeds summarize.max_words ({})",
                    self.summarize.min_words, self.summarize.max_words
                ),
            });
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SmartsumError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/smartsum/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("smartsum")
            .join("config.toml")
    }
}
