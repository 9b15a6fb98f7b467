//! Configuration management for SmartGPT
//!
//! Loaded once at startup and passed by reference into each component.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::openai::DEFAULT_API_BASE;
use crate::llm::{ModelBudget, SamplingParams, TruncationPolicy};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// SmartGPT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model identifier sent to the endpoint and used to pick the tokenizer
    pub model: String,
    /// Response cap per request
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Stop sequence(s); a single string is accepted too
    #[serde(deserialize_with = "one_or_many")]
    pub stop: Vec<String>,
    /// Model context size
    pub token_limit: usize,
    /// Safety margin kept free in every request
    pub buffer_tokens: usize,
    /// API credential, overridden by `OPENAI_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_key: Option<String>,
    /// Base URL of an OpenAI-compatible endpoint
    pub api_base: String,
    /// Persona the conversation starts (and restarts) with
    pub system_prompt: String,
    /// How to shrink the history when over budget
    pub truncation: TruncationPolicy,
    /// Bound on each completion call; unset blocks until the endpoint answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// HuggingFace tokenizer.json for models tiktoken does not cover
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_file: Option<PathBuf>,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
    /// Where run transcripts are written (defaults to ~/.smartgpt/runs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs_dir: Option<PathBuf>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: Vec::new(),
            token_limit: 4096,
            buffer_tokens: 100,
            openai_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            truncation: TruncationPolicy::default(),
            request_timeout_secs: None,
            tokenizer_file: None,
            log_level: "info".to_string(),
            runs_dir: None,
        }
    }
}

impl Config {
    /// Get the config file path (~/.smartgpt/config.toml)
    pub fn path() -> Result<PathBuf> {
        Ok(smartgpt_dir()?.join("config.toml"))
    }

    /// Load config from the default path, or return None if it doesn't exist
    pub fn load() -> Result<Option<Self>> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Save config to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Apply environment overrides
    pub fn with_env(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.openai_key = Some(key);
            }
        }
        self
    }

    /// Reject settings the endpoint or the budget cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            bail!("model must not be empty");
        }
        if self.max_tokens == 0 {
            bail!("max_tokens must be greater than 0");
        }
        if self.budget().available() == 0 {
            bail!(
                "token_limit ({}) leaves no room for history after \
                 buffer_tokens ({}) and max_tokens ({})",
                self.token_limit,
                self.buffer_tokens,
                self.max_tokens
            );
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!("temperature must be within [0, 2], got {}", self.temperature);
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            bail!("top_p must be within [0, 1], got {}", self.top_p);
        }
        for (name, value) in [
            ("frequency_penalty", self.frequency_penalty),
            ("presence_penalty", self.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                bail!("{} must be within [-2, 2], got {}", name, value);
            }
        }
        Ok(())
    }

    /// The API credential, required for remote calls
    pub fn api_key(&self) -> Result<&str> {
        self.openai_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .with_context(|| format!("No API key: set openai_key in config or {}", API_KEY_ENV))
    }

    pub fn budget(&self) -> ModelBudget {
        ModelBudget::new(self.token_limit, self.buffer_tokens, self.max_tokens)
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            stop: self.stop.clone(),
            max_tokens: self.max_tokens,
        }
    }

    /// Transcript directory (configured, or ~/.smartgpt/runs)
    pub fn runs_dir(&self) -> Result<PathBuf> {
        match &self.runs_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(smartgpt_dir()?.join("runs")),
        }
    }

    /// Copy safe to print: the credential is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.openai_key = copy.openai_key.map(|k| {
            let mut start = k.len().saturating_sub(4);
            while !k.is_char_boundary(start) {
                start -= 1;
            }
            format!("****{}", &k[start..])
        });
        copy
    }
}

/// Get the base smartgpt directory path (~/.smartgpt)
pub fn smartgpt_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".smartgpt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.truncation, TruncationPolicy::Window);
        assert!(config.validate().is_ok());
        assert_eq!(config.budget().available(), 4096 - 100 - 1000);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.stop = vec!["###".into()];
        config.truncation = TruncationPolicy::Summarize;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.stop, config.stop);
        assert_eq!(parsed.truncation, TruncationPolicy::Summarize);
        assert_eq!(parsed.token_limit, config.token_limit);
    }

    #[test]
    fn test_partial_file_with_single_stop() {
        let parsed: Config = toml::from_str(
            r#"
            model = "gpt-4"
            stop = "END"
            token_limit = 8192
            truncation = "summarize"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.model, "gpt-4");
        assert_eq!(parsed.stop, vec!["END".to_string()]);
        assert_eq!(parsed.max_tokens, 1000);
        assert_eq!(parsed.truncation, TruncationPolicy::Summarize);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.token_limit = 1000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.presence_penalty = -2.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sampling_mirrors_config() {
        let mut config = Config::default();
        config.temperature = 0.1;
        config.stop = vec!["\n\n".into()];

        let params = config.sampling();
        assert_eq!(params.model, config.model);
        assert_eq!(params.temperature, 0.1);
        assert_eq!(params.stop, config.stop);
        assert_eq!(params.max_tokens, config.max_tokens);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.model = "gpt-4".into();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.model, "gpt-4");
    }

    #[test]
    fn test_api_key_and_redaction() {
        let mut config = Config::default();
        assert!(config.api_key().is_err());

        config.openai_key = Some("sk-abcdef123456".into());
        assert_eq!(config.api_key().unwrap(), "sk-abcdef123456");
        assert_eq!(config.redacted().openai_key.as_deref(), Some("****3456"));

        config.openai_key = Some("abc".into());
        assert_eq!(config.redacted().openai_key.as_deref(), Some("****abc"));

        // Never splits a multi-byte character
        config.openai_key = Some("sk-ключ€".into());
        assert_eq!(config.redacted().openai_key.as_deref(), Some("****ч€"));
    }
}
