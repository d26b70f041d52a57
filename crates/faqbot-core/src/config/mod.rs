//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Provider names accepted in the embedding and generation chains
pub const KNOWN_PROVIDERS: [&str; 2] = ["hosted", "local"];

/// Faqbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Process-wide vector dimensionality
    pub dimension: usize,
    /// Providers tried in order; the deterministic fallback is always appended
    pub providers: Vec<String>,
    pub hosted_model: String,
    /// Optional stop-word file for the in-process model
    pub stopwords_path: Option<PathBuf>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Strategies tried in order; deterministic synthesis is always the terminal fallback
    pub strategies: Vec<String>,
    pub base_url: String,
    pub hosted_model: String,
    pub local_base_url: String,
    pub local_model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Minimum score for synthesis to surface a knowledge answer
    pub min_similarity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_turns: usize,
    pub max_entries: usize,
    /// Character budget for the assembled prompt
    pub max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub disallowed_terms: Vec<String>,
    pub flagged_score: f32,
    pub clean_score: f32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            providers: vec!["hosted".to_string(), "local".to_string()],
            hosted_model: "text-embedding-3-small".to_string(),
            stopwords_path: None,
            timeout_ms: 5_000,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            strategies: vec!["hosted".to_string(), "local".to_string()],
            base_url: "https://api.openai.com/v1".to_string(),
            hosted_model: "gpt-3.5-turbo".to_string(),
            local_base_url: "http://127.0.0.1:11434/v1".to_string(),
            local_model: "dialogpt-medium".to_string(),
            temperature: 0.7,
            max_tokens: 100,
            timeout_ms: 10_000,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: 0.3,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: 5,
            max_entries: 2,
            max_chars: 4_000,
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            disallowed_terms: ["hate", "violence", "abuse", "discrimination", "harassment"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            flagged_score: 0.8,
            clean_score: 0.1,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("FAQBOT_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| redact(&key))
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("FAQBOT_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("faqbot")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or return defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.generation.enforce_env_only()?;

        if self.embedding.dimension == 0 {
            return Err(anyhow!("embedding.dimension must be positive"));
        }
        validate_providers("embedding.providers", &self.embedding.providers)?;
        validate_providers("generation.strategies", &self.generation.strategies)?;
        if !(-1.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(anyhow!("retrieval.min_similarity must be between -1.0 and 1.0"));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        check_millis("embedding.timeout_ms", self.embedding.timeout_ms)?;
        check_millis("generation.timeout_ms", self.generation.timeout_ms)?;
        check_score("moderation.flagged_score", self.moderation.flagged_score)?;
        check_score("moderation.clean_score", self.moderation.clean_score)?;
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "embedding.dimension" => Ok(self.embedding.dimension.to_string()),
            "embedding.providers" => Ok(self.embedding.providers.join(", ")),
            "embedding.hosted_model" => Ok(self.embedding.hosted_model.clone()),
            "embedding.stopwords_path" => Ok(self
                .embedding
                .stopwords_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()),
            "embedding.timeout_ms" => Ok(self.embedding.timeout_ms.to_string()),

            "generation.strategies" => Ok(self.generation.strategies.join(", ")),
            "generation.base_url" => Ok(self.generation.base_url.clone()),
            "generation.hosted_model" => Ok(self.generation.hosted_model.clone()),
            "generation.local_base_url" => Ok(self.generation.local_base_url.clone()),
            "generation.local_model" => Ok(self.generation.local_model.clone()),
            "generation.temperature" => Ok(self.generation.temperature.to_string()),
            "generation.max_tokens" => Ok(self.generation.max_tokens.to_string()),
            "generation.timeout_ms" => Ok(self.generation.timeout_ms.to_string()),

            "retrieval.top_k" => Ok(self.retrieval.top_k.to_string()),
            "retrieval.min_similarity" => Ok(self.retrieval.min_similarity.to_string()),

            "context.max_turns" => Ok(self.context.max_turns.to_string()),
            "context.max_entries" => Ok(self.context.max_entries.to_string()),
            "context.max_chars" => Ok(self.context.max_chars.to_string()),

            "moderation.disallowed_terms" => Ok(self.moderation.disallowed_terms.join(", ")),
            "moderation.flagged_score" => Ok(self.moderation.flagged_score.to_string()),
            "moderation.clean_score" => Ok(self.moderation.clean_score.to_string()),

            "generation.api_key" | "api_key" => match self.generation.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use FAQBOT_API_KEY or OPENAI_API_KEY env var)".to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `faqbot config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "embedding.dimension" => {
                let dimension: usize = value
                    .parse()
                    .with_context(|| format!("Invalid dimension value: {}", value))?;
                if dimension == 0 {
                    return Err(anyhow!("Dimension must be positive"));
                }
                self.embedding.dimension = dimension;
            }
            "embedding.providers" => {
                let providers = parse_list(value);
                validate_providers(key, &providers)?;
                self.embedding.providers = providers;
            }
            "embedding.hosted_model" => self.embedding.hosted_model = value.to_string(),
            "embedding.stopwords_path" => {
                self.embedding.stopwords_path = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "embedding.timeout_ms" => {
                self.embedding.timeout_ms = parse_millis(value)?;
            }

            "generation.strategies" => {
                let strategies = parse_list(value);
                validate_providers(key, &strategies)?;
                self.generation.strategies = strategies;
            }
            "generation.base_url" => self.generation.base_url = value.to_string(),
            "generation.hosted_model" => self.generation.hosted_model = value.to_string(),
            "generation.local_base_url" => self.generation.local_base_url = value.to_string(),
            "generation.local_model" => self.generation.local_model = value.to_string(),
            "generation.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.generation.temperature = temp;
            }
            "generation.max_tokens" => {
                self.generation.max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
            }
            "generation.timeout_ms" => {
                self.generation.timeout_ms = parse_millis(value)?;
            }

            "retrieval.top_k" => {
                self.retrieval.top_k = value
                    .parse()
                    .with_context(|| format!("Invalid top_k value: {}", value))?;
            }
            "retrieval.min_similarity" => {
                let threshold: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid min_similarity value: {}", value))?;
                if !(-1.0..=1.0).contains(&threshold) {
                    return Err(anyhow!("Minimum similarity must be between -1.0 and 1.0"));
                }
                self.retrieval.min_similarity = threshold;
            }

            "context.max_turns" => {
                self.context.max_turns = value
                    .parse()
                    .with_context(|| format!("Invalid max_turns value: {}", value))?;
            }
            "context.max_entries" => {
                self.context.max_entries = value
                    .parse()
                    .with_context(|| format!("Invalid max_entries value: {}", value))?;
            }
            "context.max_chars" => {
                self.context.max_chars = value
                    .parse()
                    .with_context(|| format!("Invalid max_chars value: {}", value))?;
            }

            "moderation.disallowed_terms" => {
                self.moderation.disallowed_terms = parse_list(value);
            }
            "moderation.flagged_score" => {
                self.moderation.flagged_score = parse_score(value)?;
            }
            "moderation.clean_score" => {
                self.moderation.clean_score = parse_score(value)?;
            }

            "generation.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the FAQBOT_API_KEY or OPENAI_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `faqbot config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "embedding.dimension",
            "embedding.providers",
            "embedding.hosted_model",
            "embedding.stopwords_path",
            "embedding.timeout_ms",
            "generation.strategies",
            "generation.base_url",
            "generation.hosted_model",
            "generation.local_base_url",
            "generation.local_model",
            "generation.temperature",
            "generation.max_tokens",
            "generation.timeout_ms",
            "generation.api_key",
            "retrieval.top_k",
            "retrieval.min_similarity",
            "context.max_turns",
            "context.max_entries",
            "context.max_chars",
            "moderation.disallowed_terms",
            "moderation.flagged_score",
            "moderation.clean_score",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_millis(value: &str) -> anyhow::Result<u64> {
    let millis: u64 = value
        .parse()
        .with_context(|| format!("Invalid timeout value: {}", value))?;
    check_millis("Timeout", millis)?;
    Ok(millis)
}

fn parse_score(value: &str) -> anyhow::Result<f32> {
    let score: f32 = value
        .parse()
        .with_context(|| format!("Invalid score value: {}", value))?;
    check_score("Score", score)?;
    Ok(score)
}

fn check_millis(key: &str, millis: u64) -> anyhow::Result<()> {
    if millis == 0 {
        return Err(anyhow!("{} must be positive", key));
    }
    Ok(())
}

fn check_score(key: &str, score: f32) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&score) {
        return Err(anyhow!("{} must be between 0.0 and 1.0", key));
    }
    Ok(())
}

/// Mask all but the last four characters of a key
fn redact(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        return "***".to_string();
    }
    let suffix: String = key.chars().skip(len - 4).collect();
    format!("***{}", suffix)
}

fn validate_providers(key: &str, providers: &[String]) -> anyhow::Result<()> {
    if let Some(unknown) = providers
        .iter()
        .find(|p| !KNOWN_PROVIDERS.contains(&p.as_str()))
    {
        return Err(anyhow!(
            "Invalid provider in {}: {}. Valid options: {}",
            key,
            unknown,
            KNOWN_PROVIDERS.join(", ")
        ));
    }
    Ok(())
}
