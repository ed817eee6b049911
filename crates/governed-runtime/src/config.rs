//! Runtime configuration for council runs.
//!
//! Loaded from YAML; every field has a default, so an empty file is valid.
//! Durations are written the human way (`"45s"`, `"2m 30s"`).
//!
//! ```yaml
//! reviewer_timeout: 45s
//! council_timeout: 3m
//! model: claude-sonnet-4-5-20250514
//! retry:
//!   max_attempts: 2
//! budget:
//!   global_max_tokens: 40000
//! cache:
//!   enabled: true
//!   ttl: 1h
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::providers::{CompletionConfig, DEFAULT_MODEL};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Ceiling for a single reviewer call, retries included.
    #[serde(with = "human_duration")]
    pub reviewer_timeout: Duration,

    /// Ceiling for the whole council; slots still open become rejects.
    #[serde(with = "human_duration_opt")]
    pub council_timeout: Option<Duration>,

    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub retry: RetryConfig,
    pub budget: BudgetConfig,
    pub cache: CacheConfig,

    /// Replaces the default reviewer instruction in every prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_instruction: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reviewer_timeout: Duration::from_secs(60),
            council_timeout: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 600,
            temperature: 0.0,
            retry: RetryConfig::default(),
            budget: BudgetConfig::default(),
            cache: CacheConfig::default(),
            reviewer_instruction: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_attempts: usize,
    #[serde(with = "human_duration")]
    pub min_delay: Duration,
    #[serde(with = "human_duration")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub global_max_tokens: u32,
    pub per_call_max_tokens: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            global_max_tokens: 50_000,
            per_call_max_tokens: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    #[serde(with = "human_duration")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as null, not as an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reviewer_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "reviewer_timeout must be positive".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
        }
        if self.retry.min_delay > self.retry.max_delay {
            return Err(ConfigError::Invalid(
                "retry.min_delay exceeds retry.max_delay".to_string(),
            ));
        }
        Ok(())
    }

    /// Completion settings for one reviewer call.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.reviewer_timeout,
        }
    }
}

mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

mod human_duration_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| humantime::parse_duration(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}
