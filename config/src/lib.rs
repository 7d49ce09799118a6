//! Configuration for Arbor.
//!
//! Settings come from three layers, lowest precedence first:
//!
//! 1. `~/.arbor/config.toml`
//! 2. Environment: `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_RATE_TIMEOUT`
//! 3. Command-line flags (applied by the binary)
//!
//! ```toml
//! [model]
//! name = "OpenAI"
//! id = "gpt-3.5-turbo"
//! api_key = "${OPENAI_API_KEY}"
//! base_url = "https://api.openai.com/v1"
//! stream = true
//! request_timeout_secs = 120
//!
//! [retry]
//! sleep_secs = 10
//! max_attempts = 0
//!
//! [search]
//! strategy = "value"
//! max_steps = 3
//! breadth = 3
//! beam_width = 2
//! pruning_threshold = 0.3
//! value_threshold = 0.9
//! max_workers = 8
//! cache = true
//! ```
//!
//! String values support `${VAR}` expansion.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arbor_providers::retry::{RATE_TIMEOUT_ENV, RetryPolicy, parse_sleep_secs};
use arbor_providers::{API_KEY_ENV, ApiConfig, ApiConfigError, BASE_URL_ENV};
use arbor_types::{ApiKey, EvaluationStrategy, InvalidStrategy, ModelName};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArborConfig {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub search: SearchSection,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    /// Registry name of the model implementation.
    pub name: Option<String>,
    /// Model identifier sent to the endpoint.
    pub id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub stream: Option<bool>,
    pub request_timeout_secs: Option<u64>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ModelSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSection")
            .field("name", &self.name)
            .field("id", &self.id)
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("base_url", &self.base_url)
            .field("stream", &self.stream)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    pub sleep_secs: Option<f64>,
    /// `0` or absent retries forever.
    pub max_attempts: Option<u32>,
}

/// Search tuning. Absent fields fall back to the engine defaults.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchSection {
    pub strategy: Option<String>,
    pub max_steps: Option<usize>,
    pub breadth: Option<usize>,
    pub beam_width: Option<usize>,
    pub pruning_threshold: Option<f64>,
    pub value_threshold: Option<f64>,
    pub max_workers: Option<usize>,
    pub cache: Option<bool>,
}

impl SearchSection {
    /// Parsed evaluation strategy; `None` when not configured.
    pub fn strategy(&self) -> Result<Option<EvaluationStrategy>, ConfigError> {
        self.strategy
            .as_deref()
            .map(EvaluationStrategy::parse)
            .transpose()
            .map_err(ConfigError::from)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    Strategy(#[from] InvalidStrategy),
    #[error(transparent)]
    Api(#[from] ApiConfigError),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Replace `${VAR}` with the variable's value; unset variables become empty.
///
/// An unterminated `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&std::env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".arbor").join("config.toml"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ArborConfig {
    /// Load `~/.arbor/config.toml`; `Ok(None)` when it does not exist.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Registry name of the configured model, defaulting to `OpenAI`.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.name.as_deref().unwrap_or("OpenAI")
    }

    /// Retry policy from the file, with `OPENAI_RATE_TIMEOUT` taking precedence.
    pub fn retry_policy(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<RetryPolicy, ConfigError> {
        let mut policy = RetryPolicy::default();

        if let Some(secs) = self.retry.sleep_secs {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::Invalid {
                    field: "retry.sleep_secs",
                    reason: format!("{secs} is not a non-negative number of seconds"),
                });
            }
            policy = policy.with_sleep(Duration::from_secs_f64(secs));
        }

        if let Some(raw) = env(RATE_TIMEOUT_ENV) {
            match parse_sleep_secs(&raw) {
                Some(sleep) => policy = policy.with_sleep(sleep),
                None => tracing::warn!(value = %raw, "Ignoring unparseable {RATE_TIMEOUT_ENV}"),
            }
        }

        if let Some(max_attempts) = self.retry.max_attempts {
            policy = policy.with_max_attempts(max_attempts);
        }

        Ok(policy)
    }

    /// Resolve the client configuration against `env`.
    ///
    /// Environment values override the file; string values from the file are
    /// `${VAR}`-expanded first.
    pub fn api_config(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ApiConfig, ConfigError> {
        let file_key = non_blank(self.model.api_key.as_deref().map(expand_env_vars));
        let key = non_blank(env(API_KEY_ENV))
            .or(file_key)
            .ok_or(ApiConfigError::MissingApiKey)?;

        let mut config = ApiConfig::new(ApiKey::new(key))?;

        let file_url = non_blank(self.model.base_url.as_deref().map(expand_env_vars));
        if let Some(url) = non_blank(env(BASE_URL_ENV)).or(file_url) {
            config = config.with_base_url(url)?;
        }

        if let Some(id) = self.model.id.as_deref().map(expand_env_vars) {
            let model = ModelName::new(id).map_err(|e| ConfigError::Invalid {
                field: "model.id",
                reason: e.to_string(),
            })?;
            config = config.with_model(model);
        }

        if let Some(stream) = self.model.stream {
            config = config.with_streaming(stream);
        }

        if let Some(secs) = self.model.request_timeout_secs {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    field: "model.request_timeout_secs",
                    reason: "must be greater than zero".to_string(),
                });
            }
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        Ok(config.with_retry(self.retry_policy(&env)?))
    }
}
