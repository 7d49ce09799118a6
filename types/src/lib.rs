//! Core domain types for Arbor.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod score;
mod state;

pub use score::{Score, StateScores};
pub use state::{RejectedSolutions, State};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Prompt Types
// ============================================================================

/// Default completion budget for generation prompts.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
/// Default sampling temperature for generation prompts.
pub const DEFAULT_TEMPERATURE: f32 = 0.5;

/// One request to the model: a system/user prompt pair plus sampling limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl PromptSpec {
    #[must_use]
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// A prompt with no system message.
    #[must_use]
    pub fn user(user_prompt: impl Into<String>) -> Self {
        Self::new(String::new(), user_prompt)
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// How a completion is delivered by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompletionMode {
    /// One JSON reply carrying the whole message.
    #[default]
    Blocking,
    /// Server-sent delta fragments accumulated into one message.
    Streaming,
}

impl CompletionMode {
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        matches!(self, CompletionMode::Streaming)
    }
}

// ============================================================================
// Evaluation Strategy
// ============================================================================

/// How candidate states are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStrategy {
    /// Score every state independently as a float in `[0, 1]`.
    #[default]
    Value,
    /// Ask the model to pick the single best state of the batch.
    Vote,
}

const STRATEGY_PARSE_VALUES: &[&str] = &["value", "vote"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid evaluation strategy '{raw}'; expected one of: {expected:?}")]
pub struct InvalidStrategy {
    raw: String,
    expected: &'static [&'static str],
}

impl InvalidStrategy {
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl EvaluationStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EvaluationStrategy::Value => "value",
            EvaluationStrategy::Vote => "vote",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidStrategy> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "value" => Ok(EvaluationStrategy::Value),
            "vote" => Ok(EvaluationStrategy::Vote),
            _ => Err(InvalidStrategy {
                raw: raw.to_string(),
                expected: STRATEGY_PARSE_VALUES,
            }),
        }
    }
}

impl FromStr for EvaluationStrategy {
    type Err = InvalidStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EvaluationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Credentials & Model Identity
// ============================================================================

/// Bearer credential for the completion endpoint.
///
/// Note: `Debug` is manually implemented to redact the key value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Chat model identifier sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelName(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model name must not be empty")]
pub struct EmptyModelName;

impl ModelName {
    pub fn new(name: impl Into<String>) -> Result<Self, EmptyModelName> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(EmptyModelName);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModelName {
    fn default() -> Self {
        Self(DEFAULT_MODEL.to_string())
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
