//! Name-to-constructor lookup for language models.
//!
//! The registry holds constructors, not instances: a model is built on each
//! [`ModelRegistry::build`] call from the caller's [`ApiConfig`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::{ApiConfig, ApiConfigError, ModelClient};

/// Builds a model from shared configuration.
pub type ModelConstructor<M> = Box<dyn Fn(&ApiConfig) -> Result<M, ApiConfigError> + Send + Sync>;

/// Name under which [`ModelClient`] is registered by default.
pub const OPENAI_MODEL: &str = "OpenAI";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown model '{name}'; registered: {known:?}")]
    UnknownModel { name: String, known: Vec<String> },
    #[error(transparent)]
    Config(#[from] ApiConfigError),
}

pub struct ModelRegistry<M = ModelClient> {
    constructors: BTreeMap<String, ModelConstructor<M>>,
}

impl<M> fmt::Debug for ModelRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<M> ModelRegistry<M> {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&ApiConfig) -> Result<M, ApiConfigError> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn build(&self, name: &str, config: &ApiConfig) -> Result<M, RegistryError> {
        let Some(constructor) = self.constructors.get(name) else {
            return Err(RegistryError::UnknownModel {
                name: name.to_string(),
                known: self.constructors.keys().cloned().collect(),
            });
        };
        tracing::debug!(model = name, "Constructing model");
        Ok(constructor(config)?)
    }
}

impl Default for ModelRegistry<ModelClient> {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(OPENAI_MODEL, |config| ModelClient::new(config.clone()));
        registry
    }
}
