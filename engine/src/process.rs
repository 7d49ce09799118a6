//! Orchestration of generation and evaluation, one state at a time or fanned out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use arbor_providers::LanguageModel;
use arbor_types::{EvaluationStrategy, RejectedSolutions, Score, State, StateScores};
use futures_util::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{EngineError, StateEvaluator, ThoughtGenerator};

pub const DEFAULT_MAX_WORKERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOptions {
    pub strategy: EvaluationStrategy,
    /// Upper bound on concurrent model calls in the parallel operations.
    pub max_workers: usize,
    /// Reuse value scores for states with identical text.
    pub cache_enabled: bool,
    /// Append the Observation/Thoughts suffix to generation prompts.
    pub react: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            strategy: EvaluationStrategy::Value,
            max_workers: DEFAULT_MAX_WORKERS,
            cache_enabled: true,
            react: true,
        }
    }
}

/// Value scores keyed by rendered state text.
///
/// Vote scores are relative to their batch and never stored here.
#[derive(Debug, Default)]
pub struct EvaluationCache {
    values: Mutex<HashMap<String, Score>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EvaluationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Score> {
        let found = self.values.lock().await.get(key).copied();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store `score` unless another caller got there first; returns the stored score.
    pub async fn insert(&self, key: String, score: Score) -> Score {
        *self.values.lock().await.entry(key).or_insert(score)
    }

    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.lock().await.is_empty()
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Generation and evaluation bound to one model and one set of options.
///
/// Parallel results align with their inputs: element `i` belongs to
/// `states[i]`, whatever order the underlying calls finish in.
#[derive(Debug)]
pub struct ReasoningProcess<M> {
    model: M,
    options: ProcessOptions,
    cache: EvaluationCache,
}

impl<M: LanguageModel> ReasoningProcess<M> {
    pub fn new(model: M) -> Self {
        Self::with_options(model, ProcessOptions::default())
    }

    pub fn with_options(model: M, options: ProcessOptions) -> Self {
        Self {
            model,
            options,
            cache: EvaluationCache::new(),
        }
    }

    #[must_use]
    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    #[must_use]
    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    pub fn generator(&self) -> ThoughtGenerator<&M> {
        ThoughtGenerator::new(&self.model).with_react(self.options.react)
    }

    pub fn evaluator(&self) -> StateEvaluator<&M> {
        StateEvaluator::new(&self.model)
    }

    fn workers(&self) -> usize {
        self.options.max_workers.max(1)
    }

    pub async fn generate_thoughts(
        &self,
        state: &State,
        initial_prompt: &str,
        k: usize,
        rejected: &RejectedSolutions,
    ) -> Result<Vec<String>, EngineError> {
        self.generator()
            .generate_thoughts(state, initial_prompt, k, rejected)
            .await
    }

    pub async fn generate_solution(
        &self,
        initial_prompt: &str,
        state: &State,
        rejected: &RejectedSolutions,
    ) -> Result<Option<String>, EngineError> {
        self.generator()
            .generate_solution(initial_prompt, state, rejected)
            .await
    }

    /// Score `states` one at a time with the configured strategy.
    pub async fn evaluate_states(
        &self,
        states: &[State],
        initial_prompt: &str,
    ) -> Result<StateScores, EngineError> {
        match self.options.strategy {
            EvaluationStrategy::Vote => self.evaluator().vote(states, initial_prompt).await,
            EvaluationStrategy::Value => {
                let mut scores = StateScores::with_capacity(states.len());
                for state in states {
                    let score = self.value_of(state, initial_prompt).await?;
                    scores.insert(state.clone(), score);
                }
                Ok(scores)
            }
        }
    }

    /// `generate_thoughts` for every state, at most `max_workers` at a time.
    pub async fn parallel_generate_thoughts(
        &self,
        states: &[State],
        initial_prompt: &str,
        k: usize,
        rejected: &RejectedSolutions,
    ) -> Result<Vec<Vec<String>>, EngineError> {
        stream::iter(states)
            .map(|state| self.generate_thoughts(state, initial_prompt, k, rejected))
            .buffered(self.workers())
            .try_collect()
            .await
    }

    /// `evaluate_states` with value scoring fanned out across workers.
    ///
    /// Vote evaluation is a single call over the whole batch, so it runs as is.
    pub async fn parallel_evaluate_states(
        &self,
        states: &[State],
        initial_prompt: &str,
    ) -> Result<StateScores, EngineError> {
        match self.options.strategy {
            EvaluationStrategy::Vote => self.evaluator().vote(states, initial_prompt).await,
            EvaluationStrategy::Value => {
                let scores: Vec<Score> = stream::iter(states)
                    .map(|state| self.value_of(state, initial_prompt))
                    .buffered(self.workers())
                    .try_collect()
                    .await?;
                Ok(states.iter().cloned().zip(scores).collect())
            }
        }
    }

    async fn value_of(&self, state: &State, initial_prompt: &str) -> Result<Score, EngineError> {
        if !self.options.cache_enabled {
            return self.evaluator().value_state(state, initial_prompt).await;
        }

        let key = state.render().into_owned();
        if let Some(score) = self.cache.get(&key).await {
            tracing::debug!(score = score.as_f64(), "Evaluation cache hit");
            return Ok(score);
        }

        let score = self.evaluator().value_state(state, initial_prompt).await?;
        Ok(self.cache.insert(key, score).await)
    }
}
