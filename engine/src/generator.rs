//! Sampling of candidate next steps and final answers.

use arbor_providers::LanguageModel;
use arbor_types::{RejectedSolutions, State};
use thiserror::Error;

use crate::EngineError;
use crate::prompts;

/// The model produced a blank final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("model returned an empty solution")]
pub struct EmptySolution;

/// Samples candidate next steps and final answers from a model.
#[derive(Debug, Clone)]
pub struct ThoughtGenerator<M> {
    model: M,
    react: bool,
}

impl<M: LanguageModel> ThoughtGenerator<M> {
    /// A generator with the ReAct suffix enabled.
    pub fn new(model: M) -> Self {
        Self { model, react: true }
    }

    #[must_use]
    pub fn with_react(mut self, enabled: bool) -> Self {
        self.react = enabled;
        self
    }

    /// Draw `k` independent continuations of `state`.
    ///
    /// Always returns exactly `k` thoughts; `k == 0` makes no model call.
    pub async fn generate_thoughts(
        &self,
        state: &State,
        initial_prompt: &str,
        k: usize,
        rejected: &RejectedSolutions,
    ) -> Result<Vec<String>, EngineError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let spec = prompts::thought_prompt(initial_prompt, state, rejected, self.react);
        let mut thoughts = Vec::with_capacity(k);
        for sample in 0..k {
            let thought = self.model.generate_streaming(&spec).await?;
            tracing::debug!(sample, depth = state.depth(), chars = thought.len(), "Generated thought");
            thoughts.push(thought);
        }
        Ok(thoughts)
    }

    /// Ask for a final answer built on `state`.
    ///
    /// A blank reply yields `Ok(None)` and is logged as [`EmptySolution`].
    pub async fn generate_solution(
        &self,
        initial_prompt: &str,
        state: &State,
        rejected: &RejectedSolutions,
    ) -> Result<Option<String>, EngineError> {
        let spec = prompts::solution_prompt(initial_prompt, state, rejected);
        let answer = self.model.generate_streaming(&spec).await?;

        if answer.trim().is_empty() {
            tracing::error!(error = %EmptySolution, depth = state.depth(), "No solution generated");
            return Ok(None);
        }

        tracing::info!(chars = answer.len(), "Generated solution");
        Ok(Some(answer))
    }
}
