//! Breadth-first beam search over reasoning states.
//!
//! Each step expands every frontier state into `breadth` thoughts, scores the
//! extended states, moves those under `pruning_threshold` into the rejected
//! ledger and keeps the best `beam_width` as the next frontier. The search ends
//! after `max_steps`, when the frontier empties, or (value strategy only) once a
//! state reaches `value_threshold`. A final answer is then generated from the
//! best state seen.

use arbor_providers::LanguageModel;
use arbor_types::{EvaluationStrategy, RejectedSolutions, State};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ReasoningProcess};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub max_steps: usize,
    /// Thoughts sampled per frontier state.
    pub breadth: usize,
    /// Frontier size carried into the next step.
    pub beam_width: usize,
    /// States scoring below this are rejected.
    pub pruning_threshold: f64,
    /// A value score at or above this ends the search.
    pub value_threshold: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_steps: 3,
            breadth: 3,
            beam_width: 2,
            pruning_threshold: 0.3,
            value_threshold: 0.9,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.breadth == 0 {
            return Err(EngineError::InvalidParams("breadth must be at least 1".into()));
        }
        if self.beam_width == 0 {
            return Err(EngineError::InvalidParams("beam_width must be at least 1".into()));
        }
        for (name, value) in [
            ("pruning_threshold", self.pruning_threshold),
            ("value_threshold", self.value_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidParams(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Per-step bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchStep {
    pub depth: usize,
    pub candidates: usize,
    pub kept: usize,
    pub pruned: usize,
    pub best_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub best_state: State,
    pub best_score: f64,
    pub solution: Option<String>,
    pub rejected: RejectedSolutions,
    pub steps: Vec<SearchStep>,
}

impl<M: LanguageModel> ReasoningProcess<M> {
    pub async fn solve(
        &self,
        initial_prompt: &str,
        params: &SearchParams,
    ) -> Result<SearchOutcome, EngineError> {
        params.validate()?;

        let mut frontier = vec![State::root()];
        let mut rejected = RejectedSolutions::new();
        let mut best: Option<(State, f64)> = None;
        let mut steps = Vec::new();

        for depth in 1..=params.max_steps {
            let thoughts = self
                .parallel_generate_thoughts(&frontier, initial_prompt, params.breadth, &rejected)
                .await?;
            let candidates: Vec<State> = frontier
                .iter()
                .zip(thoughts)
                .flat_map(|(state, thoughts)| {
                    thoughts.into_iter().map(move |thought| state.extend(thought))
                })
                .collect();

            let scores = self
                .parallel_evaluate_states(&candidates, initial_prompt)
                .await?;

            let mut next = Vec::with_capacity(params.beam_width);
            let mut pruned = 0;
            for (state, score) in scores.ranked() {
                if score.as_f64() < params.pruning_threshold {
                    rejected.push(state.clone());
                    pruned += 1;
                } else if next.len() < params.beam_width {
                    next.push(state.clone());
                }
            }

            // Ties go to the newer, deeper state; vote scores tie at 1 every step.
            if let Some((state, score)) = scores.best()
                && best.as_ref().is_none_or(|(_, current)| score.as_f64() >= *current)
            {
                best = Some((state.clone(), score.as_f64()));
            }
            let best_score = best.as_ref().map_or(0.0, |(_, score)| *score);

            tracing::info!(
                depth,
                candidates = scores.len(),
                kept = next.len(),
                pruned,
                best_score,
                "Search step complete"
            );
            steps.push(SearchStep {
                depth,
                candidates: scores.len(),
                kept: next.len(),
                pruned,
                best_score,
            });

            if self.options().strategy == EvaluationStrategy::Value
                && best_score >= params.value_threshold
            {
                tracing::info!(depth, best_score, "Value threshold reached");
                break;
            }
            if next.is_empty() {
                tracing::warn!(depth, "Every candidate was pruned; stopping");
                break;
            }
            frontier = next;
        }

        let (best_state, best_score) = best.unwrap_or_else(|| (State::root(), 0.0));
        let solution = self
            .generate_solution(initial_prompt, &best_state, &rejected)
            .await?;

        Ok(SearchOutcome {
            best_state,
            best_score,
            solution,
            rejected,
            steps,
        })
    }
}
