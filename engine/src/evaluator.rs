//! Scoring of candidate states by value or by vote.

use arbor_providers::LanguageModel;
use arbor_types::{EvaluationStrategy, Score, State, StateScores};
use thiserror::Error;

use crate::EngineError;
use crate::prompts;

/// A value reply that is not a finite number in `[0, 1]`.
///
/// Recovered locally as [`Score::ZERO`]; never returned from evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not read a score from reply {reply:?}: {reason}")]
pub struct ScoreParseFailure {
    reply: String,
    reason: &'static str,
}

impl ScoreParseFailure {
    #[must_use]
    pub fn reply(&self) -> &str {
        &self.reply
    }
}

/// Parse a value-strategy reply.
pub fn parse_value_reply(reply: &str) -> Result<Score, ScoreParseFailure> {
    let trimmed = reply.trim();
    let value = trimmed.parse::<f64>().map_err(|_| ScoreParseFailure {
        reply: reply.to_string(),
        reason: "not a number",
    })?;
    Score::value(value).ok_or_else(|| ScoreParseFailure {
        reply: reply.to_string(),
        reason: "outside [0, 1]",
    })
}

/// Scores candidate states with a model.
#[derive(Debug, Clone)]
pub struct StateEvaluator<M> {
    model: M,
}

impl<M: LanguageModel> StateEvaluator<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Score `states` with `strategy`.
    ///
    /// Empty input returns an empty mapping without calling the model. Every
    /// input state is a key of the result.
    pub async fn evaluate_states(
        &self,
        states: &[State],
        initial_prompt: &str,
        strategy: EvaluationStrategy,
    ) -> Result<StateScores, EngineError> {
        match strategy {
            EvaluationStrategy::Value => {
                let mut scores = StateScores::with_capacity(states.len());
                for state in states {
                    let score = self.value_state(state, initial_prompt).await?;
                    scores.insert(state.clone(), score);
                }
                Ok(scores)
            }
            EvaluationStrategy::Vote => self.vote(states, initial_prompt).await,
        }
    }

    /// [`Self::evaluate_states`] with the strategy given by name.
    ///
    /// An unknown name fails before any model call.
    pub async fn evaluate_states_named(
        &self,
        states: &[State],
        initial_prompt: &str,
        strategy: &str,
    ) -> Result<StateScores, EngineError> {
        let strategy = EvaluationStrategy::parse(strategy)?;
        self.evaluate_states(states, initial_prompt, strategy).await
    }

    /// One blocking scoring call for `state`.
    pub async fn value_state(&self, state: &State, initial_prompt: &str) -> Result<Score, EngineError> {
        let spec = prompts::value_prompt(initial_prompt, state);
        let reply = self.model.generate(&spec).await?;

        match parse_value_reply(&reply) {
            Ok(score) => {
                tracing::info!(score = score.as_f64(), depth = state.depth(), "Evaluated state");
                Ok(score)
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "Scoring state as 0.0");
                Ok(Score::ZERO)
            }
        }
    }

    /// Ask the model to name the best state; it scores 1, the rest 0.
    ///
    /// The reply is compared word for word against each state. The first
    /// match in input order wins; no match leaves every state at 0.
    pub async fn vote(&self, states: &[State], initial_prompt: &str) -> Result<StateScores, EngineError> {
        if states.is_empty() {
            return Ok(StateScores::new());
        }

        let spec = prompts::vote_prompt(initial_prompt, states);
        let reply = self.model.generate(&spec).await?;
        let winner = states.iter().position(|state| state.matches_reply(&reply));

        match winner {
            Some(index) => tracing::info!(index, "Vote selected state"),
            None => tracing::warn!(reply = %reply.trim(), "Vote reply matched no state"),
        }

        let mut scores = StateScores::with_capacity(states.len());
        for (index, state) in states.iter().enumerate() {
            let selected = winner == Some(index);
            // A later duplicate must not overwrite the winner's vote.
            if !selected && scores.contains(state) {
                continue;
            }
            scores.insert(state.clone(), Score::vote(selected));
        }
        Ok(scores)
    }
}
