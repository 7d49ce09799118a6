//! Tree-of-thoughts reasoning engine.
//!
//! - [`ThoughtGenerator`] samples candidate next steps and final answers
//! - [`StateEvaluator`] scores candidates by value or by vote
//! - [`ReasoningProcess`] binds both to one model, adds the evaluation cache,
//!   bounded fan-out and the beam search in [`ReasoningProcess::solve`]
//!
//! The engine only sees the [`LanguageModel`] trait; retries and transport
//! failures are the model's concern.

mod evaluator;
mod generator;
mod process;
pub mod prompts;
mod search;
#[cfg(test)]
mod testing;

pub use arbor_providers::LanguageModel;
pub use evaluator::{ScoreParseFailure, StateEvaluator, parse_value_reply};
pub use generator::{EmptySolution, ThoughtGenerator};
pub use process::{DEFAULT_MAX_WORKERS, EvaluationCache, ProcessOptions, ReasoningProcess};
pub use search::{SearchOutcome, SearchParams, SearchStep};

use arbor_providers::ProviderError;
use arbor_types::InvalidStrategy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    InvalidStrategy(#[from] InvalidStrategy),
    #[error("invalid search parameters: {0}")]
    InvalidParams(String),
}
