//! Reasoning states and the rejected-solution ledger.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A chain of reasoning steps accumulated so far.
///
/// States are values: [`State::extend`] returns a new state and never touches
/// the receiver. Equality and hashing go through [`State::render`], so a
/// `Single("a\nb")` and a `Chain(["a", "b"])` are the same state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum State {
    Single(String),
    Chain(Vec<String>),
}

impl State {
    /// The empty starting state of a run.
    #[must_use]
    pub const fn root() -> Self {
        State::Chain(Vec::new())
    }

    /// Render the state as prompt text, one step per line.
    #[must_use]
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            State::Single(text) => Cow::Borrowed(text.as_str()),
            State::Chain(steps) => match steps.as_slice() {
                [only] => Cow::Borrowed(only.as_str()),
                _ => Cow::Owned(steps.join("\n")),
            },
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[String] {
        match self {
            State::Single(text) => std::slice::from_ref(text),
            State::Chain(steps) => steps,
        }
    }

    /// Number of reasoning steps; a `Single` counts as one.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.steps().len()
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.steps().iter().all(|step| step.trim().is_empty())
    }

    /// Build the successor state with `thought` appended as the newest step.
    #[must_use]
    pub fn extend(&self, thought: impl Into<String>) -> Self {
        let mut steps = self.steps().to_vec();
        steps.push(thought.into());
        State::Chain(steps)
    }

    /// Whitespace-separated words across every step.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.steps().iter().flat_map(|step| step.split_whitespace())
    }

    /// Whether a model reply names this state word for word.
    ///
    /// Whitespace differences are ignored; anything else must match exactly.
    #[must_use]
    pub fn matches_reply(&self, reply: &str) -> bool {
        self.tokens().eq(reply.split_whitespace())
    }
}

impl Default for State {
    fn default() -> Self {
        Self::root()
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.render() == other.render()
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.render().hash(state);
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<String> for State {
    fn from(value: String) -> Self {
        State::Single(value)
    }
}

impl From<&str> for State {
    fn from(value: &str) -> Self {
        State::Single(value.to_string())
    }
}

impl From<Vec<String>> for State {
    fn from(value: Vec<String>) -> Self {
        State::Chain(value)
    }
}

/// States that were scored and declined during a run.
///
/// Append-only: the ledger grows as the search prunes branches and is fed
/// back into generation prompts as negative examples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RejectedSolutions(Vec<State>);

impl RejectedSolutions {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, state: State) {
        self.0.push(state);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, state: &State) -> bool {
        self.0.contains(state)
    }

    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.0.iter()
    }

    /// Prompt rendering: a numbered list, or `none` for an empty ledger.
    #[must_use]
    pub fn render(&self) -> String {
        if self.0.is_empty() {
            return "none".to_string();
        }
        self.0
            .iter()
            .enumerate()
            .map(|(i, state)| format!("{}. {}", i + 1, state.render()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Extend<State> for RejectedSolutions {
    fn extend<I: IntoIterator<Item = State>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}
