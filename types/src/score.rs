//! Evaluation scores keyed by state.

use serde::{Deserialize, Serialize};

use crate::State;

/// Score assigned to a state by one evaluation strategy.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "kind", content = "score", rename_all = "snake_case")]
pub enum Score {
    /// Independent value in `[0, 1]`.
    Value(f64),
    /// Batch vote: `1` for the selected state, `0` otherwise.
    Vote(u8),
}

impl Score {
    /// The fail-soft score for a reply that could not be parsed.
    pub const ZERO: Score = Score::Value(0.0);

    /// A value score, or `None` when `value` is not a finite number in `[0, 1]`.
    #[must_use]
    pub fn value(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Score::Value(value))
    }

    #[must_use]
    pub const fn vote(selected: bool) -> Self {
        Score::Vote(if selected { 1 } else { 0 })
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Score::Value(value) => value,
            Score::Vote(vote) => f64::from(vote),
        }
    }
}

/// Mapping from state to score that keeps insertion order.
///
/// Inserting a state that is already present replaces its score in place,
/// so each state appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateScores {
    entries: Vec<(State, Score)>,
}

impl StateScores {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace; returns the previous score for `state`.
    pub fn insert(&mut self, state: State, score: Score) -> Option<Score> {
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| *existing == state) {
            return Some(std::mem::replace(&mut slot.1, score));
        }
        self.entries.push((state, score));
        None
    }

    #[must_use]
    pub fn get(&self, state: &State) -> Option<Score> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == state)
            .map(|(_, score)| *score)
    }

    #[must_use]
    pub fn contains(&self, state: &State) -> bool {
        self.get(state).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&State, Score)> {
        self.entries.iter().map(|(state, score)| (state, *score))
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.entries.iter().map(|(state, _)| state)
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, score)| score.as_f64()).sum()
    }

    /// Highest-scoring entry; the earliest one wins ties.
    #[must_use]
    pub fn best(&self) -> Option<(&State, Score)> {
        self.entries
            .iter()
            .fold(None, |best: Option<&(State, Score)>, entry| match best {
                Some(current) if current.1.as_f64() >= entry.1.as_f64() => Some(current),
                _ => Some(entry),
            })
            .map(|(state, score)| (state, *score))
    }

    /// Entries ordered from highest to lowest score, stable for ties.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&State, Score)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.as_f64().total_cmp(&a.1.as_f64()));
        ranked
    }
}

impl FromIterator<(State, Score)> for StateScores {
    fn from_iter<I: IntoIterator<Item = (State, Score)>>(iter: I) -> Self {
        let mut scores = StateScores::new();
        for (state, score) in iter {
            scores.insert(state, score);
        }
        scores
    }
}

impl Extend<(State, Score)> for StateScores {
    fn extend<I: IntoIterator<Item = (State, Score)>>(&mut self, iter: I) {
        for (state, score) in iter {
            self.insert(state, score);
        }
    }
}

impl IntoIterator for StateScores {
    type Item = (State, Score);
    type IntoIter = std::vec::IntoIter<(State, Score)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
