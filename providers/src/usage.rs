//! Advisory token accounting.
//!
//! Counts are for logging and progress display only; nothing in the client
//! branches on them.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tiktoken_rs::{CoreBPE, cl100k_base};

static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn encoder() -> Option<&'static CoreBPE> {
    ENCODER
        .get_or_init(|| match cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                tracing::warn!(%e, "cl100k_base encoder unavailable, using length heuristic");
                None
            }
        })
        .as_ref()
}

/// Token estimate for `text` under the cl100k_base encoding.
///
/// Falls back to one token per four bytes if the encoder cannot be loaded.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    match encoder() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len() as u64,
        None => text.len().div_ceil(4) as u64,
    }
}

/// Session-wide counters shared by every call on one client.
#[derive(Debug, Default)]
pub struct TokenUsage {
    session_total: AtomicU64,
    calls: AtomicU64,
}

impl TokenUsage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one call's prompt estimate and streamed fragment count.
    ///
    /// Returns the updated session total.
    pub fn record_call(&self, prompt_tokens: u64, fragments: u64) -> u64 {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let added = prompt_tokens.saturating_add(fragments);
        self.session_total
            .fetch_add(added, Ordering::Relaxed)
            .saturating_add(added)
    }

    #[must_use]
    pub fn session_total(&self) -> u64 {
        self.session_total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}
