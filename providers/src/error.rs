//! Provider error taxonomy.

use reqwest::StatusCode;
use thiserror::Error;

/// A single failed attempt against the completion endpoint.
///
/// Every variant is treated as transient: the retry policy sleeps and sends
/// the same request again.
#[derive(Debug, Error)]
pub enum TransientProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("stream terminated: {0}")]
    Stream(String),
}

impl TransientProviderError {
    /// HTTP status for rejected requests, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) => e.status(),
            Self::Malformed(_) | Self::Stream(_) => None,
        }
    }

    /// Whether the endpoint signalled rate limiting.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// Failure surfaced to callers of a [`crate::LanguageModel`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A model that does not retry reports the attempt failure directly.
    #[error(transparent)]
    Transient(#[from] TransientProviderError),
    /// The retry cap was reached.
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last_error: TransientProviderError,
    },
}
