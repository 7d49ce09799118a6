//! Chat-completion client for the reasoning engine.
//!
//! # Architecture
//!
//! - [`LanguageModel`] - The seam the engine depends on: one `complete` call per prompt
//! - [`ModelClient`] - HTTP implementation against an OpenAI-style `/chat/completions` endpoint
//! - [`retry`] - Sleep-and-retry combinator wrapped around every attempt
//! - [`ModelRegistry`] - Name to constructor lookup, built once by the caller
//! - [`usage`] - Advisory token accounting for streamed calls
//!
//! # Configuration
//!
//! [`ApiConfig`] bundles credentials, base URL, model, streaming switch and retry
//! policy. It is immutable after construction and shared read-only by every
//! concurrent caller of the client.
//!
//! # Progress
//!
//! A client built with [`ModelClient::with_progress`] reports streamed fragments,
//! token counts and retries as [`Progress`] values, so a UI can render them as they
//! arrive. Everything is also logged through `tracing`.

mod chat;
mod client;
mod error;
mod registry;
pub mod retry;
mod sse;
pub mod sse_types;
pub mod usage;

pub use arbor_types;
pub use client::ModelClient;
pub use error::{ProviderError, TransientProviderError};
pub use registry::{ModelConstructor, ModelRegistry, RegistryError};

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use arbor_types::{ApiKey, CompletionMode, ModelName, PromptSpec};
use retry::RetryPolicy;

/// Canonical OpenAI API base URL.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";
/// Environment variable consulted for the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable consulted for the base URL.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 60;
const MAX_SSE_BUFFER_BYTES: usize = 4 * 1024 * 1024;
const MAX_SSE_PARSE_ERRORS: usize = 3;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Text-generation collaborator used by the engine.
///
/// Implementations own their failure handling: [`ModelClient`] retries
/// transient errors according to its [`RetryPolicy`] and only returns an error
/// once a configured cap is reached.
pub trait LanguageModel: Send + Sync {
    fn complete(
        &self,
        spec: &PromptSpec,
        mode: CompletionMode,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    fn generate(
        &self,
        spec: &PromptSpec,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        self.complete(spec, CompletionMode::Blocking)
    }

    fn generate_streaming(
        &self,
        spec: &PromptSpec,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        self.complete(spec, CompletionMode::Streaming)
    }
}

impl<M: LanguageModel> LanguageModel for &M {
    fn complete(
        &self,
        spec: &PromptSpec,
        mode: CompletionMode,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        (**self).complete(spec, mode)
    }
}

impl<M: LanguageModel> LanguageModel for std::sync::Arc<M> {
    fn complete(
        &self,
        spec: &PromptSpec,
        mode: CompletionMode,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        (**self).complete(spec, mode)
    }
}

/// Observable client activity.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Streamed text as it arrives.
    Fragment(String),
    /// Token counts after a streamed call completes.
    Usage {
        call_fragments: u64,
        session_total: u64,
    },
    /// A failed attempt that will be retried after `delay`.
    Retry {
        attempt: u32,
        delay: Duration,
        error: String,
    },
}

/// Endpoint, credentials and call policy for a [`ModelClient`].
///
/// ```rust
/// use std::time::Duration;
/// use arbor_providers::ApiConfig;
/// use arbor_providers::arbor_types::ApiKey;
///
/// let config = ApiConfig::new(ApiKey::new("sk-test"))
///     .unwrap()
///     .with_base_url("http://localhost:8080/v1")
///     .unwrap()
///     .with_streaming(false)
///     .with_request_timeout(Duration::from_secs(120));
/// assert_eq!(
///     config.chat_completions_url(),
///     "http://localhost:8080/v1/chat/completions"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    api_key: ApiKey,
    base_url: String,
    model: ModelName,
    streaming: bool,
    retry: RetryPolicy,
    request_timeout: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiConfigError {
    #[error("no API key configured; set {API_KEY_ENV} or api_key in the config file")]
    MissingApiKey,
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ApiConfig {
    pub fn new(api_key: ApiKey) -> Result<Self, ApiConfigError> {
        if api_key.is_blank() {
            return Err(ApiConfigError::MissingApiKey);
        }

        Ok(Self {
            api_key,
            base_url: OPENAI_API_BASE_URL.to_string(),
            model: ModelName::default(),
            streaming: true,
            retry: RetryPolicy::default(),
            request_timeout: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ApiConfigError> {
        let raw = base_url.into();
        let trimmed = raw.trim().trim_end_matches('/');
        let parsed = reqwest::Url::parse(trimmed).map_err(|e| ApiConfigError::InvalidBaseUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiConfigError::InvalidBaseUrl {
                url: raw,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        self.base_url = trimmed.to_string();
        Ok(self)
    }

    #[must_use]
    pub fn with_model(mut self, model: ModelName) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn model(&self) -> &ModelName {
        &self.model
    }

    #[must_use]
    pub const fn streaming(&self) -> bool {
        self.streaming
    }

    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    #[must_use]
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Streaming requests fall back to blocking when streaming is switched off.
    #[must_use]
    pub const fn effective_mode(&self, requested: CompletionMode) -> CompletionMode {
        if self.streaming {
            requested
        } else {
            CompletionMode::Blocking
        }
    }
}

pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build tuned HTTP client: {e}. Falling back to defaults.");
            reqwest::Client::new()
        })
    })
}

/// Base URLs are caller-supplied (local proxies, compatible servers), so
/// plain HTTP is allowed.
fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

pub fn http_client_with_timeout(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder().timeout(timeout).build()
}

pub(crate) fn stream_idle_timeout() -> Duration {
    static TIMEOUT: OnceLock<Duration> = OnceLock::new();
    *TIMEOUT.get_or_init(|| {
        let timeout = std::env::var("ARBOR_STREAM_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_SECS);
        Duration::from_secs(timeout)
    })
}

pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
