use arbor_types::{CompletionMode, PromptSpec};
use tokio::sync::mpsc;

use crate::chat::{self, StreamedReply};
use crate::retry::{Sleeper, TokioSleeper, retry_transient};
use crate::usage::{TokenUsage, estimate_tokens};
use crate::{
    ApiConfig, ApiConfigError, LanguageModel, Progress, ProviderError, TransientProviderError,
    http_client, http_client_with_timeout, stream_idle_timeout,
};

/// [`LanguageModel`] backed by an OpenAI-style chat-completions endpoint.
///
/// Every call is wrapped in the configured retry policy. The client is safe
/// to share by reference across concurrent callers.
#[derive(Debug)]
pub struct ModelClient<S: Sleeper = TokioSleeper> {
    config: ApiConfig,
    http: reqwest::Client,
    sleeper: S,
    usage: TokenUsage,
    progress: Option<mpsc::UnboundedSender<Progress>>,
}

impl ModelClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiConfigError> {
        let http = match config.request_timeout() {
            Some(timeout) => http_client_with_timeout(timeout)?,
            None => http_client().clone(),
        };
        Ok(Self {
            config,
            http,
            sleeper: TokioSleeper,
            usage: TokenUsage::new(),
            progress: None,
        })
    }
}

impl<S: Sleeper> ModelClient<S> {
    /// Replace the retry sleeper, e.g. with [`crate::retry::RecordingSleeper`] in tests.
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> ModelClient<T> {
        ModelClient {
            config: self.config,
            http: self.http,
            sleeper,
            usage: self.usage,
            progress: self.progress,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<Progress>) -> Self {
        self.progress = Some(tx);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    #[must_use]
    pub fn usage(&self) -> &TokenUsage {
        &self.usage
    }

    #[must_use]
    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    fn emit(&self, event: Progress) {
        if let Some(tx) = &self.progress {
            // Receiver gone means nobody is rendering; keep going.
            let _ = tx.send(event);
        }
    }

    async fn attempt(
        &self,
        spec: &PromptSpec,
        mode: CompletionMode,
    ) -> Result<String, TransientProviderError> {
        let body = chat::build_request_body(self.config.model(), spec, mode.is_streaming());
        match mode {
            CompletionMode::Blocking => chat::send_blocking(&self.http, &self.config, &body).await,
            CompletionMode::Streaming => {
                let StreamedReply { text, fragments } = chat::send_streaming(
                    &self.http,
                    &self.config,
                    &body,
                    stream_idle_timeout(),
                    |fragment| self.emit(Progress::Fragment(fragment.to_string())),
                )
                .await?;

                let prompt_tokens =
                    estimate_tokens(&spec.system_prompt) + estimate_tokens(&spec.user_prompt);
                let session_total = self.usage.record_call(prompt_tokens, fragments);
                tracing::info!(fragments, session_total, "Streamed completion");
                self.emit(Progress::Usage {
                    call_fragments: fragments,
                    session_total,
                });
                Ok(text)
            }
        }
    }
}

impl<S: Sleeper> LanguageModel for ModelClient<S> {
    async fn complete(
        &self,
        spec: &PromptSpec,
        mode: CompletionMode,
    ) -> Result<String, ProviderError> {
        let mode = self.config.effective_mode(mode);
        tracing::debug!(
            model = %self.config.model(),
            streaming = mode.is_streaming(),
            max_tokens = spec.max_tokens,
            "Sending completion request"
        );

        retry_transient(
            self.config.retry(),
            &self.sleeper,
            |attempt, delay, error| {
                self.emit(Progress::Retry {
                    attempt,
                    delay,
                    error: error.to_string(),
                });
            },
            |_| self.attempt(spec, mode),
        )
        .await
    }
}
