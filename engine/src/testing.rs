//! Deterministic model doubles for engine tests.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use arbor_providers::{LanguageModel, ProviderError, TransientProviderError};
use arbor_types::{CompletionMode, PromptSpec};

/// Replies computed from the prompt; records every call.
pub(crate) struct ScriptedModel<F> {
    reply: F,
    calls: AtomicUsize,
    seen: Mutex<Vec<(PromptSpec, CompletionMode)>>,
}

impl<F> ScriptedModel<F>
where
    F: Fn(&PromptSpec) -> Result<String, ProviderError> + Send + Sync,
{
    pub(crate) fn new(reply: F) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self) -> Vec<(PromptSpec, CompletionMode)> {
        self.seen.lock().unwrap().clone()
    }
}

/// A model that answers every prompt with `reply(spec)`.
pub(crate) fn scripted(
    reply: impl Fn(&PromptSpec) -> String + Send + Sync,
) -> ScriptedModel<impl Fn(&PromptSpec) -> Result<String, ProviderError> + Send + Sync> {
    ScriptedModel::new(move |spec: &PromptSpec| Ok(reply(spec)))
}

/// A model whose retries are always exhausted.
pub(crate) fn exhausted()
-> ScriptedModel<impl Fn(&PromptSpec) -> Result<String, ProviderError> + Send + Sync> {
    ScriptedModel::new(|_: &PromptSpec| {
        Err(ProviderError::RetryExhausted {
            attempts: 1,
            last_error: TransientProviderError::Malformed("scripted failure".to_string()),
        })
    })
}

impl<F> LanguageModel for ScriptedModel<F>
where
    F: Fn(&PromptSpec) -> Result<String, ProviderError> + Send + Sync,
{
    fn complete(
        &self,
        spec: &PromptSpec,
        mode: CompletionMode,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((spec.clone(), mode));
        let reply = (self.reply)(spec);
        // Suspend once so concurrent callers interleave like real requests.
        async move {
            tokio::task::yield_now().await;
            reply
        }
    }
}
