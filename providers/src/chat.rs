//! Wire-level calls to `POST {base_url}/chat/completions`.
//!
//! One function per delivery mode. Each performs exactly one attempt; retrying
//! is the caller's job.

use std::time::Duration;

use arbor_types::{ModelName, PromptSpec};
use futures_util::StreamExt;
use serde_json::{Value, json};

use crate::sse::SseDecoder;
use crate::sse_types::{ChatChunk, ChatCompletion};
use crate::{
    ApiConfig, MAX_SSE_BUFFER_BYTES, MAX_SSE_PARSE_ERRORS, TransientProviderError,
    read_capped_error_body,
};

/// Text accumulated from one streamed reply.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct StreamedReply {
    pub text: String,
    pub fragments: u64,
}

pub(crate) fn build_request_body(model: &ModelName, spec: &PromptSpec, stream: bool) -> Value {
    let mut messages = Vec::with_capacity(2);
    if !spec.system_prompt.trim().is_empty() {
        messages.push(json!({"role": "system", "content": spec.system_prompt}));
    }
    messages.push(json!({"role": "user", "content": spec.user_prompt}));

    json!({
        "model": model.as_str(),
        "messages": messages,
        "temperature": spec.temperature,
        "max_tokens": spec.max_tokens,
        "stream": stream,
    })
}

async fn post(
    http: &reqwest::Client,
    config: &ApiConfig,
    body: &Value,
) -> Result<reqwest::Response, TransientProviderError> {
    let response = http
        .post(config.chat_completions_url())
        .bearer_auth(config.api_key())
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = read_capped_error_body(response).await;
        return Err(TransientProviderError::Status { status, body });
    }
    Ok(response)
}

/// One non-streaming call; returns `choices[0].message.content`.
///
/// A null or missing `content` is read as an empty reply.
pub(crate) async fn send_blocking(
    http: &reqwest::Client,
    config: &ApiConfig,
    body: &Value,
) -> Result<String, TransientProviderError> {
    let response = post(http, config, body).await?;
    let bytes = response.bytes().await?;
    let reply: ChatCompletion = serde_json::from_slice(&bytes)
        .map_err(|e| TransientProviderError::Malformed(e.to_string()))?;

    if let Some(usage) = &reply.usage {
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Completion usage"
        );
    }

    let choice = reply
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| TransientProviderError::Malformed("reply has no choices".to_string()))?;

    Ok(choice
        .message
        .and_then(|message| message.content)
        .unwrap_or_default())
}

/// One streaming call; accumulates `choices[0].delta.content` fragments.
///
/// Terminates on `[DONE]` or a `finish_reason`. Reaching end of body without
/// either is an error, as are idle timeouts, oversized events, invalid UTF-8
/// and repeated unparseable payloads.
pub(crate) async fn send_streaming<F>(
    http: &reqwest::Client,
    config: &ApiConfig,
    body: &Value,
    idle_timeout: Duration,
    mut on_fragment: F,
) -> Result<StreamedReply, TransientProviderError>
where
    F: FnMut(&str),
{
    let response = post(http, config, body).await?;
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new(MAX_SSE_BUFFER_BYTES);
    let mut parse_errors = 0usize;
    let mut reply = StreamedReply::default();

    loop {
        let Ok(next) = tokio::time::timeout(idle_timeout, stream.next()).await else {
            return Err(TransientProviderError::Stream("idle timeout".to_string()));
        };

        let Some(chunk) = next else { break };
        decoder
            .feed(&chunk?)
            .map_err(|e| TransientProviderError::Stream(e.to_string()))?;

        while let Some(data) = decoder.next_payload() {
            let data = data.map_err(|e| TransientProviderError::Stream(e.to_string()))?;

            if data == "[DONE]" {
                return Ok(reply);
            }

            let chunk = match serde_json::from_str::<ChatChunk>(&data) {
                Ok(chunk) => {
                    parse_errors = 0;
                    chunk
                }
                Err(e) => {
                    parse_errors = parse_errors.saturating_add(1);
                    tracing::warn!(%e, payload_bytes = data.len(), "Invalid SSE JSON payload");
                    if parse_errors >= MAX_SSE_PARSE_ERRORS {
                        return Err(TransientProviderError::Malformed(format!(
                            "invalid stream payload: {e}"
                        )));
                    }
                    continue;
                }
            };

            if let Some(error) = chunk.error {
                return Err(TransientProviderError::Stream(
                    error
                        .message
                        .unwrap_or_else(|| "error event without message".to_string()),
                ));
            }

            let Some(choice) = chunk.choices.first() else {
                continue;
            };

            if let Some(text) = choice.delta.text() {
                reply.text.push_str(text);
                reply.fragments = reply.fragments.saturating_add(1);
                on_fragment(text);
            }

            if choice.finish_reason.is_some() {
                return Ok(reply);
            }
        }
    }

    Err(TransientProviderError::Stream(
        "connection closed before stream completed".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::ApiKey;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IDLE: Duration = Duration::from_secs(5);

    fn config_for(server: &MockServer) -> ApiConfig {
        ApiConfig::new(ApiKey::new("sk-test"))
            .unwrap()
            .with_base_url(format!("{}/v1", server.uri()))
            .unwrap()
    }

    fn sse(events: &[&str]) -> ResponseTemplate {
        let mut body = String::new();
        for event in events {
            body.push_str("data: ");
            body.push_str(event);
            body.push_str("\n\n");
        }
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body)
    }

    #[test]
    fn request_body_includes_sampling_parameters() {
        let spec = PromptSpec::new("Be brief.", "Say hi")
            .with_max_tokens(10)
            .with_temperature(1.0);
        let body = build_request_body(&ModelName::default(), &spec, false);

        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 10);
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Say hi");
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let body = build_request_body(&ModelName::default(), &PromptSpec::new("  ", "x"), true);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn blocking_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"stream": false, "max_tokens": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "0.8"}, "finish_reason": "stop"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let spec = PromptSpec::user("score this").with_max_tokens(10);
        let body = build_request_body(config.model(), &spec, false);
        let text = send_blocking(&reqwest::Client::new(), &config, &body)
            .await
            .unwrap();
        assert_eq!(text, "0.8");
    }

    #[tokio::test]
    async fn blocking_null_content_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let body = build_request_body(config.model(), &PromptSpec::user("x"), false);
        let text = send_blocking(&reqwest::Client::new(), &config, &body)
            .await
            .unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn blocking_without_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let body = build_request_body(config.model(), &PromptSpec::user("x"), false);
        let err = send_blocking(&reqwest::Client::new(), &config, &body)
            .await
            .unwrap_err();
        assert!(matches!(err, TransientProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let body = build_request_body(config.model(), &PromptSpec::user("x"), false);
        let err = send_blocking(&reqwest::Client::new(), &config, &body)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn streaming_skips_role_only_fragments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(sse(&[
                r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
                r#"{"choices":[{"delta":{"content":"Step "}}]}"#,
                r#"{"choices":[{"delta":{"content":""}}]}"#,
                r#"{"choices":[{"delta":{"content":"one"}}]}"#,
                "[DONE]",
            ]))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let body = build_request_body(config.model(), &PromptSpec::user("x"), true);
        let mut seen = Vec::new();
        let reply = send_streaming(&reqwest::Client::new(), &config, &body, IDLE, |text| {
            seen.push(text.to_string());
        })
        .await
        .unwrap();

        assert_eq!(reply.text, "Step one");
        assert_eq!(reply.fragments, 2);
        assert_eq!(seen, vec!["Step ", "one"]);
    }

    #[tokio::test]
    async fn streaming_stops_at_finish_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(&[
                r#"{"choices":[{"delta":{"content":"done"},"finish_reason":"stop"}]}"#,
            ]))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let body = build_request_body(config.model(), &PromptSpec::user("x"), true);
        let reply = send_streaming(&reqwest::Client::new(), &config, &body, IDLE, |_| {})
            .await
            .unwrap();
        assert_eq!(reply.text, "done");
    }

    #[tokio::test]
    async fn streaming_eof_without_terminal_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(&[r#"{"choices":[{"delta":{"content":"partial"}}]}"#]))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let body = build_request_body(config.model(), &PromptSpec::user("x"), true);
        let err = send_streaming(&reqwest::Client::new(), &config, &body, IDLE, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, TransientProviderError::Stream(_)));
    }

    #[tokio::test]
    async fn streaming_in_band_error_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(&[r#"{"error":{"message":"overloaded"}}"#]))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let body = build_request_body(config.model(), &PromptSpec::user("x"), true);
        let err = send_streaming(&reqwest::Client::new(), &config, &body, IDLE, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "stream terminated: overloaded");
    }

    #[tokio::test]
    async fn streaming_repeated_garbage_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(&["{not json", "{still not", "{nope"]))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let body = build_request_body(config.model(), &PromptSpec::user("x"), true);
        let err = send_streaming(&reqwest::Client::new(), &config, &body, IDLE, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, TransientProviderError::Malformed(_)));
    }
}
