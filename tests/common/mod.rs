//! Shared test utilities and fixtures
//!
//! A wiremock chat-completions endpoint and clients pointed at it.

#![allow(dead_code)]

use arbor_providers::retry::{RecordingSleeper, RetryPolicy};
use arbor_providers::{ApiConfig, ModelClient};
use arbor_types::ApiKey;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CHAT_PATH: &str = "/v1/chat/completions";

pub fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig::new(ApiKey::new("sk-test"))
        .expect("non-blank key")
        .with_base_url(format!("{}/v1", server.uri()))
        .expect("mock server url")
        .with_retry(RetryPolicy::default().with_sleep(Duration::from_secs(3)))
}

/// Client against `server` that records retry delays instead of sleeping.
pub fn client_for(server: &MockServer) -> ModelClient<RecordingSleeper> {
    ModelClient::new(api_config(server))
        .expect("client builds")
        .with_sleeper(RecordingSleeper::new())
}

pub fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
}

pub fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::from("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for fragment in fragments {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": fragment}}]})
        ));
    }
    body.push_str("data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n");
    body.push_str("data: [DONE]\n\n");
    body
}

pub fn streamed(fragments: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(sse_body(fragments))
}

/// Answer every request with `max_tokens == max_tokens` using `response`.
pub async fn mount_for_budget(server: &MockServer, max_tokens: u32, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({"max_tokens": max_tokens})))
        .respond_with(response)
        .mount(server)
        .await;
}
