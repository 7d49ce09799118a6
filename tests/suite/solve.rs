//! Beam search end to end against a mock chat-completions endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use arbor_engine::prompts::{SOLUTION_MAX_TOKENS, THOUGHT_MAX_TOKENS, VALUE_MAX_TOKENS};
use arbor_engine::{EngineError, ReasoningProcess, SearchParams};
use arbor_providers::retry::RetryPolicy;
use arbor_providers::{ModelClient, Progress, ProviderError, TransientProviderError};
use serde_json::Value;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::common::{CHAT_PATH, api_config, client_for, completion, mount_for_budget, streamed};

fn params() -> SearchParams {
    SearchParams {
        max_steps: 3,
        breadth: 2,
        beam_width: 1,
        pruning_threshold: 0.3,
        value_threshold: 0.9,
    }
}

/// Numbered thoughts so every candidate state is distinct.
async fn mount_numbered_thoughts(server: &MockServer) {
    let counter = Arc::new(AtomicUsize::new(0));
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(
            serde_json::json!({"max_tokens": THOUGHT_MAX_TOKENS}),
        ))
        .respond_with(move |_: &Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            streamed(&["Multiply ", &format!("option {n}")])
        })
        .mount(server)
        .await;
}

fn request_bodies(requests: &[Request]) -> Vec<Value> {
    requests
        .iter()
        .map(|r| serde_json::from_slice(&r.body).expect("json request body"))
        .collect()
}

#[tokio::test]
async fn solve_stops_once_a_state_clears_the_value_threshold() {
    let server = MockServer::start().await;
    mount_numbered_thoughts(&server).await;
    mount_for_budget(&server, VALUE_MAX_TOKENS, completion("0.95")).await;
    mount_for_budget(&server, SOLUTION_MAX_TOKENS, streamed(&["2", "4"])).await;

    let client = client_for(&server);
    let process = ReasoningProcess::new(&client);
    let outcome = process.solve("Make 24 from 4 4 6 8", &params()).await.unwrap();

    assert_eq!(outcome.steps.len(), 1);
    assert_eq!(outcome.best_state.steps(), ["Multiply option 0"]);
    assert!((outcome.best_score - 0.95).abs() < f64::EPSILON);
    assert_eq!(outcome.solution.as_deref(), Some("24"));
    assert!(outcome.rejected.is_empty());

    let bodies = request_bodies(&server.received_requests().await.unwrap());
    // Two thoughts, two value calls, one solution.
    assert_eq!(bodies.len(), 5);
    for body in &bodies {
        let streaming = body["max_tokens"] != VALUE_MAX_TOKENS;
        assert_eq!(body["stream"], streaming, "request {body}");
    }
    assert!(client.usage().session_total() > 0);
    assert_eq!(client.usage().calls(), 3);
}

#[tokio::test]
async fn low_scores_are_rejected_and_fed_back_into_prompts() {
    let server = MockServer::start().await;
    mount_numbered_thoughts(&server).await;
    let value_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&value_calls);
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(
            serde_json::json!({"max_tokens": VALUE_MAX_TOKENS}),
        ))
        .respond_with(move |request: &Request| {
            calls.fetch_add(1, Ordering::SeqCst);
            // Odd-numbered options fall below the pruning threshold.
            let body = String::from_utf8_lossy(&request.body);
            let weak = body.contains("option 1") || body.contains("option 3");
            completion(if weak { "0.1" } else { "0.6" })
        })
        .mount(&server)
        .await;
    mount_for_budget(&server, SOLUTION_MAX_TOKENS, streamed(&["done"])).await;

    let client = client_for(&server);
    let process = ReasoningProcess::new(&client);
    let outcome = process
        .solve("task", &SearchParams { max_steps: 2, ..params() })
        .await
        .unwrap();

    assert_eq!(outcome.steps.len(), 2);
    assert_eq!(outcome.rejected.len(), 2);
    assert_eq!(value_calls.load(Ordering::SeqCst), 4);

    let bodies = request_bodies(&server.received_requests().await.unwrap());
    let second_round_thought = bodies
        .iter()
        .filter(|b| b["max_tokens"] == THOUGHT_MAX_TOKENS)
        .nth(2)
        .expect("a second-round thought request");
    let user = second_round_thought["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap();
    assert!(user.contains("Multiply option 1"), "{user}");
}

#[tokio::test]
async fn rate_limited_calls_sleep_and_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_numbered_thoughts(&server).await;
    mount_for_budget(&server, VALUE_MAX_TOKENS, completion("0.95")).await;
    mount_for_budget(&server, SOLUTION_MAX_TOKENS, streamed(&["ok"])).await;

    let client = client_for(&server);
    let process = ReasoningProcess::new(&client);
    let outcome = process.solve("task", &params()).await.unwrap();

    assert_eq!(outcome.solution.as_deref(), Some("ok"));
    assert_eq!(client.sleeper().delays(), vec![Duration::from_secs(3)]);
}

#[tokio::test]
async fn capped_retries_surface_the_last_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(2)
        .mount(&server)
        .await;

    let config = api_config(&server).with_retry(
        RetryPolicy::default()
            .with_sleep(Duration::ZERO)
            .with_max_attempts(2),
    );
    let client = ModelClient::new(config).unwrap();
    let process = ReasoningProcess::new(&client);

    let err = process.solve("task", &params()).await.unwrap_err();
    match err {
        EngineError::Provider(ProviderError::RetryExhausted {
            attempts,
            last_error: TransientProviderError::Status { status, .. },
        }) => {
            assert_eq!(attempts, 2);
            assert_eq!(status.as_u16(), 503);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn streamed_fragments_and_usage_reach_the_progress_channel() {
    let server = MockServer::start().await;
    mount_numbered_thoughts(&server).await;
    mount_for_budget(&server, VALUE_MAX_TOKENS, completion("0.95")).await;
    mount_for_budget(&server, SOLUTION_MAX_TOKENS, streamed(&["forty", "-two"])).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = client_for(&server).with_progress(tx);
    let process = ReasoningProcess::new(client);
    process.solve("task", &params()).await.unwrap();
    drop(process);

    let mut text = String::new();
    let mut usage_events = 0;
    let mut last_total = 0;
    while let Some(event) = rx.recv().await {
        match event {
            Progress::Fragment(fragment) => text.push_str(&fragment),
            Progress::Usage { session_total, .. } => {
                assert!(session_total >= last_total);
                last_total = session_total;
                usage_events += 1;
            }
            Progress::Retry { .. } => panic!("no retries expected"),
        }
    }

    assert!(text.contains("Multiply option 0"));
    assert!(text.ends_with("forty-two"));
    assert_eq!(usage_events, 3);
}
