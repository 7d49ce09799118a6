//! State scoring through a real client.

use arbor_engine::prompts::{VALUE_MAX_TOKENS, VOTE_MAX_TOKENS};
use arbor_engine::{EngineError, StateEvaluator};
use arbor_types::{Score, State};
use wiremock::MockServer;

use crate::common::{client_for, completion, mount_for_budget};

fn candidates() -> Vec<State> {
    vec![
        State::root().extend("Add 4 and 4").extend("Multiply by 3"),
        State::root().extend("Multiply 6 by 4"),
    ]
}

#[tokio::test]
async fn vote_reply_copied_from_the_list_wins() {
    let server = MockServer::start().await;
    mount_for_budget(&server, VOTE_MAX_TOKENS, completion("  Multiply 6 by 4\n")).await;

    let client = client_for(&server);
    let evaluator = StateEvaluator::new(&client);
    let scores = evaluator
        .evaluate_states_named(&candidates(), "Make 24", "vote")
        .await
        .unwrap();

    let states = candidates();
    assert_eq!(scores.get(&states[0]), Some(Score::Vote(0)));
    assert_eq!(scores.get(&states[1]), Some(Score::Vote(1)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn multi_step_states_match_their_flattened_line() {
    let server = MockServer::start().await;
    mount_for_budget(
        &server,
        VOTE_MAX_TOKENS,
        completion("Add 4 and 4 Multiply by 3"),
    )
    .await;

    let client = client_for(&server);
    let scores = StateEvaluator::new(&client)
        .evaluate_states_named(&candidates(), "Make 24", "vote")
        .await
        .unwrap();

    let (best, score) = scores.best().unwrap();
    assert_eq!(best, &candidates()[0]);
    assert!((score.as_f64() - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn unparseable_value_reply_scores_zero() {
    let server = MockServer::start().await;
    mount_for_budget(&server, VALUE_MAX_TOKENS, completion("pretty good")).await;

    let client = client_for(&server);
    let scores = StateEvaluator::new(&client)
        .evaluate_states_named(&candidates(), "Make 24", "value")
        .await
        .unwrap();

    assert_eq!(scores.len(), 2);
    assert!(scores.iter().all(|(_, score)| score.as_f64() == 0.0));
}

#[tokio::test]
async fn unknown_strategy_makes_no_request() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let err = StateEvaluator::new(&client)
        .evaluate_states_named(&candidates(), "Make 24", "majority")
        .await
        .unwrap_err();

    match err {
        EngineError::InvalidStrategy(invalid) => assert_eq!(invalid.raw(), "majority"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}
