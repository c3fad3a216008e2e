use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use toolweave::agent::{ExchangeState, LoopSettings, Orchestrator};
use toolweave::error::{ExchangeError, ModelError};
use toolweave::llm::types::ContentPart;
use toolweave::tools::ToolRegistry;
use toolweave::tools::builtin::ScrabbleScoreTool;

use crate::support::{ScriptedClient, Step, call};

fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ScrabbleScoreTool::new())).unwrap();
    Arc::new(registry)
}

fn settings(max_iterations: u32) -> LoopSettings {
    LoopSettings {
        max_iterations,
        ..LoopSettings::default()
    }
}

fn score_call() -> ContentPart {
    call("get_min_scrabble_word_score", json!({"candidate": "Wabe"}))
}

#[tokio::test]
async fn endless_calls_hit_the_iteration_limit() {
    let client = ScriptedClient::looping(vec![score_call()]);
    let orchestrator = Orchestrator::new(client.clone(), registry(), settings(3));
    let cancel = CancellationToken::new();

    let mut exchange = orchestrator.start("Score Wabe forever");
    let err = exchange.drive(&cancel).await.unwrap_err();

    assert_eq!(err, ExchangeError::IterationLimitExceeded { limit: 3 });
    assert_eq!(client.request_count(), 3);
    assert_eq!(exchange.state(), ExchangeState::Failed);
    assert_eq!(exchange.iterations(), 3);
    // Calls from the last turn are never executed.
    assert_eq!(exchange.transcript().len(), 6);

    assert_eq!(
        exchange.drive(&cancel).await.unwrap_err(),
        ExchangeError::Finished
    );
    assert_eq!(client.request_count(), 3);
}

#[tokio::test]
async fn final_answer_on_the_last_allowed_turn_succeeds() {
    let client = ScriptedClient::new(vec![
        Step::Respond(vec![score_call()]),
        Step::Respond(vec![ContentPart::text("9")]),
    ]);
    let orchestrator = Orchestrator::new(client.clone(), registry(), settings(2));

    let outcome = orchestrator
        .run("Score Wabe", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.final_text, "9");
    assert_eq!(outcome.iterations, 2);
}

#[tokio::test]
async fn zero_iterations_is_raised_to_one() {
    let client = ScriptedClient::new(vec![Step::Respond(vec![ContentPart::text("hello")])]);
    let orchestrator = Orchestrator::new(client, registry(), settings(0));
    assert_eq!(orchestrator.settings().max_iterations, 1);

    let outcome = orchestrator
        .run("hi", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.final_text, "hello");
}

#[tokio::test]
async fn cancelled_before_start_sends_nothing() {
    let client = ScriptedClient::new(vec![Step::Respond(vec![ContentPart::text("hi")])]);
    let orchestrator = Orchestrator::new(client.clone(), registry(), LoopSettings::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut exchange = orchestrator.start("hello");
    let err = exchange.drive(&cancel).await.unwrap_err();

    assert_eq!(err, ExchangeError::Cancelled);
    assert_eq!(client.request_count(), 0);
    assert_eq!(exchange.state(), ExchangeState::Failed);
}

#[tokio::test]
async fn cancel_abandons_an_outstanding_request() {
    let client = ScriptedClient::new(vec![Step::Hang]);
    let orchestrator = Orchestrator::new(client.clone(), registry(), LoopSettings::default());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let mut exchange = orchestrator.start("hello");
    let err = exchange.drive(&cancel).await.unwrap_err();

    assert_eq!(err, ExchangeError::Cancelled);
    assert_eq!(client.request_count(), 1);
    assert_eq!(exchange.state(), ExchangeState::Failed);
    assert_eq!(exchange.transcript().len(), 1);
}

#[tokio::test]
async fn timeout_is_a_retryable_transport_failure() {
    let client = ScriptedClient::new(vec![
        Step::Hang,
        Step::Respond(vec![ContentPart::text("late but fine")]),
    ]);
    let settings = LoopSettings {
        request_timeout: Duration::from_millis(50),
        ..LoopSettings::default()
    };
    let orchestrator = Orchestrator::new(client.clone(), registry(), settings);
    let cancel = CancellationToken::new();

    let mut exchange = orchestrator.start("hello");
    let err = exchange.drive(&cancel).await.unwrap_err();

    assert!(matches!(
        err,
        ExchangeError::Model(ModelError::Transport {
            timed_out: true,
            ..
        })
    ));
    assert!(err.is_retryable());
    assert_eq!(exchange.state(), ExchangeState::AwaitingModel);
    assert_eq!(exchange.iterations(), 0);

    let outcome = exchange.drive(&cancel).await.unwrap();
    assert_eq!(outcome.final_text, "late but fine");
    assert_eq!(outcome.iterations, 1);
    let requests = client.requests();
    assert_eq!(requests[0], requests[1]);
}
