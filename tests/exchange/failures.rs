use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use toolweave::agent::{ExchangeState, LoopSettings, Orchestrator, RetryPolicy, drive_with_retries};
use toolweave::error::{ExchangeError, ModelError};
use toolweave::llm::types::ContentPart;
use toolweave::tools::ToolRegistry;
use toolweave::tools::builtin::ScrabbleScoreTool;

use crate::support::{ScriptedClient, Step, args, call};

fn orchestrator(client: Arc<ScriptedClient>) -> Orchestrator {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ScrabbleScoreTool::new())).unwrap();
    Orchestrator::new(client, Arc::new(registry), LoopSettings::default())
}

fn unavailable() -> ModelError {
    ModelError::Transport {
        message: "service unavailable".into(),
        status: Some(503),
        timed_out: false,
    }
}

#[tokio::test]
async fn transport_failure_is_retried_with_the_same_transcript() {
    let client = ScriptedClient::new(vec![
        Step::Respond(vec![call(
            "get_min_scrabble_word_score",
            json!({"candidate": "Wabe"}),
        )]),
        Step::Fail(ModelError::transport("connection reset")),
        Step::Respond(vec![ContentPart::text("9")]),
    ]);
    let orchestrator = orchestrator(client.clone());
    let cancel = CancellationToken::new();

    let mut exchange = orchestrator.start("Score Wabe");
    let outcome = drive_with_retries(&mut exchange, &cancel, RetryPolicy::new(2, 1))
        .await
        .unwrap();

    assert_eq!(outcome.final_text, "9");
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.tool_calls.len(), 1);

    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1], requests[2]);
    assert_eq!(requests[2].len(), 3);
}

#[tokio::test]
async fn retries_give_up_after_the_configured_count() {
    let client = ScriptedClient::new(vec![
        Step::Fail(unavailable()),
        Step::Fail(unavailable()),
        Step::Fail(unavailable()),
        Step::Respond(vec![ContentPart::text("too late")]),
    ]);
    let orchestrator = orchestrator(client.clone());

    let mut exchange = orchestrator.start("hello");
    let err = drive_with_retries(&mut exchange, &CancellationToken::new(), RetryPolicy::new(2, 1))
        .await
        .unwrap_err();

    assert_eq!(err, ExchangeError::Model(unavailable()));
    assert_eq!(client.request_count(), 3);
    assert_eq!(exchange.state(), ExchangeState::AwaitingModel);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let forbidden = ModelError::Transport {
        message: "API key not valid".into(),
        status: Some(403),
        timed_out: false,
    };
    let client = ScriptedClient::new(vec![
        Step::Fail(forbidden.clone()),
        Step::Respond(vec![ContentPart::text("unreachable")]),
    ]);
    let orchestrator = orchestrator(client.clone());

    let mut exchange = orchestrator.start("hello");
    let err = drive_with_retries(&mut exchange, &CancellationToken::new(), RetryPolicy::new(3, 1))
        .await
        .unwrap_err();

    assert_eq!(err, ExchangeError::Model(forbidden));
    assert!(!err.is_retryable());
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn protocol_error_is_terminal() {
    let client = ScriptedClient::new(vec![
        Step::Fail(ModelError::protocol("unparseable generateContent response")),
        Step::Respond(vec![ContentPart::text("unreachable")]),
    ]);
    let orchestrator = orchestrator(client.clone());
    let cancel = CancellationToken::new();

    let mut exchange = orchestrator.start("hello");
    let err = drive_with_retries(&mut exchange, &cancel, RetryPolicy::new(2, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::Model(ModelError::Protocol(_))));
    assert_eq!(exchange.state(), ExchangeState::Failed);
    assert_eq!(
        exchange.drive(&cancel).await.unwrap_err(),
        ExchangeError::Finished
    );
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn function_response_from_the_model_is_a_protocol_error() {
    let client = ScriptedClient::new(vec![Step::Respond(vec![
        ContentPart::function_response("get_min_scrabble_word_score", args(json!({"ok": true}))),
    ])]);
    let orchestrator = orchestrator(client);

    let mut exchange = orchestrator.start("hello");
    let err = exchange.drive(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ExchangeError::Model(ModelError::Protocol(_))));
    assert_eq!(exchange.state(), ExchangeState::Failed);
}

#[tokio::test]
async fn failed_tools_do_not_fail_the_exchange() {
    let client = ScriptedClient::new(vec![
        Step::Respond(vec![
            call("get_min_scrabble_word_score", json!({})),
            call("get_min_scrabble_word_score", json!({"candidate": "Yare"})),
        ]),
        Step::Respond(vec![ContentPart::text("Yare scores 7.")]),
    ]);
    let orchestrator = orchestrator(client);

    let outcome = orchestrator
        .run("Score something", &CancellationToken::new())
        .await
        .unwrap();

    let results: Vec<bool> = outcome.tool_calls.iter().map(|c| c.result.ok).collect();
    assert_eq!(results, vec![false, true]);
    assert_eq!(outcome.final_text, "Yare scores 7.");
}
