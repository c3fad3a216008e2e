use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use toolweave::agent::{LoopSettings, Orchestrator};
use toolweave::llm::types::{ContentPart, Role};
use toolweave::tools::builtin::{KnownWordTool, ScrabbleScoreTool};
use toolweave::tools::{ParamType, ParameterSchema, ToolDescriptor, ToolRegistry};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{ScriptedClient, Step, call, response_payloads};

fn word_registry(dictionary_url: String) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry
        .register(Box::new(KnownWordTool::new(Client::new(), dictionary_url)))
        .unwrap();
    registry.register(Box::new(ScrabbleScoreTool::new())).unwrap();
    Arc::new(registry)
}

fn scrabble_only() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ScrabbleScoreTool::new())).unwrap();
    Arc::new(registry)
}

#[tokio::test]
async fn known_word_then_score_yields_final_answer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/entries/en/Rabblerouser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"word": "rabblerouser"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ScriptedClient::new(vec![
        Step::Respond(vec![call("get_is_known_word", json!({"candidate": "Rabblerouser"}))]),
        Step::Respond(vec![call(
            "get_min_scrabble_word_score",
            json!({"candidate": "Rabblerouser"}),
        )]),
        Step::Respond(vec![ContentPart::text("19")]),
    ]);
    let orchestrator = Orchestrator::new(
        client.clone(),
        word_registry(server.uri()),
        LoopSettings::default(),
    );

    let outcome = orchestrator
        .run(
            "If Rabblerouser is a real word, what is its minimum scrabble score?",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.final_text, "19");
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.tool_calls.len(), 2);
    assert_eq!(outcome.transcript.count_role(Role::Tool), 2);

    let roles: Vec<Role> = outcome.transcript.turns().iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::User,
            Role::Model,
            Role::Tool,
            Role::Model,
            Role::Tool,
            Role::Model
        ]
    );

    let turns = outcome.transcript.turns();
    assert_eq!(
        response_payloads(&turns[2]),
        vec![json!({"args": {"candidate": "Rabblerouser"}, "ok": true, "result": true})]
    );
    assert_eq!(
        response_payloads(&turns[4]),
        vec![json!({"args": {"candidate": "Rabblerouser"}, "ok": true, "result": 19})]
    );
}

#[tokio::test]
async fn every_request_carries_the_full_transcript_and_catalogue() {
    let client = ScriptedClient::new(vec![
        Step::Respond(vec![call(
            "get_min_scrabble_word_score",
            json!({"candidate": "Wabe"}),
        )]),
        Step::Respond(vec![ContentPart::text("9")]),
    ]);
    let orchestrator = Orchestrator::new(client.clone(), scrabble_only(), LoopSettings::default());

    orchestrator
        .run("Score Wabe", &CancellationToken::new())
        .await
        .unwrap();

    let lengths: Vec<usize> = client.requests().iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![1, 3]);
    assert_eq!(client.tool_counts(), vec![1, 1]);
    assert_eq!(client.requests()[1][0], client.requests()[0][0]);
}

#[tokio::test]
async fn same_tool_twice_with_different_args_is_answered_in_order() {
    let client = ScriptedClient::new(vec![
        Step::Respond(vec![
            call("get_min_scrabble_word_score", json!({"candidate": "Zephyr"})),
            call("get_min_scrabble_word_score", json!({"candidate": "Yare"})),
        ]),
        Step::Respond(vec![ContentPart::text("Zephyr scores higher.")]),
    ]);
    let orchestrator = Orchestrator::new(client.clone(), scrabble_only(), LoopSettings::default());

    let outcome = orchestrator
        .run("Which scores higher, Zephyr or Yare?", &CancellationToken::new())
        .await
        .unwrap();

    let tool_turn = &outcome.transcript.turns()[2];
    assert_eq!(
        response_payloads(tool_turn),
        vec![
            json!({"args": {"candidate": "Zephyr"}, "ok": true, "result": 23}),
            json!({"args": {"candidate": "Yare"}, "ok": true, "result": 7}),
        ]
    );
    assert_eq!(outcome.tool_calls.len(), 2);
    assert!(outcome.tool_calls.iter().all(|record| record.iteration == 1));
}

#[tokio::test]
async fn parallel_results_keep_call_order() {
    let mut registry = ToolRegistry::new();
    registry
        .register_fn(
            ToolDescriptor::new(
                "wait_then_echo",
                "Sleeps, then echoes the label",
                ParameterSchema::new()
                    .required("label", ParamType::String, "Label to echo")
                    .required("delay_ms", ParamType::Integer, "How long to sleep"),
            ),
            |args| async move {
                let delay = args.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(args.get("label").cloned().unwrap_or(Value::Null))
            },
        )
        .unwrap();

    let client = ScriptedClient::new(vec![
        Step::Respond(vec![
            call("wait_then_echo", json!({"label": "slow", "delay_ms": 80})),
            call("wait_then_echo", json!({"label": "fast", "delay_ms": 0})),
        ]),
        Step::Respond(vec![ContentPart::text("ok")]),
    ]);
    let orchestrator = Orchestrator::new(client, Arc::new(registry), LoopSettings::default());

    let outcome = orchestrator
        .run("echo twice", &CancellationToken::new())
        .await
        .unwrap();

    let labels: Vec<Value> = response_payloads(&outcome.transcript.turns()[2])
        .into_iter()
        .map(|payload| payload["result"].clone())
        .collect();
    assert_eq!(labels, vec![json!("slow"), json!("fast")]);
}

#[tokio::test]
async fn sequential_dispatch_produces_the_same_turn() {
    let script = || {
        vec![
            Step::Respond(vec![
                call("get_min_scrabble_word_score", json!({"candidate": "Toves"})),
                call("get_min_scrabble_word_score", json!({"candidate": "Slithy"})),
            ]),
            Step::Respond(vec![ContentPart::text("done")]),
        ]
    };
    let sequential = LoopSettings {
        parallel_tool_calls: false,
        ..LoopSettings::default()
    };

    let parallel_outcome = Orchestrator::new(
        ScriptedClient::new(script()),
        scrabble_only(),
        LoopSettings::default(),
    )
    .run("score", &CancellationToken::new())
    .await
    .unwrap();
    let sequential_outcome =
        Orchestrator::new(ScriptedClient::new(script()), scrabble_only(), sequential)
            .run("score", &CancellationToken::new())
            .await
            .unwrap();

    assert_eq!(
        parallel_outcome.transcript.turns(),
        sequential_outcome.transcript.turns()
    );
}

#[tokio::test]
async fn unknown_tool_is_reported_back_and_loop_continues() {
    let client = ScriptedClient::new(vec![
        Step::Respond(vec![call("get_horoscope", json!({"sign": "Leo"}))]),
        Step::Respond(vec![ContentPart::text("I cannot read horoscopes.")]),
    ]);
    let orchestrator = Orchestrator::new(client.clone(), scrabble_only(), LoopSettings::default());

    let outcome = orchestrator
        .run("What is my horoscope?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.final_text, "I cannot read horoscopes.");
    assert_eq!(
        response_payloads(&outcome.transcript.turns()[2]),
        vec![json!({"args": {"sign": "Leo"}, "ok": false, "error": "unknown tool: get_horoscope"})]
    );
    assert!(!outcome.tool_calls[0].result.ok);
    assert_eq!(client.request_count(), 2);
}

#[tokio::test]
async fn invalid_arguments_are_reported_back() {
    let client = ScriptedClient::new(vec![
        Step::Respond(vec![call(
            "get_min_scrabble_word_score",
            json!({"candidate": 42}),
        )]),
        Step::Respond(vec![ContentPart::text("Sorry.")]),
    ]);
    let orchestrator = Orchestrator::new(client, scrabble_only(), LoopSettings::default());

    let outcome = orchestrator
        .run("Score the number 42", &CancellationToken::new())
        .await
        .unwrap();

    let payload = &response_payloads(&outcome.transcript.turns()[2])[0];
    assert_eq!(payload["ok"], false);
    assert_eq!(
        payload["error"],
        "argument 'candidate' must be string, got integer"
    );
}

#[tokio::test]
async fn call_ids_are_echoed_in_responses() {
    let client = ScriptedClient::new(vec![
        Step::Respond(vec![ContentPart::FunctionCall {
            name: "get_min_scrabble_word_score".into(),
            args: crate::support::args(json!({"candidate": "Yare"})),
            id: Some("call-1".into()),
            thought_signature: None,
        }]),
        Step::Respond(vec![ContentPart::text("7")]),
    ]);
    let orchestrator = Orchestrator::new(client, scrabble_only(), LoopSettings::default());

    let outcome = orchestrator
        .run("Score Yare", &CancellationToken::new())
        .await
        .unwrap();

    let ContentPart::FunctionResponse { id, .. } = &outcome.transcript.turns()[2].parts[0] else {
        panic!("expected a function response");
    };
    assert_eq!(id.as_deref(), Some("call-1"));
}
