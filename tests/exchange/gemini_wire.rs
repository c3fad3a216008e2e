use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use toolweave::agent::{LoopSettings, Orchestrator};
use toolweave::llm::GeminiClient;
use toolweave::tools::ToolRegistry;
use toolweave::tools::builtin::ScrabbleScoreTool;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Replies with each body in turn, repeating the last one.
struct Sequence {
    bodies: Vec<Value>,
    next: AtomicUsize,
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let body = &self.bodies[index.min(self.bodies.len() - 1)];
        ResponseTemplate::new(200).set_body_json(body)
    }
}

#[tokio::test]
async fn gemini_exchange_sends_tool_results_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(Sequence {
            bodies: vec![
                json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [{
                            "functionCall": {
                                "name": "get_min_scrabble_word_score",
                                "args": {"candidate": "Wabe"}
                            }
                        }]},
                        "finishReason": "STOP"
                    }],
                    "usageMetadata": {"promptTokenCount": 40, "candidatesTokenCount": 5, "totalTokenCount": 45}
                }),
                json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [{"text": "Wabe scores 9."}]},
                        "finishReason": "STOP"
                    }],
                    "usageMetadata": {"promptTokenCount": 60, "candidatesTokenCount": 4, "totalTokenCount": 64},
                    "modelVersion": "gemini-2.5-flash-001"
                }),
            ],
            next: AtomicUsize::new(0),
        })
        .expect(2)
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key", "gemini-2.5-flash").with_base_url(server.uri());
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ScrabbleScoreTool::new())).unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(client),
        Arc::new(registry),
        LoopSettings::default(),
    );

    let outcome = orchestrator
        .run("What is the scrabble score of Wabe?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.final_text, "Wabe scores 9.");
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.tokens_used, Some(109));
    assert_eq!(outcome.model_version.as_deref(), Some("gemini-2.5-flash-001"));

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);

    let first: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(first["contents"].as_array().unwrap().len(), 1);
    assert_eq!(
        first["tools"][0]["functionDeclarations"][0]["name"],
        "get_min_scrabble_word_score"
    );

    let second: Value = serde_json::from_slice(&received[1].body).unwrap();
    let contents = second["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[2]["role"], "tool");
    let response = &contents[2]["parts"][0]["functionResponse"];
    assert_eq!(response["name"], "get_min_scrabble_word_score");
    assert_eq!(response["response"]["content"]["result"], 9);
    assert_eq!(response["response"]["content"]["args"]["candidate"], "Wabe");
}
