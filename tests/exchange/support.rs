use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use toolweave::error::ModelError;
use toolweave::llm::types::{ContentPart, FinishReason, ModelResponse, Turn};
use toolweave::llm::{ModelClient, ModelRequest};

/// One scripted reply of the stub model.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(Vec<ContentPart>),
    Fail(ModelError),
    /// Never answers; used for timeout and cancellation.
    Hang,
}

/// Model client that replays a script and records every request.
#[derive(Debug)]
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    /// Reply once the script runs out; `None` means end with plain text.
    fallback: Option<Vec<ContentPart>>,
    seen: Mutex<Vec<Vec<Turn>>>,
    seen_tool_counts: Mutex<Vec<usize>>,
}

impl ScriptedClient {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::from(steps)),
            fallback: None,
            seen: Mutex::new(Vec::new()),
            seen_tool_counts: Mutex::new(Vec::new()),
        })
    }

    /// A model that requests the same call forever.
    pub fn looping(parts: Vec<ContentPart>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Some(parts),
            seen: Mutex::new(Vec::new()),
            seen_tool_counts: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn tool_counts(&self) -> Vec<usize> {
        self.seen_tool_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn send<'a>(
        &'a self,
        request: ModelRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ModelResponse, ModelError>> + Send + 'a>> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.transcript.turns().to_vec());
        self.seen_tool_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.tools.len());

        let turn_index = request.transcript.model_turn_count();
        let step = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| match &self.fallback {
                Some(parts) => Step::Respond(parts.clone()),
                None => Step::Respond(vec![ContentPart::text("done")]),
            });

        Box::pin(async move {
            match step {
                Step::Respond(parts) => Ok(ModelResponse::new(parts, FinishReason::Stop, turn_index)),
                Step::Fail(err) => Err(err),
                Step::Hang => std::future::pending().await,
            }
        })
    }
}

pub fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn call(name: &str, value: Value) -> ContentPart {
    ContentPart::function_call(name, args(value))
}

/// Payloads of the function responses in `turn`, in order.
pub fn response_payloads(turn: &Turn) -> Vec<Value> {
    turn.parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::FunctionResponse { payload, .. } => Some(Value::Object(payload.clone())),
            _ => None,
        })
        .collect()
}
