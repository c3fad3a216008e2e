use super::transcript::ConversationTranscript;
use crate::config::Config;
use crate::error::{ExchangeError, ModelError};
use crate::llm::traits::{ModelClient, ModelRequest};
use crate::llm::types::{ContentPart, FinishReason, ModelResponse, RequestOptions, Turn};
use crate::tools::{ToolDescriptor, ToolDispatcher, ToolRegistry, ToolResult};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use strum::{AsRefStr, Display};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ── Constants ────────────────────────────────────────────────────────────────

/// Absolute upper bound on model turns per exchange, regardless of settings.
pub(crate) const ITERATION_HARD_CAP: u32 = 64;

const DEFAULT_MAX_ITERATIONS: u32 = 10;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Public types ─────────────────────────────────────────────────────────────

/// Knobs for one orchestrator; shared by every exchange it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    /// Model turns allowed before the exchange fails. Clamped to
    /// `1..=ITERATION_HARD_CAP`.
    pub max_iterations: u32,
    pub request_timeout: Duration,
    pub parallel_tool_calls: bool,
    pub options: RequestOptions,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            parallel_tool_calls: true,
            options: RequestOptions::default(),
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.exchange.max_iterations,
            request_timeout: Duration::from_secs(config.exchange.request_timeout_secs),
            parallel_tool_calls: config.exchange.parallel_tool_calls,
            options: RequestOptions {
                system_instruction: config.exchange.system_instruction.clone(),
                generation_config: config.generation_config(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, Serialize, Deserialize)]
pub enum ExchangeState {
    AwaitingModel,
    ExecutingTools,
    Done,
    Failed,
}

impl ExchangeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Record of a single tool invocation within the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub args: Map<String, Value>,
    pub result: ToolResult,
    /// Model turn (1-based) that requested the call.
    pub iteration: u32,
}

/// Final output of a completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeOutcome {
    pub exchange_id: Uuid,
    pub final_text: String,
    pub transcript: ConversationTranscript,
    pub iterations: u32,
    pub tool_calls: Vec<ToolCallRecord>,
    pub finish_reason: FinishReason,
    pub tokens_used: Option<u64>,
    pub model_version: Option<String>,
}

/// Runs function-calling exchanges against one model client and one
/// registry. Cheap to clone; concurrent exchanges share only the read-only
/// registry.
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    dispatcher: ToolDispatcher,
    catalogue: Arc<[ToolDescriptor]>,
    settings: Arc<LoopSettings>,
}

/// One exchange in progress. Created by [`Orchestrator::start`] and advanced
/// with [`Exchange::drive`].
pub struct Exchange {
    orchestrator: Orchestrator,
    id: Uuid,
    transcript: ConversationTranscript,
    state: ExchangeState,
    iterations: u32,
    tool_calls: Vec<ToolCallRecord>,
    finish_reason: FinishReason,
    total_tokens: u64,
    has_token_info: bool,
    model_version: Option<String>,
}

// ── Implementation ───────────────────────────────────────────────────────────

impl Orchestrator {
    pub fn new(
        client: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        mut settings: LoopSettings,
    ) -> Self {
        settings.max_iterations = settings.max_iterations.clamp(1, ITERATION_HARD_CAP);
        let catalogue: Arc<[ToolDescriptor]> = registry.catalogue().into();
        Self {
            client,
            dispatcher: ToolDispatcher::new(registry),
            catalogue,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Begin an exchange seeded with `prompt`. Nothing is sent until the
    /// exchange is driven.
    pub fn start(&self, prompt: impl Into<String>) -> Exchange {
        let id = Uuid::new_v4();
        let prompt = prompt.into();
        tracing::info!(
            exchange = %id,
            client = self.client.name(),
            tools = self.catalogue.len(),
            "Starting exchange"
        );
        tracing::debug!(exchange = %id, prompt = prompt.as_str(), "User prompt");

        Exchange {
            orchestrator: self.clone(),
            id,
            transcript: ConversationTranscript::with_prompt(prompt),
            state: ExchangeState::AwaitingModel,
            iterations: 0,
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Unspecified,
            total_tokens: 0,
            has_token_info: false,
            model_version: None,
        }
    }

    /// Start an exchange and drive it to completion.
    pub async fn run(
        &self,
        prompt: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        self.start(prompt).drive(cancel).await
    }
}

impl Exchange {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn transcript(&self) -> &ConversationTranscript {
        &self.transcript
    }

    /// Advance the exchange until it finishes or fails.
    ///
    /// A transport failure leaves the exchange awaiting the model with the
    /// transcript untouched, so calling `drive` again retries the same
    /// request. Every other error is terminal.
    pub async fn drive(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        if self.state.is_terminal() {
            return Err(ExchangeError::Finished);
        }

        loop {
            if cancel.is_cancelled() {
                return Err(self.fail(ExchangeError::Cancelled));
            }

            match self.state {
                ExchangeState::AwaitingModel => {
                    let limit = self.orchestrator.settings.max_iterations;
                    if self.iterations >= limit {
                        return Err(self.fail(ExchangeError::IterationLimitExceeded { limit }));
                    }

                    let response = match self.request_model_turn(cancel).await {
                        Ok(response) => response,
                        Err(ExchangeError::Model(err)) if err.is_transport() => {
                            tracing::warn!(
                                exchange = %self.id,
                                iteration = self.iterations + 1,
                                error = %err,
                                "Model request failed; exchange can be retried"
                            );
                            return Err(err.into());
                        }
                        Err(err) => return Err(self.fail(err)),
                    };

                    if let Some(outcome) = self.record_model_turn(response)? {
                        return Ok(outcome);
                    }
                }
                ExchangeState::ExecutingTools => {
                    let tool_turn = self.execute_pending_calls().await;
                    if let Err(err) = self.transcript.append(tool_turn) {
                        return Err(self.fail(ModelError::protocol(err.to_string()).into()));
                    }
                    self.state = ExchangeState::AwaitingModel;
                }
                ExchangeState::Done | ExchangeState::Failed => {
                    return Err(ExchangeError::Finished);
                }
            }
        }
    }

    /// One outbound call under the per-call timeout, abandoned on cancel.
    async fn request_model_turn(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ModelResponse, ExchangeError> {
        let orchestrator = &self.orchestrator;
        let request = ModelRequest {
            transcript: &self.transcript,
            tools: &orchestrator.catalogue,
            options: &orchestrator.settings.options,
        };
        let timeout = orchestrator.settings.request_timeout;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ExchangeError::Cancelled),
            result = tokio::time::timeout(timeout, orchestrator.client.send(request)) => match result {
                Ok(response) => response.map_err(ExchangeError::from),
                Err(_) => Err(ModelError::timeout(format!(
                    "no model response within {}s",
                    timeout.as_secs_f32()
                ))
                .into()),
            },
        }
    }

    /// Append the model turn. Returns the outcome when the turn is final.
    fn record_model_turn(
        &mut self,
        response: ModelResponse,
    ) -> Result<Option<ExchangeOutcome>, ExchangeError> {
        self.iterations += 1;
        if let Some(usage) = response.usage {
            self.total_tokens += usage.total();
            self.has_token_info = true;
        }
        if response.model_version.is_some() {
            self.model_version = response.model_version;
        }
        self.finish_reason = response.finish_reason;

        let turn = Turn::model(response.parts);
        let calls = turn.function_calls().count();
        tracing::info!(
            exchange = %self.id,
            iteration = self.iterations,
            function_calls = calls,
            finish_reason = self.finish_reason.as_wire(),
            "Model turn received"
        );

        if let Err(err) = self.transcript.append(turn) {
            return Err(self.fail(ModelError::protocol(err.to_string()).into()));
        }

        if calls == 0 {
            self.state = ExchangeState::Done;
            return Ok(Some(self.take_outcome()));
        }

        let limit = self.orchestrator.settings.max_iterations;
        if self.iterations >= limit {
            return Err(self.fail(ExchangeError::IterationLimitExceeded { limit }));
        }

        self.state = ExchangeState::ExecutingTools;
        Ok(None)
    }

    /// Invoke every call of the last model turn and build the answering
    /// tool turn, in call order.
    async fn execute_pending_calls(&mut self) -> Turn {
        let calls: Vec<(String, Map<String, Value>, Option<String>)> = self
            .transcript
            .last()
            .map(|turn| {
                turn.function_calls()
                    .filter_map(|part| match part {
                        ContentPart::FunctionCall { name, args, id, .. } => {
                            Some((name.clone(), args.clone(), id.clone()))
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let dispatcher = &self.orchestrator.dispatcher;
        let exchange = self.id;
        let results: Vec<ToolResult> = if self.orchestrator.settings.parallel_tool_calls {
            join_all(
                calls
                    .iter()
                    .map(|(name, args, _)| invoke_logged(dispatcher, exchange, name, args)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for (name, args, _) in &calls {
                results.push(invoke_logged(dispatcher, exchange, name, args).await);
            }
            results
        };

        let mut parts = Vec::with_capacity(calls.len());
        for ((name, args, id), result) in calls.into_iter().zip(results) {
            parts.push(ContentPart::FunctionResponse {
                name: name.clone(),
                payload: response_payload(&args, &result),
                id,
            });
            self.tool_calls.push(ToolCallRecord {
                tool_name: name,
                args,
                result,
                iteration: self.iterations,
            });
        }
        Turn::tool(parts)
    }

    fn fail(&mut self, err: ExchangeError) -> ExchangeError {
        self.state = ExchangeState::Failed;
        tracing::warn!(
            exchange = %self.id,
            iteration = self.iterations,
            error = %err,
            "Exchange failed"
        );
        err
    }

    fn take_outcome(&mut self) -> ExchangeOutcome {
        let final_text = self.transcript.last().map(Turn::text).unwrap_or_default();
        tracing::info!(
            exchange = %self.id,
            iterations = self.iterations,
            tool_calls = self.tool_calls.len(),
            "Exchange complete"
        );

        ExchangeOutcome {
            exchange_id: self.id,
            final_text,
            transcript: std::mem::take(&mut self.transcript),
            iterations: self.iterations,
            tool_calls: std::mem::take(&mut self.tool_calls),
            finish_reason: self.finish_reason.clone(),
            tokens_used: self.has_token_info.then_some(self.total_tokens),
            model_version: self.model_version.clone(),
        }
    }
}

// ── Free functions ───────────────────────────────────────────────────────────

async fn invoke_logged(
    dispatcher: &ToolDispatcher,
    exchange: Uuid,
    name: &str,
    args: &Map<String, Value>,
) -> ToolResult {
    tracing::info!(exchange = %exchange, tool = name, "Invoking tool");
    let result = dispatcher.invoke(name, args).await;
    tracing::debug!(
        exchange = %exchange,
        tool = name,
        ok = result.ok,
        value = %result.value,
        "Tool result"
    );
    result
}

/// `content` object of a FunctionResponse: the call's own args plus the
/// outcome under `result` or `error`.
pub fn response_payload(args: &Map<String, Value>, result: &ToolResult) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("args".into(), Value::Object(args.clone()));
    payload.insert("ok".into(), Value::Bool(result.ok));
    let key = if result.ok { "result" } else { "error" };
    payload.insert(key.into(), result.value.clone());
    payload
}

// ── Tests ────────────────────────────────────────────────────────────────────
