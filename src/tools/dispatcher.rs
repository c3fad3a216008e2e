use super::registry::ToolRegistry;
use super::types::{ParameterSchema, ToolResult, json_type_name};
use crate::error::ToolError;
use crate::llm::scrub_secret_patterns;
use futures_util::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Validates and executes single function calls against a shared registry.
///
/// `invoke` never fails: every problem (unknown name, bad arguments, an
/// error or panic inside the tool) comes back as a failed [`ToolResult`] so
/// the model can see it and react.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub async fn invoke(&self, name: &str, args: &Map<String, Value>) -> ToolResult {
        match self.try_invoke(name, args).await {
            Ok(value) => ToolResult::success(value),
            Err(err) => {
                tracing::warn!(tool = name, error = %err, "Tool call failed");
                ToolResult::failure(failure_description(err))
            }
        }
    }

    async fn try_invoke(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let registration = self.registry.lookup(name)?;
        validate_args(&registration.descriptor.parameters, args).map_err(|message| {
            ToolError::SchemaValidation {
                tool: name.to_string(),
                message,
            }
        })?;

        let started = Instant::now();
        let tool = Arc::clone(&registration.tool);
        // The call sits inside the async block so a panic raised while
        // building the future is caught as well.
        let outcome = AssertUnwindSafe(async move { tool.execute(args).await })
            .catch_unwind()
            .await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(Ok(value)) => {
                tracing::debug!(tool = name, elapsed_ms, "Tool call succeeded");
                Ok(value)
            }
            // Tool errors reach the model and the logs; strip credentials first.
            Ok(Err(err)) => Err(ToolError::Execution {
                tool: name.to_string(),
                message: scrub_secret_patterns(&format!("{err:#}")).into_owned(),
            }),
            Err(panic) => Err(ToolError::Execution {
                tool: name.to_string(),
                message: scrub_secret_patterns(&format!(
                    "panicked: {}",
                    panic_message(panic.as_ref())
                ))
                .into_owned(),
            }),
        }
    }
}

/// Unknown names keep the bare `unknown tool: <name>` wording the model sees;
/// everything else uses the error's own description.
fn failure_description(err: ToolError) -> String {
    match err {
        ToolError::SchemaValidation { message, .. } => message,
        other => other.to_string(),
    }
}

/// Check `args` against the declared schema. Undeclared properties pass
/// through untouched; a null optional property counts as absent.
pub fn validate_args(schema: &ParameterSchema, args: &Map<String, Value>) -> Result<(), String> {
    let mut problems = Vec::new();

    for (name, spec) in &schema.properties {
        match args.get(name) {
            None | Some(Value::Null) if spec.required => {
                problems.push(format!("missing required argument '{name}'"));
            }
            None | Some(Value::Null) => {}
            Some(value) if !spec.kind.matches(value) => problems.push(format!(
                "argument '{name}' must be {}, got {}",
                spec.kind,
                json_type_name(value)
            )),
            Some(_) => {}
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
