use super::types::{ParameterSchema, ToolDescriptor};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

/// Future returned by a tool invocation.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>>;

/// Core tool trait. Implement for any local operation the model may request.
pub trait Tool: Send + Sync {
    /// Tool name (used in model function calling)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Declared parameters
    fn parameters(&self) -> ParameterSchema;

    /// Execute with arguments the dispatcher has already validated.
    fn execute<'a>(&'a self, args: &'a Map<String, Value>) -> ToolFuture<'a>;

    /// Get the full descriptor for registration
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Adapter binding an explicit descriptor to an async closure.
pub struct FnTool<F> {
    descriptor: ToolDescriptor,
    handler: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    pub fn new(descriptor: ToolDescriptor, handler: F) -> Self {
        Self {
            descriptor,
            handler,
        }
    }
}

impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn parameters(&self) -> ParameterSchema {
        self.descriptor.parameters.clone()
    }

    fn execute<'a>(&'a self, args: &'a Map<String, Value>) -> ToolFuture<'a> {
        Box::pin((self.handler)(args.clone()))
    }

    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }
}
