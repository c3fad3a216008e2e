use super::traits::{FnTool, Tool};
use super::types::ToolDescriptor;
use crate::error::ToolError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// One descriptor bound to one implementation. The descriptor is captured at
/// registration time and never re-read from the tool.
#[derive(Clone)]
pub struct ToolRegistration {
    pub descriptor: ToolDescriptor,
    pub tool: Arc<dyn Tool>,
}

impl std::fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Closed set of callable tools, keyed by name.
///
/// Built once at startup and then shared behind an `Arc`, which leaves no way
/// to mutate it while an exchange is running.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    registrations: Vec<ToolRegistration>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is taken; the registry is left
    /// untouched in that case.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let descriptor = tool.descriptor();
        if self.index.contains_key(&descriptor.name) {
            return Err(ToolError::DuplicateTool {
                name: descriptor.name,
            });
        }

        tracing::debug!(tool = descriptor.name.as_str(), "Registered tool");
        self.index
            .insert(descriptor.name.clone(), self.registrations.len());
        self.registrations.push(ToolRegistration {
            descriptor,
            tool: Arc::from(tool),
        });
        Ok(())
    }

    /// Register an async closure under an explicit descriptor.
    pub fn register_fn<F, Fut>(
        &mut self,
        descriptor: ToolDescriptor,
        handler: F,
    ) -> Result<(), ToolError>
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(Box::new(FnTool::new(descriptor, handler)))
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Result<&ToolRegistration, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.registrations[i])
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Descriptors in registration order, as sent to the model.
    pub fn catalogue(&self) -> Vec<ToolDescriptor> {
        self.registrations
            .iter()
            .map(|registration| registration.descriptor.clone())
            .collect()
    }

    /// Registered tool names in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.registrations
            .iter()
            .map(|registration| registration.descriptor.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
