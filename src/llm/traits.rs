use super::types::{ModelResponse, RequestOptions};
use crate::agent::transcript::ConversationTranscript;
use crate::error::ModelError;
use crate::tools::ToolDescriptor;
use std::future::Future;
use std::pin::Pin;

/// Everything one outbound call carries. The transcript is always the full
/// history; the remote service keeps no session between calls.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub transcript: &'a ConversationTranscript,
    pub tools: &'a [ToolDescriptor],
    pub options: &'a RequestOptions,
}

pub trait ModelClient: Send + Sync {
    /// Client identifier (e.g. "gemini").
    fn name(&self) -> &str;

    /// Send the request and return the model's next turn.
    fn send<'a>(
        &'a self,
        request: ModelRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ModelResponse, ModelError>> + Send + 'a>>;
}
