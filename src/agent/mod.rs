pub mod orchestrator;
pub mod retry;
pub mod transcript;

pub use orchestrator::{
    Exchange, ExchangeOutcome, ExchangeState, LoopSettings, Orchestrator, ToolCallRecord,
    response_payload,
};
pub use retry::{RetryPolicy, drive_with_retries};
pub use transcript::{ConversationTranscript, TranscriptError};
