#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod agent;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod scenario;
pub mod tools;

pub use agent::{ConversationTranscript, Exchange, ExchangeOutcome, LoopSettings, Orchestrator};
pub use config::Config;
pub use error::{ExchangeError, ModelError, ToolError, WeaveError};
pub use llm::{GeminiClient, ModelClient};
pub use tools::{ToolDispatcher, ToolRegistry};
