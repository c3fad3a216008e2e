use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `toolweave`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; tool implementations and application
/// glue continue to use `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum WeaveError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Tools ───────────────────────────────────────────────────────────
    #[error("tool: {0}")]
    Tool(#[from] ToolError),

    // ── Remote model ────────────────────────────────────────────────────
    #[error("model: {0}")]
    Model(#[from] ModelError),

    // ── Exchange loop ───────────────────────────────────────────────────
    #[error("exchange: {0}")]
    Exchange(#[from] ExchangeError),

    // ── Scenario payloads ───────────────────────────────────────────────
    #[error("scenario: {0}")]
    Scenario(#[from] ScenarioError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Tool errors ────────────────────────────────────────────────────────────

/// Failures local to one tool. Only `DuplicateTool` ever reaches a caller;
/// the dispatcher folds the rest into a failed `ToolResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("duplicate tool: {name}")]
    DuplicateTool { name: String },

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("invalid arguments for {tool}: {message}")]
    SchemaValidation { tool: String, message: String },

    #[error("tool {tool} failed: {message}")]
    Execution { tool: String, message: String },
}

// ─── Remote model errors ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The request never produced a usable HTTP response. Safe to retry with
    /// the same transcript.
    #[error("transport failure{}: {message}", status_suffix(.status))]
    Transport {
        message: String,
        status: Option<u16>,
        timed_out: bool,
    },

    /// The service answered with something the loop cannot interpret.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({code})")).unwrap_or_default()
}

impl ModelError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            timed_out: true,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Transport failures worth another attempt: timeouts, connection
    /// failures, 408, 429 and 5xx. Other 4xx statuses will not resolve.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status: None, .. } => true,
            Self::Transport {
                status: Some(code), ..
            } => *code == 408 || *code == 429 || *code >= 500,
            Self::Protocol(_) => false,
        }
    }
}

// ─── Exchange errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("no final answer after {limit} model turns")]
    IterationLimitExceeded { limit: u32 },

    #[error("exchange cancelled")]
    Cancelled,

    #[error("exchange already finished")]
    Finished,
}

impl ExchangeError {
    /// Whether driving the same exchange again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Model(err) if err.is_retryable())
    }
}

// ─── Scenario errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("no scenario files matching {pattern} in {dir}")]
    NotFound { dir: String, pattern: String },

    #[error("scenario {path} is invalid: {message}")]
    Invalid { path: String, message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, WeaveError>;
