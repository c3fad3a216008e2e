// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod http_client;
pub mod scrub;
pub mod traits;
pub mod types;

// ── Client implementations ──────────────────────────────────────────────────
pub mod gemini;

// ── Re-exports ──────────────────────────────────────────────────────────────
pub use gemini::{GeminiClient, ModelInfo};
pub use http_client::{build_http_client, build_http_client_with_timeout};
pub use scrub::{sanitize_api_error, scrub_secret_patterns};
pub use traits::{ModelClient, ModelRequest};
pub use types::{
    ContentPart, FinishReason, GenerationConfig, ModelResponse, RequestOptions, Role, TokenUsage,
    Turn,
};
