use reqwest::Client;
use std::time::Duration;

/// Timeout for model calls when no exchange setting is supplied.
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 120;

fn default_user_agent() -> String {
    format!("toolweave/{}", env!("CARGO_PKG_VERSION"))
}

pub fn build_http_client() -> Client {
    build_http_client_with_timeout(DEFAULT_MODEL_TIMEOUT_SECS)
}

/// Shared client for model and tool lookups. A zero timeout falls back to
/// the model default instead of disabling the limit.
pub fn build_http_client_with_timeout(timeout_secs: u64) -> Client {
    let timeout_secs = if timeout_secs == 0 {
        DEFAULT_MODEL_TIMEOUT_SECS
    } else {
        timeout_secs
    };

    Client::builder()
        .user_agent(default_user_agent())
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to a default HTTP client");
            Client::new()
        })
}
