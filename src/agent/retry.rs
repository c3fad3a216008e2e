use super::orchestrator::{Exchange, ExchangeOutcome};
use crate::config::ReliabilityConfig;
use crate::error::ExchangeError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAX_BACKOFF_MS: u64 = 10_000;

/// How often and how patiently a failed model request is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            base_backoff_ms,
        }
    }

    pub fn from_config(config: &ReliabilityConfig) -> Self {
        Self::new(config.transport_retries, config.retry_backoff_ms)
    }

    /// Delay before retry number `attempt` (0-based): doubles each time,
    /// capped at ten seconds.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
    }
}

/// Drive `exchange` to completion, re-driving it after retryable transport
/// failures. The exchange keeps its transcript between attempts, so every
/// retry resends the same history.
pub async fn drive_with_retries(
    exchange: &mut Exchange,
    cancel: &CancellationToken,
    policy: RetryPolicy,
) -> Result<ExchangeOutcome, ExchangeError> {
    let mut attempt = 0;
    loop {
        match exchange.drive(cancel).await {
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.backoff(attempt);
                attempt += 1;
                tracing::warn!(
                    exchange = %exchange.id(),
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Model request failed, retrying"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(ExchangeError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(err) if attempt > 0 && err.is_retryable() => {
                tracing::warn!(
                    exchange = %exchange.id(),
                    attempts = attempt + 1,
                    "Giving up after repeated transport failures"
                );
                return Err(err);
            }
            other => {
                if attempt > 0 && other.is_ok() {
                    tracing::info!(exchange = %exchange.id(), attempt, "Exchange recovered after retries");
                }
                return other;
            }
        }
    }
}
