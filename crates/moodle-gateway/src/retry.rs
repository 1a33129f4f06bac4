use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::call::ToolCall;
use crate::error::GatewayError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_BACKOFF_MS: u64 = 500;

/// Caller-side retry with exponential backoff.
///
/// Only network failures of read-only calls are retried. A mutating call is
/// attempted once: a timed-out write may already have been applied upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
        }
    }

    pub fn should_retry(&self, call: &ToolCall, err: &GatewayError, attempt: u32) -> bool {
        !call.is_mutating && err.kind.is_transient() && attempt < self.max_attempts
    }

    /// Delay before attempt `attempt + 1` (attempts are 1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `op` until it succeeds, fails permanently or attempts run out.
    pub async fn run<F, Fut>(&self, call: &ToolCall, mut op: F) -> Result<Value, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, GatewayError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(call, &err, attempt) => {
                    let backoff = self.backoff(attempt);
                    tracing::info!(
                        function = %call.function_name,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retrying upstream call"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
