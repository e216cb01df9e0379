use crate::error::{ClientError, Result};
use crate::transport::Transport;
use formspool::FeedbackRecord;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// What counts as an acknowledgment from the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// Any response that arrives without a transport error.
    #[default]
    Transport,
    /// Only a `{"status":"success"}` body.
    Application,
}

impl FromStr for AckMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transport" => Ok(AckMode::Transport),
            "application" => Ok(AckMode::Application),
            other => Err(ClientError::Config(format!("unknown ack mode: {}", other))),
        }
    }
}

/// Upper bound on attempts per record. The delay doubles after each of the
/// first 16 attempts, so every schedule within this bound strictly grows.
pub const MAX_ATTEMPTS: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Sleep between attempt `attempt` (1-based) and the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

/// Deliver `record`, retrying with exponential backoff.
///
/// Returns the number of attempts used. After the final failed attempt the
/// last error is returned; there is no sleep after it.
pub async fn send_with_retry<T: Transport>(
    transport: &T,
    record: &FeedbackRecord,
    policy: &RetryPolicy,
) -> Result<u32> {
    let max = policy.max_attempts.clamp(1, MAX_ATTEMPTS);
    let mut attempt = 1;
    loop {
        match transport.deliver(record).await {
            Ok(()) => return Ok(attempt),
            Err(e) if attempt >= max => {
                tracing::warn!("[RETRY] giving up after {} attempts: {}", attempt, e);
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                tracing::info!(
                    "[RETRY] attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    max,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
