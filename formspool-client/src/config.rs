use crate::error::{ClientError, Result};
use crate::queue::DEFAULT_QUEUE_KEY;
use crate::retry::{AckMode, RetryPolicy, MAX_ATTEMPTS};
use crate::transport::HttpTransport;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "client.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_id: String,
    pub endpoint: Option<String>,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub ack_mode: AckMode,
    pub request_timeout_secs: Option<u64>,
    pub queue_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            endpoint: None,
            max_attempts: 3,
            retry_base_ms: 1000,
            ack_mode: AckMode::Transport,
            request_timeout_secs: None,
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load `{dir}/client.json`, or fall back to `FORMSPOOL_*` environment
    /// variables when the file is missing or unreadable.
    pub fn load_or_default(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<ClientConfig>(&content) {
                    Ok(config) => {
                        tracing::info!(
                            "Loaded client config: client_id={}, endpoint={:?}",
                            config.client_id,
                            config.endpoint
                        );
                        return config;
                    }
                    Err(e) => {
                        tracing::error!("Failed to parse {}: {}, using defaults", CONFIG_FILE, e);
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read {}: {}, using defaults", CONFIG_FILE, e);
                }
            }
        }

        Self::from_env()
    }

    /// Optional: FORMSPOOL_ENDPOINT, FORMSPOOL_MAX_ATTEMPTS,
    /// FORMSPOOL_RETRY_BASE_MS, FORMSPOOL_ACK_MODE,
    /// FORMSPOOL_REQUEST_TIMEOUT_SECS, FORMSPOOL_QUEUE_KEY
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            client_id: std::env::var("FORMSPOOL_CLIENT_ID").unwrap_or(defaults.client_id),
            endpoint: std::env::var("FORMSPOOL_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            max_attempts: env_or("FORMSPOOL_MAX_ATTEMPTS", defaults.max_attempts),
            retry_base_ms: env_or("FORMSPOOL_RETRY_BASE_MS", defaults.retry_base_ms),
            ack_mode: env_or("FORMSPOOL_ACK_MODE", defaults.ack_mode),
            request_timeout_secs: std::env::var("FORMSPOOL_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|secs: &u64| *secs > 0),
            queue_key: std::env::var("FORMSPOOL_QUEUE_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.queue_key),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.clamp(1, MAX_ATTEMPTS),
            base_delay: Duration::from_millis(self.retry_base_ms),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn transport(&self) -> Result<HttpTransport> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            ClientError::Config("no endpoint configured (set FORMSPOOL_ENDPOINT)".into())
        })?;
        HttpTransport::new(
            endpoint,
            self.ack_mode,
            self.request_timeout(),
            &self.client_id,
        )
    }
}

fn default_client_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("Ignoring invalid {}={:?}", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}
