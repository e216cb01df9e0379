use crate::error::{ClientError, Result};
use crate::retry::AckMode;
use formspool::{FeedbackRecord, SubmitResponse};
use std::future::Future;
use std::time::Duration;

/// Something that can hand one record to the append endpoint.
pub trait Transport: Send + Sync {
    /// One delivery attempt. `Ok` means the record may leave the queue.
    fn deliver(&self, record: &FeedbackRecord) -> impl Future<Output = Result<()>> + Send;
}

/// reqwest-backed transport posting JSON to the endpoint URL.
pub struct HttpTransport {
    endpoint: String,
    ack_mode: AckMode,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        ack_mode: AckMode,
        timeout: Option<Duration>,
        client_id: &str,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "endpoint must be an http(s) URL: {}",
                endpoint
            )));
        }

        let mut builder = reqwest::Client::builder().user_agent(format!(
            "formspool-client/{} ({})",
            env!("CARGO_PKG_VERSION"),
            client_id
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            ack_mode,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    /// `GET` the endpoint's liveness check. Used to decide whether the
    /// client is online.
    pub async fn probe(&self) -> Result<()> {
        let response = self.http_client.get(&self.endpoint).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Http(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Transport for HttpTransport {
    async fn deliver(&self, record: &FeedbackRecord) -> Result<()> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await?;
        let status = response.status();

        match self.ack_mode {
            AckMode::Transport => {
                if !status.is_success() {
                    tracing::debug!(
                        "[TRANSPORT] {} answered {}, treated as delivered",
                        self.endpoint,
                        status
                    );
                }
                Ok(())
            }
            AckMode::Application => {
                let body = response.text().await?;
                match serde_json::from_str::<SubmitResponse>(&body) {
                    Ok(reply) if reply.is_success() => Ok(()),
                    Ok(reply) => Err(ClientError::Rejected {
                        status: status.as_u16(),
                        message: reply.message,
                    }),
                    Err(_) => Err(ClientError::Http(status.as_u16())),
                }
            }
        }
    }
}
