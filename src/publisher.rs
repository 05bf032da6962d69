//! Posting aggregated state to the HTTP endpoint after every tick.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::PublishError;
use crate::sim::types::GridsState;

/// Destination for the per-tick aggregated state.
#[async_trait]
pub trait StatePublisher: Send + Sync {
    /// Publishes one tick's state.
    async fn publish(&self, state: &GridsState) -> Result<(), PublishError>;
}

/// Discards every state. Used when posting is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

#[async_trait]
impl StatePublisher for NullPublisher {
    async fn publish(&self, _state: &GridsState) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Posts `{"data": state}` as JSON to a fixed URL.
///
/// Transport errors and 5xx responses are retried up to `max_retries` extra
/// times with a fixed delay; other non-2xx responses fail immediately.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    url: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpPublisher {
    /// Creates a publisher with a per-request timeout.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self, PublishError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
            max_retries,
            retry_delay,
        })
    }

    /// Builds a publisher from the `[api]` section.
    pub fn from_config(api: &ApiConfig) -> Result<Self, PublishError> {
        Self::new(
            api.post_url.clone(),
            Duration::from_secs(api.timeout_secs),
            api.max_retries,
            Duration::from_millis(api.retry_delay_ms),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_once(&self, body: &serde_json::Value) -> Result<(), PublishError> {
        let response = self.client.post(&self.url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PublishError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl StatePublisher for HttpPublisher {
    async fn publish(&self, state: &GridsState) -> Result<(), PublishError> {
        let body = json!({ "data": serde_json::to_value(state)? });
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.post_once(&body).await {
                Ok(()) => {
                    debug!(url = %self.url, step = state.step, "published state");
                    return Ok(());
                }
                Err(e) if attempt <= self.max_retries && is_retryable(&e) => {
                    warn!(
                        url = %self.url,
                        attempt,
                        error = %e,
                        "publish failed, retrying in {:?}",
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Picks the publisher for the `[api]` section: HTTP when `post_url` is set,
/// otherwise [`NullPublisher`].
pub fn from_config(api: &ApiConfig) -> Result<Box<dyn StatePublisher>, PublishError> {
    if api.post_url.is_empty() {
        debug!("state posting disabled");
        return Ok(Box::new(NullPublisher));
    }
    Ok(Box::new(HttpPublisher::from_config(api)?))
}

fn is_retryable(e: &PublishError) -> bool {
    match e {
        PublishError::Http(_) => true,
        PublishError::Status { status, .. } => *status >= 500,
        PublishError::Encode(_) => false,
    }
}
