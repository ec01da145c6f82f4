//! Call lifecycle notifications (fire-and-forget webhook)

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    Status(u16),
}

/// Receives call lifecycle events.
///
/// Failures are reported to the caller, which only logs them.
#[async_trait]
pub trait CallNotifier: Send + Sync {
    async fn call_started(&self, call_id: &str) -> Result<(), NotifierError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallInfo {
    pub call_id: String,
    pub from_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEvent {
    pub event: &'static str,
    pub call: CallInfo,
}

impl CallEvent {
    pub fn started(call_id: impl Into<String>, from_number: impl Into<String>) -> Self {
        Self {
            event: "call_started",
            call: CallInfo {
                call_id: call_id.into(),
                from_number: from_number.into(),
            },
        }
    }
}

/// Webhook adapter posting call events as JSON
pub struct WebhookNotifier {
    url: String,
    from_number: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, from_number: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            from_number: from_number.into(),
            timeout: Duration::from_secs(5),
            client: reqwest::Client::new(),
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CallNotifier for WebhookNotifier {
    async fn call_started(&self, call_id: &str) -> Result<(), NotifierError> {
        let event = CallEvent::started(call_id, self.from_number.clone());

        debug!(call_id = %call_id, url = %self.url, "Sending call_started webhook");

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&event)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifierError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
