use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use super::messages::{Action, InteractRequest, Trace};

#[derive(Debug, Error)]
pub enum InteractError {
    #[error("Interact request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Interact API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

pub type InteractResult<T> = Result<T, InteractError>;

/// Client for the `state/user/<id>/interact` REST endpoint
pub struct InteractClient {
    base_url: String,
    api_key: Zeroizing<String>,
    version_id: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl InteractClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: Zeroizing::new(api_key.into()),
            version_id: version_id.into(),
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interact_url(&self, user_id: &str) -> String {
        format!(
            "{}/state/user/{}/interact",
            self.base_url.trim_end_matches('/'),
            user_id
        )
    }

    /// Start a conversation for `user_id`
    pub async fn launch(&self, user_id: &str) -> InteractResult<Vec<Trace>> {
        self.interact(user_id, Action::Launch).await
    }

    /// Send one user utterance
    pub async fn send_text(&self, user_id: &str, text: &str) -> InteractResult<Vec<Trace>> {
        self.interact(
            user_id,
            Action::Text {
                payload: text.to_string(),
            },
        )
        .await
    }

    async fn interact(&self, user_id: &str, action: Action) -> InteractResult<Vec<Trace>> {
        let url = self.interact_url(user_id);
        debug!(user_id = %user_id, url = %url, action = ?action, "Interact request");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Authorization", self.api_key.as_str())
            .header("versionID", &self.version_id)
            .json(&InteractRequest { action })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InteractError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Vec<Trace>>().await?)
    }
}
