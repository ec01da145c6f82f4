//! Handle to one upstream agent connection.
//!
//! The socket itself lives in the connector task; the link is the shared
//! handle used to observe its state, queue outbound frames and request a close.

use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use super::base::{LinkState, UpstreamError, UpstreamId, UpstreamResult};

pub struct UpstreamLink {
    id: UpstreamId,
    url: String,
    state: RwLock<LinkState>,
    /// Writer queue into the connector task, present only while open
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    shutdown: CancellationToken,
    retry_delay: Duration,
}

impl UpstreamLink {
    pub fn new(url: impl Into<String>, retry_delay: Duration) -> Self {
        Self {
            id: UpstreamId::next(),
            url: url.into(),
            state: RwLock::new(LinkState::Connecting),
            outbound: Mutex::new(None),
            shutdown: CancellationToken::new(),
            retry_delay,
        }
    }

    pub fn id(&self) -> UpstreamId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    pub fn is_open(&self) -> bool {
        self.state() == LinkState::Open
    }

    /// Resolves once a close has been requested
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }

    /// Move Connecting -> Open and install the writer queue.
    ///
    /// Returns false when a close was requested during the handshake.
    pub(crate) fn mark_open(&self, sender: mpsc::Sender<Message>) -> bool {
        let mut state = self.state.write();
        if *state != LinkState::Connecting {
            return false;
        }
        *state = LinkState::Open;
        *self.outbound.lock() = Some(sender);
        true
    }

    pub(crate) fn mark_closed(&self) {
        let mut state = self.state.write();
        *state = LinkState::Closed;
        self.outbound.lock().take();
    }

    /// Request the link to close. Only the first call has an effect.
    pub fn close(&self) -> bool {
        {
            let mut state = self.state.write();
            match *state {
                LinkState::Closing | LinkState::Closed => return false,
                LinkState::Connecting | LinkState::Open => *state = LinkState::Closing,
            }
            self.outbound.lock().take();
        }
        self.shutdown.cancel();
        debug!(upstream_id = %self.id, "Upstream close requested");
        true
    }

    /// Serialize and send a frame
    pub async fn send_json<T: Serialize>(&self, message: &T) -> UpstreamResult<()> {
        let payload = serde_json::to_string(message)?;
        self.send(payload).await
    }

    /// Queue a text frame for the agent.
    ///
    /// A link that is still connecting gets one more chance after the retry
    /// delay; a second failure is reported as [`UpstreamError::DeliveryFailed`].
    /// Any other failure (closing, closed, full queue) is reported at once.
    pub async fn send(&self, payload: String) -> UpstreamResult<()> {
        let payload = match self.try_send(payload) {
            Ok(()) => return Ok(()),
            Err((payload, UpstreamError::NotConnected(LinkState::Connecting))) => {
                debug!(
                    upstream_id = %self.id,
                    delay_ms = self.retry_delay.as_millis() as u64,
                    "Upstream still connecting, retrying send"
                );
                payload
            }
            Err((_, err)) => return Err(UpstreamError::DeliveryFailed(err.to_string())),
        };

        tokio::time::sleep(self.retry_delay).await;

        self.try_send(payload)
            .map_err(|(_, err)| UpstreamError::DeliveryFailed(err.to_string()))
    }

    fn try_send(&self, payload: String) -> Result<(), (String, UpstreamError)> {
        let state = self.state();
        let sender = match self.outbound.lock().clone() {
            Some(sender) if state == LinkState::Open => sender,
            _ => return Err((payload, UpstreamError::NotConnected(state))),
        };

        sender
            .try_send(Message::Text(payload.into()))
            .map_err(|err| match err {
                TrySendError::Full(message) => (
                    message.into_text().map(|t| t.as_str().to_owned()).unwrap_or_default(),
                    UpstreamError::ConnectionFailed("upstream write queue full".to_string()),
                ),
                TrySendError::Closed(message) => (
                    message.into_text().map(|t| t.as_str().to_owned()).unwrap_or_default(),
                    UpstreamError::NotConnected(LinkState::Closed),
                ),
            })
    }
}

impl std::fmt::Debug for UpstreamLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamLink")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}
