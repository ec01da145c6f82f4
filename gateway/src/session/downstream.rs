//! Handle to a downstream client connection.
//!
//! The socket is owned by the axum handler; sessions only hold this handle,
//! which queues frames for the handler's writer task and can ask the handler
//! to shut the connection down.

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::core::protocol::VoceraOutbound;

/// Frames routed to the downstream writer task
#[derive(Debug, Clone, PartialEq)]
pub enum DownstreamRoute {
    /// JSON text message
    Outgoing(VoceraOutbound),
    /// Close the connection with an optional reason
    Close(Option<String>),
}

#[derive(Debug, Clone)]
pub struct DownstreamHandle {
    sender: mpsc::Sender<DownstreamRoute>,
    closed: CancellationToken,
}

impl DownstreamHandle {
    pub fn new(sender: mpsc::Sender<DownstreamRoute>) -> Self {
        Self {
            sender,
            closed: CancellationToken::new(),
        }
    }

    /// Handle plus the receiving end for the writer task
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DownstreamRoute>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }

    /// Queue a frame; returns false once the connection is gone
    pub async fn send(&self, message: VoceraOutbound) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        self.sender
            .send(DownstreamRoute::Outgoing(message))
            .await
            .is_ok()
    }

    /// Close the connection. Only the first call queues a close frame.
    pub async fn close(&self, reason: impl Into<String>) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        self.closed.cancel();
        let reason = reason.into();
        debug!(reason = %reason, "Closing downstream connection");
        let _ = self.sender.send(DownstreamRoute::Close(Some(reason))).await;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once `close` has been called
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }
}
