//! Shared types for upstream agent links.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::utils::UrlError;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur on an upstream link.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The configured upstream URL is unusable
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(#[from] UrlError),

    /// Handshake with the agent failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Handshake did not finish within the connect timeout
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// The link is not open for writing
    #[error("Not connected (link is {0})")]
    NotConnected(LinkState),

    /// Send failed on both the first attempt and the retry
    #[error("Delivery failed after retry: {0}")]
    DeliveryFailed(String),

    /// Outbound frame could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

// =============================================================================
// Link State
// =============================================================================

/// Lifecycle of an upstream link: Connecting -> Open -> Closing -> Closed.
/// A failed handshake goes straight from Connecting to Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Open => write!(f, "open"),
            LinkState::Closing => write!(f, "closing"),
            LinkState::Closed => write!(f, "closed"),
        }
    }
}

/// Process-unique identity of an upstream link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpstreamId(u64);

impl UpstreamId {
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        UpstreamId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UpstreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "up-{}", self.0)
    }
}

/// Why an upstream link ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed from our side (downstream left or shutdown)
    Local,
    /// The agent closed the socket
    Remote,
    /// The handshake never completed
    ConnectFailed(String),
    /// Transport error after the link was open
    Error(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Local => write!(f, "upstream link closed"),
            CloseReason::Remote => write!(f, "upstream agent closed the connection"),
            CloseReason::ConnectFailed(reason) => write!(f, "upstream unavailable: {reason}"),
            CloseReason::Error(reason) => write!(f, "upstream error: {reason}"),
        }
    }
}

// =============================================================================
// Event Sink
// =============================================================================

/// Receiver of link lifecycle and traffic events.
///
/// Events for one link are delivered sequentially from that link's task.
#[async_trait]
pub trait UpstreamEvents: Send + Sync {
    /// The handshake completed and the link accepts writes
    async fn on_open(&self, upstream_id: UpstreamId);

    /// A text frame arrived from the agent
    async fn on_message(&self, upstream_id: UpstreamId, text: &str);

    /// The link reached `Closed`; delivered exactly once per link
    async fn on_closed(&self, upstream_id: UpstreamId, reason: CloseReason);
}
