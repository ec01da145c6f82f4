//! Establishes and drives upstream agent connections.
//!
//! Each link runs in its own task: handshake under a timeout, then a
//! `tokio::select!` loop that forwards queued frames, delivers inbound frames
//! to the [`UpstreamEvents`] sink and answers transport pings.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::base::{CloseReason, UpstreamEvents, UpstreamResult};
use super::link::UpstreamLink;
use crate::core::notifier::CallNotifier;
use crate::utils::session_upstream_url;

/// Capacity of the per-link writer queue
const WS_CHANNEL_CAPACITY: usize = 256;

/// Connection settings shared by every upstream link
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Agent WebSocket URL; the call id is appended when `append_call_id` is set
    pub base_url: String,
    pub append_call_id: bool,
    pub connect_timeout: Duration,
    /// Wait before the single send retry on a link that is not open yet
    pub send_retry_delay: Duration,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:8080/llm-websocket".to_string(),
            append_call_id: true,
            connect_timeout: Duration::from_millis(10_000),
            send_retry_delay: Duration::from_millis(1_000),
        }
    }
}

pub struct UpstreamConnector {
    settings: UpstreamSettings,
    notifier: Option<Arc<dyn CallNotifier>>,
    /// Every link task spawned by this connector
    tasks: TaskTracker,
}

impl UpstreamConnector {
    pub fn new(settings: UpstreamSettings) -> Self {
        Self {
            settings,
            notifier: None,
            tasks: TaskTracker::new(),
        }
    }

    /// Fire `call_started` through `notifier` whenever a link opens
    pub fn with_notifier(mut self, notifier: Arc<dyn CallNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn settings(&self) -> &UpstreamSettings {
        &self.settings
    }

    /// Create the link for `call_id` in the `Connecting` state without touching the network
    pub fn prepare(&self, call_id: &str) -> UpstreamResult<Arc<UpstreamLink>> {
        let url = session_upstream_url(
            &self.settings.base_url,
            call_id,
            self.settings.append_call_id,
        )?;
        Ok(Arc::new(UpstreamLink::new(
            url,
            self.settings.send_retry_delay,
        )))
    }

    /// Spawn the task that connects `link` and pumps its traffic
    pub fn spawn(
        &self,
        link: Arc<UpstreamLink>,
        call_id: String,
        events: Arc<dyn UpstreamEvents>,
    ) -> JoinHandle<()> {
        let connect_timeout = self.settings.connect_timeout;
        let notifier = self.notifier.clone();
        self.tasks.spawn(run_link(link, call_id, connect_timeout, notifier, events))
    }

    /// Number of link tasks still running
    pub fn active_links(&self) -> usize {
        self.tasks.len()
    }

    /// Wait until every spawned link task has finished, at most `limit`.
    ///
    /// Returns false if some tasks were still running when the limit expired.
    pub async fn wait_links_closed(&self, limit: Duration) -> bool {
        self.tasks.close();
        let finished = tokio::time::timeout(limit, self.tasks.wait()).await.is_ok();
        self.tasks.reopen();
        finished
    }
}

async fn run_link(
    link: Arc<UpstreamLink>,
    call_id: String,
    connect_timeout: Duration,
    notifier: Option<Arc<dyn CallNotifier>>,
    events: Arc<dyn UpstreamEvents>,
) {
    let upstream_id = link.id();
    info!(upstream_id = %upstream_id, call_id = %call_id, url = %link.url(), "Connecting to upstream agent");

    let handshake = tokio::time::timeout(connect_timeout, connect_async(link.url()));
    let ws_stream = tokio::select! {
        _ = link.cancelled() => {
            info!(upstream_id = %upstream_id, "Upstream closed before the handshake finished");
            link.mark_closed();
            events.on_closed(upstream_id, CloseReason::Local).await;
            return;
        }
        result = handshake => match result {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                error!(upstream_id = %upstream_id, call_id = %call_id, error = %e, "Upstream connection failed");
                link.mark_closed();
                events.on_closed(upstream_id, CloseReason::ConnectFailed(e.to_string())).await;
                return;
            }
            Err(_) => {
                error!(
                    upstream_id = %upstream_id,
                    call_id = %call_id,
                    timeout_ms = connect_timeout.as_millis() as u64,
                    "Upstream connection timed out"
                );
                link.mark_closed();
                events
                    .on_closed(
                        upstream_id,
                        CloseReason::ConnectFailed(format!("timed out after {connect_timeout:?}")),
                    )
                    .await;
                return;
            }
        }
    };

    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<Message>(WS_CHANNEL_CAPACITY);

    if !link.mark_open(tx) {
        // close() won the race against the handshake
        let _ = ws_sink.send(Message::Close(None)).await;
        link.mark_closed();
        events.on_closed(upstream_id, CloseReason::Local).await;
        return;
    }

    info!(upstream_id = %upstream_id, call_id = %call_id, "Upstream link open");

    if let Some(notifier) = notifier {
        let call_id = call_id.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.call_started(&call_id).await {
                warn!(call_id = %call_id, error = %e, "call_started notification failed");
            }
        });
    }

    events.on_open(upstream_id).await;

    let reason = loop {
        tokio::select! {
            _ = link.cancelled() => {
                let _ = ws_sink.send(Message::Close(None)).await;
                break CloseReason::Local;
            }

            // Handle outgoing messages
            Some(message) = rx.recv() => {
                if let Err(e) = ws_sink.send(message).await {
                    error!(upstream_id = %upstream_id, error = %e, "Failed to send upstream frame");
                    break CloseReason::Error(e.to_string());
                }
            }

            // Handle incoming messages
            frame = ws_stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!(upstream_id = %upstream_id, bytes = text.len(), "Upstream frame");
                    events.on_message(upstream_id, text.as_str()).await;
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                        error!(upstream_id = %upstream_id, error = %e, "Failed to send pong");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(upstream_id = %upstream_id, frame = ?frame, "Upstream closed by agent");
                    break CloseReason::Remote;
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(upstream_id = %upstream_id, bytes = data.len(), "Ignoring binary upstream frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(upstream_id = %upstream_id, error = %e, "Upstream WebSocket error");
                    break CloseReason::Error(e.to_string());
                }
                None => break CloseReason::Remote,
            }
        }
    };

    link.mark_closed();
    info!(upstream_id = %upstream_id, call_id = %call_id, reason = %reason, "Upstream link closed");
    events.on_closed(upstream_id, reason).await;
}
