//! Lifecycle coordinator: wires connection events on both sides to the
//! registry, the translator and the cascading closes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::downstream::DownstreamHandle;
use super::registry::{RegistryError, Session, SessionRegistry};
use crate::core::protocol::{RetellInbound, VoceraInbound};
use crate::core::translator::{Outbound, Translator};
use crate::core::upstream::{
    CloseReason, UpstreamConnector, UpstreamError, UpstreamEvents, UpstreamId,
};

/// Close reason sent to every client when the gateway stops
pub const SHUTDOWN_REASON: &str = "gateway shutting down";

/// How long shutdown waits for upstream links to finish their close handshake
const LINK_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub struct SessionCoordinator {
    registry: SessionRegistry,
    connector: UpstreamConnector,
    translator: Translator,
}

impl SessionCoordinator {
    pub fn new(connector: UpstreamConnector, translator: Translator) -> Arc<Self> {
        Arc::new(Self {
            registry: SessionRegistry::new(),
            connector,
            translator,
        })
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Register a new downstream connection and start its upstream link.
    ///
    /// The handshake runs in the background; the returned session accepts
    /// messages immediately.
    pub fn on_downstream_connect(
        self: &Arc<Self>,
        downstream: DownstreamHandle,
    ) -> Result<Arc<Session>, CoordinatorError> {
        let call_id = Uuid::new_v4().to_string();
        let link = self.connector.prepare(&call_id)?;
        let session = self
            .registry
            .create(call_id.clone(), downstream, link.clone())?;

        info!(
            session_id = %call_id,
            upstream_id = %link.id(),
            url = %link.url(),
            "Session created"
        );

        let events: Arc<dyn UpstreamEvents> = self.clone();
        self.connector.spawn(link, call_id, events);
        Ok(session)
    }

    /// Translate a client frame and forward it to the agent
    pub async fn on_downstream_message(&self, session: &Session, text: &str) {
        let inbound: VoceraInbound = match serde_json::from_str(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "Dropping malformed downstream message");
                return;
            }
        };

        let outbound = {
            let mut conversation = session.conversation().await;
            self.translator
                .downstream_to_upstream(&mut conversation, &inbound)
        };

        let Some(outbound) = outbound else {
            debug!(session_id = %session.id(), "Ignoring empty downstream message");
            return;
        };

        if let Err(e) = session.upstream().send_json(&outbound).await {
            error!(
                session_id = %session.id(),
                upstream_id = %session.upstream_id(),
                error = %e,
                "Dropping message for upstream agent"
            );
        }
    }

    /// Tear down the session of a departed client. Returns false if it was already gone.
    pub async fn on_downstream_disconnect(&self, session_id: &str) -> bool {
        let Some(session) = self.registry.remove(session_id) else {
            debug!(session_id = %session_id, "Downstream disconnect for unknown session");
            return false;
        };

        session.upstream().close();
        info!(
            session_id = %session_id,
            upstream_id = %session.upstream_id(),
            "Session ended by downstream client"
        );
        true
    }

    /// Tear down the session whose upstream link ended. Returns false if it was already gone.
    pub async fn on_upstream_closed(&self, upstream_id: UpstreamId, reason: &CloseReason) -> bool {
        let Some(session) = self.registry.remove_by_upstream(upstream_id) else {
            debug!(upstream_id = %upstream_id, "Upstream closed for unknown session");
            return false;
        };

        info!(
            session_id = %session.id(),
            upstream_id = %upstream_id,
            reason = %reason,
            "Session ended by upstream"
        );
        session.downstream().close(reason.to_string()).await;
        true
    }

    /// Close every session, upstream first, and wait for the link tasks to finish
    pub async fn shutdown(&self) {
        let sessions = self.registry.drain();
        info!(sessions = sessions.len(), "Closing all sessions");
        for session in sessions {
            session.upstream().close();
            session.downstream().close(SHUTDOWN_REASON).await;
        }

        if !self.connector.wait_links_closed(LINK_CLOSE_TIMEOUT).await {
            warn!(
                links = self.connector.active_links(),
                timeout_secs = LINK_CLOSE_TIMEOUT.as_secs(),
                "Upstream links still open after shutdown timeout"
            );
        }
    }
}

#[async_trait]
impl UpstreamEvents for SessionCoordinator {
    async fn on_open(&self, upstream_id: UpstreamId) {
        let Some(greeting) = self.translator.on_link_open() else {
            return;
        };
        let Some(session) = self.registry.get_by_upstream(upstream_id) else {
            return;
        };
        if let Err(e) = session.upstream().send_json(&greeting).await {
            error!(session_id = %session.id(), error = %e, "Failed to send link configuration");
        }
    }

    async fn on_message(&self, upstream_id: UpstreamId, text: &str) {
        let Some(session) = self.registry.get_by_upstream(upstream_id) else {
            debug!(upstream_id = %upstream_id, "Upstream frame for unknown session");
            return;
        };

        let inbound = match RetellInbound::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "Dropping malformed upstream message");
                return;
            }
        };
        debug!(session_id = %session.id(), kind = inbound.kind(), "Upstream message");

        let outbound = {
            let mut conversation = session.conversation().await;
            self.translator
                .upstream_to_downstream(&mut conversation, inbound)
        };

        match outbound {
            Some(Outbound::Downstream(message)) => {
                if !session.downstream().send(message).await {
                    debug!(session_id = %session.id(), "Downstream gone, dropping agent message");
                }
            }
            Some(Outbound::Upstream(reply)) => {
                if let Err(e) = session.upstream().send_json(&reply).await {
                    error!(session_id = %session.id(), error = %e, "Failed to answer upstream");
                }
            }
            None => {}
        }
    }

    async fn on_closed(&self, upstream_id: UpstreamId, reason: CloseReason) {
        self.on_upstream_closed(upstream_id, &reason).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::translator::ProtocolMode;
    use crate::core::upstream::{LinkState, UpstreamSettings};
    use crate::session::downstream::DownstreamRoute;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn unreachable_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}/llm-websocket")
    }

    fn coordinator(base_url: String) -> Arc<SessionCoordinator> {
        let connector = UpstreamConnector::new(UpstreamSettings {
            base_url,
            append_call_id: true,
            connect_timeout: Duration::from_millis(500),
            send_retry_delay: Duration::from_millis(20),
        });
        SessionCoordinator::new(connector, Translator::new(ProtocolMode::default()))
    }

    #[tokio::test]
    async fn test_connect_failure_closes_downstream() {
        let coordinator = coordinator(unreachable_url().await);
        let (handle, mut rx) = DownstreamHandle::channel(8);

        let session = coordinator.on_downstream_connect(handle).unwrap();
        let route = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();

        let DownstreamRoute::Close(Some(reason)) = route else {
            panic!("expected close route, got {route:?}");
        };
        assert!(reason.starts_with("upstream unavailable"));
        assert_eq!(coordinator.session_count(), 0);
        assert_eq!(session.upstream().state(), LinkState::Closed);
    }

    #[tokio::test]
    async fn test_downstream_disconnect_is_idempotent() {
        let coordinator = coordinator(unreachable_url().await);
        let (handle, _rx) = DownstreamHandle::channel(8);

        let session = coordinator.on_downstream_connect(handle).unwrap();
        assert!(coordinator.on_downstream_disconnect(session.id()).await);
        assert!(!coordinator.on_downstream_disconnect(session.id()).await);
        assert!(coordinator.registry().get(session.id()).is_none());
        assert!(
            coordinator
                .registry()
                .get_by_upstream(session.upstream_id())
                .is_none()
        );
        assert!(matches!(
            session.upstream().state(),
            LinkState::Closing | LinkState::Closed
        ));
    }

    #[tokio::test]
    async fn test_upstream_closed_for_unknown_session() {
        let coordinator = coordinator(unreachable_url().await);
        let (handle, _rx) = DownstreamHandle::channel(8);
        let session = coordinator.on_downstream_connect(handle).unwrap();
        coordinator.on_downstream_disconnect(session.id()).await;

        assert!(
            !coordinator
                .on_upstream_closed(session.upstream_id(), &CloseReason::Remote)
                .await
        );
    }

    #[tokio::test]
    async fn test_malformed_downstream_message_is_dropped() {
        let coordinator = coordinator(unreachable_url().await);
        let (handle, _rx) = DownstreamHandle::channel(8);
        let session = coordinator.on_downstream_connect(handle).unwrap();

        coordinator.on_downstream_message(&session, "not json").await;
        coordinator
            .on_downstream_message(&session, r#"{"content":"   "}"#)
            .await;
        assert!(session.transcript().await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let coordinator = coordinator(unreachable_url().await);
        let mut receivers = Vec::new();
        let mut sessions = Vec::new();
        for _ in 0..3 {
            let (handle, rx) = DownstreamHandle::channel(8);
            sessions.push(coordinator.on_downstream_connect(handle).unwrap());
            receivers.push(rx);
        }

        coordinator.shutdown().await;
        assert_eq!(coordinator.session_count(), 0);
        for session in &sessions {
            assert!(session.downstream().is_closed());
            assert_eq!(session.upstream().state(), LinkState::Closed);
        }
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_open_links() {
        use futures_util::StreamExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        let coordinator = coordinator(format!("ws://{addr}/llm-websocket"));
        let mut sessions = Vec::new();
        for _ in 0..2 {
            let (handle, _rx) = DownstreamHandle::channel(8);
            sessions.push(coordinator.on_downstream_connect(handle).unwrap());
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while !sessions.iter().all(|s| s.upstream().is_open()) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        coordinator.shutdown().await;
        for session in &sessions {
            assert_eq!(session.upstream().state(), LinkState::Closed);
        }
    }
}
