//! Shared application state

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

use crate::config::ServerConfig;
use crate::core::interact::InteractClient;
use crate::core::notifier::WebhookNotifier;
use crate::core::translator::Translator;
use crate::core::upstream::UpstreamConnector;
use crate::session::SessionCoordinator;

pub struct AppState {
    pub config: ServerConfig,
    pub coordinator: Arc<SessionCoordinator>,
    /// Present only when the interact route is configured
    pub interact: Option<Arc<InteractClient>>,
    /// WebSocket connections holding a slot, on every route
    active_connections: AtomicUsize,
}

/// A reserved connection slot, released when dropped.
///
/// The limit middleware reserves it before the upgrade and the socket task
/// holds it until the connection ends.
pub struct ConnectionSlot {
    state: Arc<AppState>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.active_connections.fetch_sub(1, Ordering::AcqRel);
    }
}

impl AppState {
    /// Wire the coordinator, connector and optional collaborators from `config`
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, String> {
        let mut connector = UpstreamConnector::new(config.upstream_settings());

        if let Some(webhook_url) = config.webhook_target()? {
            info!(url = %webhook_url, "call_started webhook enabled");
            connector = connector.with_notifier(Arc::new(WebhookNotifier::new(
                webhook_url,
                config.webhook_from_number.clone(),
            )));
        }

        let coordinator = SessionCoordinator::new(connector, Translator::new(config.protocol));

        let interact = match config.interact_api_key.as_deref() {
            Some(api_key) if config.has_interact() => {
                info!(base_url = %config.interact_base_url, "Interact route enabled");
                Some(Arc::new(InteractClient::new(
                    config.interact_base_url.clone(),
                    api_key,
                    config.interact_version_id.clone(),
                )))
            }
            _ => None,
        };

        Ok(Arc::new(Self {
            config,
            coordinator,
            interact,
            active_connections: AtomicUsize::new(0),
        }))
    }

    /// Reserve a connection slot, or `None` when `max_sessions` slots are taken
    pub fn try_acquire_connection(self: &Arc<Self>) -> Option<ConnectionSlot> {
        let max = self.config.max_sessions.unwrap_or(usize::MAX);
        self.active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < max).then_some(active + 1)
            })
            .ok()?;
        Some(ConnectionSlot {
            state: self.clone(),
        })
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }
}
