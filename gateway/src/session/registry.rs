//! Session registry: the pairing between downstream sessions and upstream links.
//!
//! Lookups go both ways in O(1). Both indices sit behind a single lock so a
//! session is never visible through one index and missing from the other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use super::downstream::DownstreamHandle;
use crate::core::transcript::Turn;
use crate::core::translator::ConversationState;
use crate::core::upstream::{UpstreamId, UpstreamLink};

/// Identity of a session; also used as the call id towards the agent
pub type SessionId = String;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session {0} is already registered")]
    DuplicateSession(SessionId),

    #[error("Upstream link {0} is already paired")]
    DuplicateUpstream(UpstreamId),
}

/// One paired conversation
pub struct Session {
    id: SessionId,
    downstream: DownstreamHandle,
    upstream: Arc<UpstreamLink>,
    conversation: Mutex<ConversationState>,
    created_at: Instant,
}

impl Session {
    pub fn new(
        id: impl Into<SessionId>,
        downstream: DownstreamHandle,
        upstream: Arc<UpstreamLink>,
    ) -> Self {
        Self {
            id: id.into(),
            downstream,
            upstream,
            conversation: Mutex::new(ConversationState::new()),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn downstream(&self) -> &DownstreamHandle {
        &self.downstream
    }

    pub fn upstream(&self) -> &Arc<UpstreamLink> {
        &self.upstream
    }

    pub fn upstream_id(&self) -> UpstreamId {
        self.upstream.id()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Lock the conversation state for a read-modify-write
    pub async fn conversation(&self) -> MutexGuard<'_, ConversationState> {
        self.conversation.lock().await
    }

    /// Copy of the transcript so far
    pub async fn transcript(&self) -> Vec<Turn> {
        self.conversation.lock().await.transcript.turns().to_vec()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("upstream", &self.upstream)
            .finish()
    }
}

#[derive(Default)]
struct Indices {
    by_session: HashMap<SessionId, Arc<Session>>,
    by_upstream: HashMap<UpstreamId, SessionId>,
}

#[derive(Default)]
pub struct SessionRegistry {
    indices: RwLock<Indices>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a session from its two halves and register it
    pub fn create(
        &self,
        id: impl Into<SessionId>,
        downstream: DownstreamHandle,
        upstream: Arc<UpstreamLink>,
    ) -> Result<Arc<Session>, RegistryError> {
        let session = Arc::new(Session::new(id, downstream, upstream));
        self.insert(session.clone())?;
        Ok(session)
    }

    pub fn insert(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let mut indices = self.indices.write();
        if indices.by_session.contains_key(session.id()) {
            return Err(RegistryError::DuplicateSession(session.id.clone()));
        }
        if indices.by_upstream.contains_key(&session.upstream_id()) {
            return Err(RegistryError::DuplicateUpstream(session.upstream_id()));
        }
        indices
            .by_upstream
            .insert(session.upstream_id(), session.id.clone());
        indices.by_session.insert(session.id.clone(), session);
        Ok(())
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.indices.read().by_session.get(session_id).cloned()
    }

    pub fn get_by_upstream(&self, upstream_id: UpstreamId) -> Option<Arc<Session>> {
        let indices = self.indices.read();
        indices
            .by_upstream
            .get(&upstream_id)
            .and_then(|session_id| indices.by_session.get(session_id))
            .cloned()
    }

    /// Remove a session; `None` when it was already gone
    pub fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        let mut indices = self.indices.write();
        let session = indices.by_session.remove(session_id)?;
        indices.by_upstream.remove(&session.upstream_id());
        Some(session)
    }

    pub fn remove_by_upstream(&self, upstream_id: UpstreamId) -> Option<Arc<Session>> {
        let mut indices = self.indices.write();
        let session_id = indices.by_upstream.remove(&upstream_id)?;
        indices.by_session.remove(&session_id)
    }

    pub fn len(&self) -> usize {
        self.indices.read().by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every session
    pub fn drain(&self) -> Vec<Arc<Session>> {
        let mut indices = self.indices.write();
        indices.by_upstream.clear();
        indices.by_session.drain().map(|(_, session)| session).collect()
    }
}
