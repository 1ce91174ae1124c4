//! Streaming session registry.
//!
//! A session exists from the moment its event stream is opened until the
//! stream is dropped. The registry maps session ids to the inbound queue of
//! the worker that serves that session. Deregistering cancels the session's
//! close token, after which nothing more is delivered or dispatched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use spaces_core::{AuthContext, SessionId};

use crate::rpc::RpcRequest;

/// A message posted to a session, with the credential resolved for it.
#[derive(Debug)]
pub struct InboundCall {
    pub request: RpcRequest,
    pub auth: AuthContext,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("session {0} has too many pending messages")]
    Busy(SessionId),
}

/// One open streaming session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    opened_at: DateTime<Utc>,
    inbound: mpsc::Sender<InboundCall>,
    auth: AuthContext,
    closed: CancellationToken,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Credential supplied when the stream was opened.
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Cancelled once the session is deregistered.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Queue a call for the session worker without waiting.
    pub fn deliver(&self, call: InboundCall) -> Result<(), SessionError> {
        if self.closed.is_cancelled() {
            return Err(SessionError::NotFound(self.id.clone()));
        }
        match self.inbound.try_send(call) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SessionError::Busy(self.id.clone())),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(SessionError::NotFound(self.id.clone()))
            }
        }
    }
}

/// Registry of open sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under a fresh id.
    pub fn register(&self, inbound: mpsc::Sender<InboundCall>, auth: AuthContext) -> Arc<Session> {
        loop {
            let id = SessionId::new();
            if let Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                let session = Arc::new(Session {
                    id,
                    opened_at: Utc::now(),
                    inbound,
                    auth,
                    closed: CancellationToken::new(),
                });
                slot.insert(Arc::clone(&session));
                return session;
            }
        }
    }

    pub fn lookup(&self, id: &SessionId) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Remove and close a session. Returns it if it was still registered.
    pub fn deregister(&self, id: &SessionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(id)?;
        session.closed.cancel();
        Some(session)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

/// Deregisters its session when dropped.
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: SessionId,
}

impl SessionGuard {
    pub fn new(registry: Arc<SessionRegistry>, id: SessionId) -> Self {
        Self { registry, id }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.registry.deregister(&self.id) {
            let open_secs = (Utc::now() - session.opened_at()).num_seconds();
            info!(
                session_id = %self.id,
                open_secs,
                active = self.registry.count(),
                "session closed"
            );
        }
    }
}
