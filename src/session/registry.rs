//! Session Registry
//!
//! Correlates outbound requests with their replies. A session is opened just
//! before sending, fed by inbound ACK / reply messages carrying its id, and
//! released when the [`SessionGuard`] returned by `open` is dropped, whichever
//! way the originating call exits.

use dashmap::DashMap;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

use super::gate::CompletionGate;
use crate::storage::Versioned;

pub type SessionId = Uuid;

pub struct Session {
    id: SessionId,
    pub gate: CompletionGate,
    replies: DashMap<String, Versioned>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Folds `results` into the accumulator, keeping the highest version per key.
    pub fn contribute(&self, results: HashMap<String, Versioned>) {
        for (key, incoming) in results {
            self.replies
                .entry(key)
                .and_modify(|current| {
                    if incoming.version > current.version {
                        *current = incoming.clone();
                    }
                })
                .or_insert(incoming);
        }
    }

    pub fn replies(&self) -> HashMap<String, Versioned> {
        self.replies
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn reply_for(&self, key: &str) -> Option<Versioned> {
        self.replies.get(key).map(|entry| entry.value().clone())
    }
}

pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Opens a session that completes after `expected` replies.
    pub fn open(self: &Arc<Self>, expected: usize) -> SessionGuard {
        self.open_with_responders(expected, expected)
    }

    /// Opens a session that completes after `expected` of `responders` replies.
    pub fn open_with_responders(self: &Arc<Self>, expected: usize, responders: usize) -> SessionGuard {
        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            gate: CompletionGate::with_responders(expected, responders),
            replies: DashMap::new(),
        });
        self.sessions.insert(session.id, session.clone());
        tracing::debug!("Opened session {} expecting {}", session.id, expected);

        SessionGuard {
            registry: self.clone(),
            session,
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Counts one reply against the session. Returns `false` when the session
    /// is no longer tracked (late reply after the originator gave up).
    pub fn signal(&self, id: &SessionId) -> bool {
        match self.get(id) {
            Some(session) => {
                session.gate.signal();
                true
            }
            None => {
                tracing::debug!("Dropping signal for released session {}", id);
                false
            }
        }
    }

    /// Records `results` and counts the reply.
    pub fn contribute(&self, id: &SessionId, results: HashMap<String, Versioned>) -> bool {
        match self.get(id) {
            Some(session) => {
                session.contribute(results);
                session.gate.signal();
                true
            }
            None => {
                tracing::debug!("Dropping late reply for released session {}", id);
                false
            }
        }
    }

    pub fn forfeit(&self, id: &SessionId) {
        if let Some(session) = self.get(id) {
            session.gate.forfeit();
        }
    }

    pub fn release(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

/// Scoped ownership of a registered session; dropping it releases the session.
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    session: Arc<Session>,
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.registry.release(&self.session.id) {
            tracing::debug!("Released session {}", self.session.id);
        }
    }
}
