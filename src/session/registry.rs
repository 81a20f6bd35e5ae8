//! Process-wide session registry
//!
//! Constructed once at startup and shared by handle. Every operation takes
//! the lock exactly once, so a session is either fully registered or absent.
//! Once `close_all` has run the registry stays closed and refuses new
//! sessions.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use super::{Session, SessionId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session {0} is already registered")]
    Duplicate(String),

    #[error("server is shutting down")]
    ShuttingDown,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, Arc<Session>>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `session`. An identifier that is already present is never
    /// overwritten.
    pub fn register(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(RegistryError::ShuttingDown);
        }
        match inner.sessions.entry(session.id().clone()) {
            Entry::Occupied(entry) => Err(RegistryError::Duplicate(entry.key().to_string())),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.inner.read().sessions.get(id).cloned()
    }

    /// Remove and return the session. Unknown identifiers are a no-op.
    pub fn unregister(&self, id: &str) -> Option<Arc<Session>> {
        self.inner.write().sessions.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().sessions.is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.inner.read().sessions.keys().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Unregister and close every session, and refuse any registered after
    /// this. Used on server shutdown so open streams end and graceful
    /// shutdown can complete.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = {
            let mut inner = self.inner.write();
            inner.closed = true;
            inner.sessions.drain().map(|(_, s)| s).collect()
        };
        for session in &drained {
            session.close();
        }
        drained.len()
    }
}
