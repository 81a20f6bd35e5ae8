//! Sessions for the event-stream transport
//!
//! A session binds one long-lived server-to-client stream to the
//! short-lived POSTs that feed it. The identifier is handed to the client in
//! the stream's first event and is the only thing correlating the two sides,
//! so it is generated from a v4 UUID and treated as a capability.

pub mod registry;

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::error::{ProtocolError, TransportError};
use crate::mcp::message::JsonRpcMessage;

pub use registry::{RegistryError, SessionRegistry};

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Open,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: &'static str,
    pub data: String,
}

impl Frame {
    pub fn endpoint(path: String) -> Self {
        Self {
            event: "endpoint",
            data: path,
        }
    }

    pub fn message(json: String) -> Self {
        Self {
            event: "message",
            data: json,
        }
    }
}

/// A posted payload waiting for dispatch. Payloads that failed to decode are
/// queued too so their error replies keep their place in the stream.
pub type Inbound = Result<JsonRpcMessage, ProtocolError>;

pub struct Session {
    id: SessionId,
    state: AtomicU8,
    inbox: mpsc::Sender<Inbound>,
    outbound: mpsc::Sender<Frame>,
    shutdown: watch::Sender<bool>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        inbox: mpsc::Sender<Inbound>,
        outbound: mpsc::Sender<Frame>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            id,
            state: AtomicU8::new(SessionState::Open as u8),
            inbox,
            outbound,
            shutdown,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Open and still attached to a live stream
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open && !self.outbound.is_closed()
    }

    /// Queue a payload for this session's dispatcher. Never waits: a full
    /// inbox means the client stopped reading its stream.
    pub fn deliver(&self, inbound: Inbound) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::SessionClosed(self.id.to_string()));
        }
        self.inbox.try_send(inbound).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::SessionBusy(self.id.to_string()),
            TrySendError::Closed(_) => TransportError::SessionClosed(self.id.to_string()),
        })
    }

    /// Ask the stream to end. Safe to call any number of times.
    pub fn close(&self) {
        let _ = self.state.compare_exchange(
            SessionState::Open as u8,
            SessionState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.shutdown.send_replace(true);
    }

    pub(crate) fn mark_closed(&self) {
        self.state.store(SessionState::Closed as u8, Ordering::Release);
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
