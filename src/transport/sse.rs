//! Event-stream transport
//!
//! The stream side (`GET /sse`) and the message side (`POST /messages`) are
//! separate HTTP connections correlated only by the session identifier.
//!
//! Each session owns a push channel drained by its stream, an inbox fed by
//! posts, and one dispatch task that handles the inbox in arrival order.
//! Dropping the stream (client disconnect), `close_stream`, shutdown, or an
//! idle timeout all end in the same place: the stream's guard removes the
//! registry entry and the dispatch task sees its push channel close.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use tokio::sync::{mpsc, watch};

use crate::error::TransportError;
use crate::mcp::engine::McpEngine;
use crate::mcp::message::JsonRpcMessage;
use crate::session::{Frame, Inbound, RegistryError, Session, SessionId, SessionRegistry};

pub const DEFAULT_SESSION_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct SseTransport {
    registry: SessionRegistry,
    engine: Arc<McpEngine>,
    message_path: String,
    buffer: usize,
    idle_timeout: Option<Duration>,
}

impl SseTransport {
    /// `message_path` is advertised to clients in each stream's `endpoint`
    /// event.
    pub fn new(
        registry: SessionRegistry,
        engine: Arc<McpEngine>,
        message_path: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            engine,
            message_path: message_path.into(),
            buffer: DEFAULT_SESSION_BUFFER,
            idle_timeout: None,
        }
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Create and register a session. The returned stream yields the
    /// `endpoint` event first, then every reply pushed for the session, and
    /// unregisters the session when dropped.
    pub fn open_stream(&self) -> Result<SessionStream, RegistryError> {
        let id = SessionId::generate();
        let (inbox_tx, inbox_rx) = mpsc::channel(self.buffer);
        let (push_tx, push_rx) = mpsc::channel(self.buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let session = Arc::new(Session::new(
            id.clone(),
            inbox_tx,
            push_tx.clone(),
            shutdown_tx,
        ));
        self.registry.register(session.clone())?;

        tokio::spawn(dispatch(self.engine.clone(), id.clone(), inbox_rx, push_tx));

        tracing::info!(session_id = %id, "Session opened");

        let endpoint = Frame::endpoint(format!("{}?sessionId={}", self.message_path, id));
        let guard = SessionGuard {
            registry: self.registry.clone(),
            session: session.clone(),
        };
        let frames = frames(endpoint, push_rx, shutdown_rx, self.idle_timeout, guard);

        Ok(SessionStream {
            session,
            frames: Box::pin(frames),
        })
    }

    /// Route a posted body to its session.
    ///
    /// Addressing failures are returned; everything after that, including
    /// undecodable bodies, is answered over the session's stream.
    pub fn post_message(
        &self,
        session_id: Option<&str>,
        body: &[u8],
    ) -> Result<(), TransportError> {
        let session = self.resolve(session_id)?;
        self.deliver(&session, body)
    }

    /// Addressing half of `post_message`: find the open session a post
    /// refers to.
    pub fn resolve(&self, session_id: Option<&str>) -> Result<Arc<Session>, TransportError> {
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or(TransportError::MissingSessionId)?;

        self.registry
            .lookup(session_id)
            .filter(|session| session.is_open())
            .ok_or_else(|| TransportError::UnknownSession(session_id.to_string()))
    }

    /// Delivery half of `post_message`: decode `body` and queue it for the
    /// session's dispatcher. Returns without waiting on the dispatcher.
    pub fn deliver(&self, session: &Session, body: &[u8]) -> Result<(), TransportError> {
        let inbound = JsonRpcMessage::from_slice(body);
        if let Err(e) = &inbound {
            tracing::debug!(session_id = %session.id(), "Undecodable payload: {}", e);
        }
        session.deliver(inbound).map_err(|e| {
            if let TransportError::SessionBusy(_) = e {
                tracing::warn!(session_id = %session.id(), "Inbox full, refusing message");
            }
            e
        })
    }

    /// Remove the session and end its stream. Unknown or already-closed
    /// sessions are a no-op; returns whether a session was removed.
    pub fn close_stream(&self, session_id: &str) -> bool {
        match self.registry.unregister(session_id) {
            Some(session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    /// Close every session. Streams opened afterwards are refused.
    pub fn shutdown(&self) -> usize {
        let closed = self.registry.close_all();
        if closed > 0 {
            tracing::info!(sessions = closed, "Closed open sessions");
        }
        closed
    }
}

/// Server-to-client frames of one session
pub struct SessionStream {
    session: Arc<Session>,
    frames: Pin<Box<dyn Stream<Item = Frame> + Send>>,
}

impl SessionStream {
    pub fn id(&self) -> &SessionId {
        self.session.id()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Stream for SessionStream {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.frames.as_mut().poll_next(cx)
    }
}

/// Unregisters the session when the stream is dropped
struct SessionGuard {
    registry: SessionRegistry,
    session: Arc<Session>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let id = self.session.id();
        self.registry.unregister(id.as_str());
        self.session.mark_closed();
        tracing::info!(session_id = %id, "Session closed");
    }
}

fn frames(
    endpoint: Frame,
    mut push_rx: mpsc::Receiver<Frame>,
    mut shutdown: watch::Receiver<bool>,
    idle_timeout: Option<Duration>,
    guard: SessionGuard,
) -> impl Stream<Item = Frame> + Send {
    stream! {
        let _guard = guard;
        yield endpoint;

        loop {
            let idle = async {
                match idle_timeout {
                    Some(timeout) => tokio::time::sleep(timeout).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let next = tokio::select! {
                frame = push_rx.recv() => frame,
                // only ever flips to `true`, so any change means close
                _ = shutdown.changed() => None,
                _ = idle => {
                    tracing::info!("Closing idle stream");
                    None
                }
            };

            match next {
                Some(frame) => yield frame,
                None => break,
            }
        }
    }
}

/// Per-session dispatcher. Handles one payload at a time so replies are
/// pushed in arrival order; exits as soon as the stream goes away, dropping
/// whatever it was working on.
async fn dispatch(
    engine: Arc<McpEngine>,
    session_id: SessionId,
    mut inbox: mpsc::Receiver<Inbound>,
    push: mpsc::Sender<Frame>,
) {
    loop {
        let inbound = tokio::select! {
            _ = push.closed() => break,
            inbound = inbox.recv() => match inbound {
                Some(inbound) => inbound,
                None => break,
            },
        };

        let reply = match inbound {
            Ok(message) => tokio::select! {
                _ = push.closed() => {
                    tracing::debug!(session_id = %session_id, "Stream closed mid-dispatch, dropping reply");
                    break;
                }
                reply = engine.handle(message) => reply,
            },
            Err(e) => Some(JsonRpcMessage::error(None, &e)),
        };

        let Some(reply) = reply else { continue };

        let json = match reply.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(session_id = %session_id, "Failed to encode reply: {}", e);
                continue;
            }
        };

        if push.send(Frame::message(json)).await.is_err() {
            tracing::debug!(session_id = %session_id, "Stream closed, dropping reply");
            break;
        }
    }

    tracing::debug!(session_id = %session_id, "Dispatcher stopped");
}
