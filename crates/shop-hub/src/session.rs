//! Sessions: one per live full-duplex connection.
//!
//! A session is split in two halves at creation:
//! - [`Session`] goes to the hub. It owns the sending side of the bounded
//!   outbound queue and the transport close hook.
//! - [`SessionQueue`] stays with the transport and is drained by the writer
//!   loop.
//!
//! Closing consumes the [`Session`], so a session's queue and transport are
//! closed at most once.

use std::fmt;
use std::sync::Arc;

use shop_core::Identity;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use uuid::Uuid;

use crate::event::Payload;

/// Server-generated unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Close hook for the connection underlying a session.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Close the connection. Must not block.
    fn close(&self);
}

/// Why an enqueue attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFault {
    /// The consumer is not keeping up.
    QueueFull,
    /// The writer loop is gone.
    QueueClosed,
}

impl DeliveryFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueFull => "queue_full",
            Self::QueueClosed => "queue_closed",
        }
    }
}

impl fmt::Display for DeliveryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hub-side half of a session.
pub struct Session {
    id: SessionId,
    identity: Identity,
    outbound: mpsc::Sender<Payload>,
    transport: Arc<dyn Transport>,
}

impl Session {
    /// Create a session and its outbound queue.
    ///
    /// # Panics
    /// Panics if `queue_capacity` is zero.
    pub fn new(
        identity: Identity,
        transport: Arc<dyn Transport>,
        queue_capacity: usize,
    ) -> (Self, SessionQueue) {
        let (outbound, rx) = mpsc::channel(queue_capacity);
        let id = SessionId::new();
        let session = Self {
            id,
            identity,
            outbound,
            transport,
        };
        (session, SessionQueue { id, rx })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Enqueue without waiting.
    pub(crate) fn try_enqueue(&self, payload: Payload) -> Result<(), DeliveryFault> {
        self.outbound.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFault::QueueFull,
            TrySendError::Closed(_) => DeliveryFault::QueueClosed,
        })
    }

    /// Close the outbound queue and the transport.
    ///
    /// The transport's writer stops at the close signal, so payloads still
    /// queued at that point are discarded rather than delivered.
    pub(crate) fn close(self) {
        let Self {
            outbound,
            transport,
            ..
        } = self;
        drop(outbound);
        transport.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Transport-side half of a session: the outbound queue.
#[derive(Debug)]
pub struct SessionQueue {
    id: SessionId,
    rx: mpsc::Receiver<Payload>,
}

impl SessionQueue {
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Wait for the next payload. `None` once the hub closed the queue and
    /// everything already enqueued has been taken.
    pub async fn next(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    /// Take a payload if one is ready.
    pub fn try_next(&mut self) -> Result<Payload, TryRecvError> {
        self.rx.try_recv()
    }

    /// Number of payloads waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
