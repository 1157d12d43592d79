//! Broadcast hub actor.
//!
//! A single task owns the set of live sessions. Registration, removal and
//! fan-out all arrive through one inbox and are applied in arrival order, so
//! a broadcast never observes a half-removed session and a session is never
//! enqueued to after its removal.
//!
//! # Delivery
//!
//! Each event is serialized once and offered to every registered session
//! with a non-blocking enqueue. A session whose queue is full (slow
//! consumer) or closed (writer gone) is disconnected as part of the same
//! broadcast. Other sessions are unaffected and the event is never retried.
//!
//! # Late registration
//!
//! A transport can die before its `Register` is processed. The matching
//! `Unregister` is then a no-op and the late `Register` re-adds a dead
//! session. The next broadcast finds its queue closed and removes it.

use std::collections::HashMap;

use shop_core::Role;
use shop_telemetry::Metrics;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::HubConfig;
use crate::event::Event;
use crate::session::{Session, SessionId};

// ============================================================================
// HubMsg
// ============================================================================

/// Messages for the hub actor.
#[derive(Debug)]
pub enum HubMsg {
    /// Add a session to the live set.
    Register(Session),

    /// Remove a session (no-op if absent).
    Unregister(SessionId),

    /// Fan an event out to every live session.
    Broadcast(Event),

    /// Report current statistics.
    Stats(oneshot::Sender<HubStats>),

    /// Close every session and stop.
    Shutdown,
}

/// Hub statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Live sessions.
    pub sessions: usize,
    pub admins: usize,
    pub users: usize,
    pub guests: usize,
    /// Events broadcast since start.
    pub events_broadcast: u64,
    /// Sessions disconnected for backpressure or dead writers.
    pub sessions_dropped: u64,
}

// ============================================================================
// HubTask
// ============================================================================

/// Hub actor task.
///
/// Runs in its own tokio task and processes messages sequentially.
pub struct HubTask {
    rx: mpsc::Receiver<HubMsg>,
    sessions: HashMap<SessionId, Session>,
    events_broadcast: u64,
    sessions_dropped: u64,
}

impl HubTask {
    /// Run the hub until `Shutdown` or until every handle is dropped.
    pub async fn run(mut self) {
        debug!("HubTask started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                HubMsg::Register(session) => self.on_register(session),
                HubMsg::Unregister(id) => self.on_unregister(id),
                HubMsg::Broadcast(event) => self.on_broadcast(&event),
                HubMsg::Stats(reply) => {
                    let _ = reply.send(self.stats());
                }
                HubMsg::Shutdown => {
                    debug!("HubTask shutting down");
                    break;
                }
            }
        }

        self.close_all();
        debug!("HubTask terminated");
    }

    fn on_register(&mut self, session: Session) {
        let id = session.id();
        let identity = *session.identity();

        if let Some(previous) = self.sessions.insert(id, session) {
            // Ids are unique per connection; a collision means a caller
            // registered the same id twice.
            warn!(session_id = %id, "Session registered twice, closing previous");
            previous.close();
        }

        Metrics::ws_session_registered();
        Metrics::ws_sessions_set(self.sessions.len());

        info!(
            session_id = %id,
            user_id = identity.user_id,
            role = %identity.role,
            sessions = self.sessions.len(),
            "WebSocket client connected"
        );
    }

    fn on_unregister(&mut self, id: SessionId) {
        let Some(session) = self.sessions.remove(&id) else {
            trace!(session_id = %id, "Unregister for unknown session ignored");
            return;
        };

        let identity = *session.identity();
        session.close();

        Metrics::ws_session_removed("disconnect");
        Metrics::ws_sessions_set(self.sessions.len());

        info!(
            session_id = %id,
            user_id = identity.user_id,
            role = %identity.role,
            sessions = self.sessions.len(),
            "WebSocket client disconnected"
        );
    }

    fn on_broadcast(&mut self, event: &Event) {
        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, event_type = event.kind(), "Failed to serialize event");
                return;
            }
        };

        let mut sent = 0usize;
        let mut faulty = Vec::new();

        for (id, session) in &self.sessions {
            match session.try_enqueue(payload.clone()) {
                Ok(()) => sent += 1,
                Err(fault) => faulty.push((*id, fault)),
            }
        }

        for (id, fault) in &faulty {
            if let Some(session) = self.sessions.remove(id) {
                let identity = *session.identity();
                session.close();
                Metrics::ws_session_removed(fault.as_str());
                warn!(
                    session_id = %id,
                    user_id = identity.user_id,
                    role = %identity.role,
                    reason = %fault,
                    "Dropping session that cannot accept events"
                );
            }
        }

        self.events_broadcast += 1;
        self.sessions_dropped += faulty.len() as u64;

        Metrics::ws_broadcast(event.kind(), sent);
        if !faulty.is_empty() {
            Metrics::ws_sessions_set(self.sessions.len());
        }

        info!(
            event_type = event.kind(),
            subject_id = event.subject_id(),
            sent,
            dropped = faulty.len(),
            "WebSocket broadcast"
        );
    }

    fn stats(&self) -> HubStats {
        let mut stats = HubStats {
            sessions: self.sessions.len(),
            events_broadcast: self.events_broadcast,
            sessions_dropped: self.sessions_dropped,
            ..HubStats::default()
        };
        for session in self.sessions.values() {
            match session.identity().role {
                Role::Admin => stats.admins += 1,
                Role::User => stats.users += 1,
                Role::Guest => stats.guests += 1,
            }
        }
        stats
    }

    fn close_all(&mut self) {
        let count = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            session.close();
            Metrics::ws_session_removed("shutdown");
        }
        Metrics::ws_sessions_set(0);
        if count > 0 {
            info!(sessions = count, "Closed all WebSocket sessions");
        }
    }
}

// ============================================================================
// HubHandle
// ============================================================================

/// Handle for interacting with the hub actor.
///
/// Cheap to clone. All operations are fire-and-forget: once the hub has
/// stopped they are silently dropped.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubMsg>,
    session_queue_capacity: usize,
}

impl HubHandle {
    /// Outbound queue capacity new sessions must be created with.
    pub fn session_queue_capacity(&self) -> usize {
        self.session_queue_capacity
    }

    /// Add a session to the live set.
    ///
    /// If the hub has stopped, the session is closed immediately.
    pub async fn register(&self, session: Session) {
        if let Err(mpsc::error::SendError(msg)) = self.tx.send(HubMsg::Register(session)).await {
            debug!("Hub stopped, closing session offered for registration");
            if let HubMsg::Register(session) = msg {
                session.close();
            }
        }
    }

    /// Remove a session. Safe to call repeatedly and for unknown ids.
    pub async fn unregister(&self, id: SessionId) {
        if self.tx.send(HubMsg::Unregister(id)).await.is_err() {
            debug!(session_id = %id, "Hub stopped, unregister dropped");
        }
    }

    /// Fan an event out to every live session.
    pub async fn broadcast(&self, event: Event) {
        if let Err(mpsc::error::SendError(msg)) = self.tx.send(HubMsg::Broadcast(event)).await {
            if let HubMsg::Broadcast(event) = msg {
                debug!(event_type = event.kind(), "Hub stopped, event dropped");
            }
        }
    }

    /// Current statistics, or `None` if the hub has stopped.
    pub async fn stats(&self) -> Option<HubStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(HubMsg::Stats(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    /// Number of live sessions (0 if the hub has stopped).
    pub async fn session_count(&self) -> usize {
        self.stats().await.map(|s| s.sessions).unwrap_or(0)
    }

    /// Ask the hub to close every session and stop.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(HubMsg::Shutdown).await;
    }

    /// Whether the hub task is still accepting messages.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

// ============================================================================
// Spawn
// ============================================================================

/// Spawn the hub actor.
///
/// # Panics
/// Panics if `config.control_queue_capacity` is zero; call
/// [`HubConfig::validate`] first.
pub fn spawn_hub(config: &HubConfig) -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.control_queue_capacity);

    let task = HubTask {
        rx,
        sessions: HashMap::new(),
        events_broadcast: 0,
        sessions_dropped: 0,
    };

    let handle = HubHandle {
        tx,
        session_queue_capacity: config.session_queue_capacity,
    };

    let join_handle = tokio::spawn(task.run());

    (handle, join_handle)
}

// ============================================================================
// Tests
// ============================================================================
