//! WebSocket transport for hub sessions.
//!
//! Each upgraded socket runs two loops:
//! - the writer drains the session queue into the socket and sends
//!   heartbeat pings
//! - the reader consumes inbound frames and watches for idle timeout
//!
//! Either loop ending tears the other down through a shared
//! [`CancellationToken`], which is also what the hub trips when it closes
//! the session.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use shop_core::Identity;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::HeartbeatConfig;
use crate::hub::HubHandle;
use crate::session::{Session, SessionId, SessionQueue, Transport};

/// Upper bound on the final close frame write.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

/// Close hook backed by a cancellation token.
#[derive(Debug, Clone, Default)]
pub struct WsTransport {
    shutdown: CancellationToken,
}

impl WsTransport {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Transport for WsTransport {
    fn close(&self) {
        self.shutdown.cancel();
    }
}

/// Serve one upgraded WebSocket until either side goes away.
///
/// Registers a session for `identity`, pumps its queue into the socket and
/// unregisters it when the connection ends.
pub async fn serve_socket(
    socket: WebSocket,
    hub: HubHandle,
    identity: Identity,
    heartbeat: HeartbeatConfig,
) {
    let shutdown = CancellationToken::new();
    let transport = Arc::new(WsTransport::new(shutdown.clone()));
    let (session, queue) = Session::new(identity, transport, hub.session_queue_capacity());
    let session_id = session.id();

    hub.register(session).await;

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_loop(
        sink,
        queue,
        shutdown.clone(),
        heartbeat.ping_interval(),
    ));

    read_loop(stream, &shutdown, heartbeat.idle_timeout(), session_id).await;

    shutdown.cancel();
    hub.unregister(session_id).await;

    if let Err(e) = writer.await {
        debug!(session_id = %session_id, error = %e, "WebSocket writer task failed");
    }
    debug!(session_id = %session_id, "WebSocket connection finished");
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: SessionQueue,
    shutdown: CancellationToken,
    ping_interval: Option<Duration>,
) {
    let session_id = queue.session_id();
    let mut ping = ping_interval.map(|period| {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = queue.next() => match next {
                Some(payload) => Message::Text(payload),
                None => {
                    trace!(session_id = %session_id, "Session queue closed");
                    break;
                }
            },
            _ = next_tick(&mut ping) => Message::Ping(Bytes::new()),
        };

        // A stalled client must not pin the writer past a close request.
        let sent = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            sent = sink.send(frame) => sent,
        };
        if let Err(e) = sent {
            debug!(session_id = %session_id, error = %e, "WebSocket send failed");
            break;
        }
    }

    let _ = time::timeout(CLOSE_FRAME_TIMEOUT, sink.send(Message::Close(None))).await;
    shutdown.cancel();
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    shutdown: &CancellationToken,
    idle_timeout: Option<Duration>,
    session_id: SessionId,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = recv_within(&mut stream, idle_timeout) => next,
        };

        match next {
            Err(_) => {
                debug!(session_id = %session_id, "WebSocket idle timeout");
                break;
            }
            Ok(None) | Ok(Some(Ok(Message::Close(_)))) => {
                trace!(session_id = %session_id, "WebSocket closed by peer");
                break;
            }
            Ok(Some(Err(e))) => {
                debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
            // Any inbound frame proves liveness. Client messages carry no
            // commands and are otherwise ignored.
            Ok(Some(Ok(_))) => {}
        }
    }
}

async fn recv_within(
    stream: &mut SplitStream<WebSocket>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<Message, axum::Error>>, time::error::Elapsed> {
    match idle_timeout {
        Some(limit) => time::timeout(limit, stream.next()).await,
        None => Ok(stream.next().await),
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready};

    #[test]
    fn test_transport_close_cancels_token() {
        let token = CancellationToken::new();
        let transport = WsTransport::new(token.clone());
        assert!(!transport.is_closed());

        transport.close();
        transport.close();
        assert!(token.is_cancelled());
        assert!(transport.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_tick_fires_after_period() {
        let period = Duration::from_secs(30);
        let mut interval = Some(time::interval_at(Instant::now() + period, period));

        let mut tick = tokio_test::task::spawn(next_tick(&mut interval));
        assert_pending!(tick.poll());
        time::advance(period).await;
        assert_ready!(tick.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_tick_without_heartbeat_never_fires() {
        let mut interval = None;
        let mut tick = tokio_test::task::spawn(next_tick(&mut interval));
        time::advance(Duration::from_secs(3600)).await;
        assert_pending!(tick.poll());
    }
}
