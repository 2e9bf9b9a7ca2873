//! One live websocket: an inbound pump feeding the hub and an outbound pump
//! draining the connection's buffer, run side by side until either stops.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message as WsMessage};
use chrono::Utc;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use haloo_common::id::{tag, TaggedId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::time::{self, Instant};

use crate::error::{DecodeError, DeliveryError, HubError, TransportError};
use crate::models::message::Message;

use super::frames::{ClientFrame, ServerFrame};
use super::hub::RoomHub;
use super::transport::Transport;

const CLOSE_GOING_AWAY: u16 = 1001;
const CLOSE_INVALID_PAYLOAD: u16 = 1007;

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Frames a recipient may have queued before it is evicted.
    pub outbound_capacity: usize,
    /// Largest accepted client frame, in bytes.
    pub max_frame_bytes: usize,
    /// Ping period; a ping still unanswered at the next tick is fatal.
    pub ping_interval: Duration,
    pub write_timeout: Duration,
    /// How long the inbound pump may wait for room in the hub's channel.
    pub handoff_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            max_frame_bytes: 512,
            ping_interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            handoff_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(TaggedId);

impl ConnectionId {
    pub fn new() -> Self {
        Self(TaggedId::new(tag::CONNECTION))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The hub's side of a connection: its id and the sending half of its
/// outbound buffer. Dropping the handle closes the buffer and releases the
/// connection, which then tears itself down without draining.
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Arc<Message>>,
    _release: oneshot::Sender<()>,
}

/// The connection's side of a [`ConnectionHandle`].
pub struct Outbound {
    pub messages: mpsc::Receiver<Arc<Message>>,
    /// Resolves once the hub has let go of the handle.
    pub released: oneshot::Receiver<()>,
}

impl ConnectionHandle {
    pub fn new(capacity: usize) -> (Self, Outbound) {
        let (outbound, messages) = mpsc::channel(capacity);
        let (release, released) = oneshot::channel();
        let handle = Self {
            id: ConnectionId::new(),
            outbound,
            _release: release,
        };
        (handle, Outbound { messages, released })
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue a message for this connection without waiting.
    pub fn push(&self, message: Arc<Message>) -> Result<(), DeliveryError> {
        self.outbound.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::BufferFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Why a connection ended.
#[derive(Debug)]
pub enum Disconnect {
    /// The client closed the socket or the stream ended.
    ClientClosed,
    Transport(TransportError),
    Decode(DecodeError),
    /// The hub would not take a message from this connection.
    Hub(HubError),
    /// The hub let go of this connection: eviction, unregister, or shutdown.
    Dropped,
}

impl Disconnect {
    fn close_frame(&self) -> Option<CloseFrame> {
        let (code, reason) = match self {
            Disconnect::ClientClosed => return None,
            Disconnect::Transport(TransportError::KeepAliveTimeout) => (CLOSE_GOING_AWAY, "keep-alive timeout"),
            Disconnect::Transport(_) => return None,
            Disconnect::Decode(_) => (CLOSE_INVALID_PAYLOAD, "invalid frame"),
            Disconnect::Hub(_) | Disconnect::Dropped => (CLOSE_GOING_AWAY, "disconnected"),
        };
        Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })
    }
}

pub struct Connection<T> {
    id: ConnectionId,
    hub: RoomHub,
    transport: T,
    outbound: Outbound,
    settings: ConnectionSettings,
}

impl<T: Transport> Connection<T> {
    pub(crate) fn new(
        id: ConnectionId,
        hub: RoomHub,
        transport: T,
        outbound: Outbound,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            id,
            hub,
            transport,
            outbound,
            settings,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Run both pumps until one of them stops or the hub releases the
    /// connection, then tear it down. Teardown is safe to reach from either
    /// pump.
    pub async fn run(self) -> Disconnect {
        let Self {
            id,
            hub,
            transport,
            outbound,
            settings,
        } = self;
        let Outbound {
            messages: mut outbound,
            mut released,
        } = outbound;
        let (mut ws_tx, mut ws_rx) = transport.split();
        let awaiting_pong = AtomicBool::new(false);

        let reason = tokio::select! {
            reason = inbound_pump(&mut ws_rx, &hub, &id, &settings, &awaiting_pong) => reason,
            reason = outbound_pump(&mut ws_tx, &mut outbound, &settings, &awaiting_pong) => reason,
            _ = &mut released => Disconnect::Dropped,
        };

        hub.unregister(id.clone()).await;

        if let Some(frame) = reason.close_frame() {
            let close = ws_tx.send(WsMessage::Close(Some(frame)));
            let _ = time::timeout(settings.write_timeout, close).await;
        }
        let _ = time::timeout(settings.write_timeout, ws_tx.close()).await;

        match &reason {
            Disconnect::ClientClosed | Disconnect::Dropped => {
                tracing::debug!(connection_id = %id, ?reason, "connection closed");
            }
            _ => tracing::info!(connection_id = %id, ?reason, "connection torn down"),
        }
        reason
    }
}

/// Read frames, decode them, and hand each message to the hub.
async fn inbound_pump<S>(
    ws_rx: &mut S,
    hub: &RoomHub,
    id: &ConnectionId,
    settings: &ConnectionSettings,
    awaiting_pong: &AtomicBool,
) -> Disconnect
where
    S: Stream<Item = Result<WsMessage, axum::Error>> + Unpin,
{
    loop {
        let frame = match ws_rx.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => return Disconnect::Transport(TransportError::Read(err)),
            None => return Disconnect::ClientClosed,
        };

        let decoded = match &frame {
            WsMessage::Text(text) => ClientFrame::decode(text.as_str().as_bytes(), settings.max_frame_bytes),
            WsMessage::Binary(bytes) => ClientFrame::decode(bytes, settings.max_frame_bytes),
            WsMessage::Pong(_) => {
                awaiting_pong.store(false, Ordering::Release);
                continue;
            }
            WsMessage::Ping(_) => continue,
            WsMessage::Close(_) => return Disconnect::ClientClosed,
        };

        let message = match decoded.and_then(|f| f.into_message(hub.room_id(), Utc::now())) {
            Ok(message) => message,
            Err(err) => return Disconnect::Decode(err),
        };

        if let Err(err) = hub.broadcast(id.clone(), message, settings.handoff_timeout).await {
            return Disconnect::Hub(err);
        }
    }
}

/// Write queued messages in order and keep the connection alive with pings.
async fn outbound_pump<K>(
    ws_tx: &mut K,
    outbound: &mut mpsc::Receiver<Arc<Message>>,
    settings: &ConnectionSettings,
    awaiting_pong: &AtomicBool,
) -> Disconnect
where
    K: Sink<WsMessage, Error = axum::Error> + Unpin,
{
    let mut keepalive = time::interval_at(Instant::now() + settings.ping_interval, settings.ping_interval);

    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(message) = next else {
                    return Disconnect::Dropped;
                };
                let text = match ServerFrame::encode(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(?err, "failed to encode outbound frame, skipping it");
                        continue;
                    }
                };
                if let Err(err) = write(ws_tx, WsMessage::Text(text.into()), settings.write_timeout).await {
                    return Disconnect::Transport(err);
                }
            }

            _ = keepalive.tick() => {
                if awaiting_pong.swap(true, Ordering::AcqRel) {
                    return Disconnect::Transport(TransportError::KeepAliveTimeout);
                }
                if let Err(err) = write(ws_tx, WsMessage::Ping(Bytes::new()), settings.write_timeout).await {
                    return Disconnect::Transport(err);
                }
            }
        }
    }
}

async fn write<K>(ws_tx: &mut K, frame: WsMessage, deadline: Duration) -> Result<(), TransportError>
where
    K: Sink<WsMessage, Error = axum::Error> + Unpin,
{
    match time::timeout(deadline, ws_tx.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(TransportError::Write(err)),
        Err(_elapsed) => Err(TransportError::WriteTimeout),
    }
}
