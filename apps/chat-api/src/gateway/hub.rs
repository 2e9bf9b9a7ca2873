//! Per-room hub: one control loop owns the membership set and serializes
//! every register, unregister, and broadcast for its room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};

use crate::error::{HubError, JoinError};
use crate::models::message::{Message, RoomId};
use crate::models::room::Room;
use crate::persistence::PersistenceQueue;

use super::connection::{Connection, ConnectionHandle, ConnectionId, ConnectionSettings};
use super::transport::Transport;

/// Capacity of a hub's command channel.
const DEFAULT_COMMAND_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct HubSettings {
    pub command_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

pub enum HubCommand {
    Register(ConnectionHandle),
    Unregister(ConnectionId),
    Broadcast {
        from: ConnectionId,
        message: Arc<Message>,
    },
    Members(oneshot::Sender<usize>),
    Shutdown(oneshot::Sender<usize>),
}

/// Handle to a running hub. Cloneable; the loop stops once every handle is
/// dropped.
#[derive(Clone)]
pub struct RoomHub {
    room: Option<Arc<Room>>,
    commands: mpsc::Sender<HubCommand>,
}

impl RoomHub {
    /// Spawn the control loop for `room`, or for the unassigned hub when
    /// `room` is `None`.
    ///
    /// The unassigned hub carries direct messages. Connections are anonymous,
    /// so it cannot route by user: every direct message goes to every other
    /// member, and clients keep only frames whose `receiver` is their own id.
    pub fn spawn(room: Option<Room>, persistence: PersistenceQueue, settings: &HubSettings) -> Self {
        let (commands, rx) = mpsc::channel(settings.command_capacity);
        let control = ControlLoop {
            room_id: room.as_ref().map(Room::room_id),
            label: room.as_ref().map_or_else(|| "global".to_string(), |r| r.name.clone()),
            members: HashMap::new(),
            persistence,
            shutting_down: false,
            rx,
        };
        tokio::spawn(control.run());

        Self {
            room: room.map(Arc::new),
            commands,
        }
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_deref()
    }

    pub fn room_id(&self) -> Option<RoomId> {
        self.room.as_ref().map(|room| room.room_id())
    }

    /// Create a connection over `transport` and register it with this hub.
    pub async fn join<T: Transport>(
        &self,
        transport: T,
        settings: ConnectionSettings,
    ) -> Result<Connection<T>, JoinError> {
        let (handle, outbound) = ConnectionHandle::new(settings.outbound_capacity);
        let id = handle.id().clone();
        self.register(handle).await.map_err(|_| JoinError::HubClosed)?;
        Ok(Connection::new(id, self.clone(), transport, outbound, settings))
    }

    pub async fn register(&self, handle: ConnectionHandle) -> Result<(), HubError> {
        self.commands
            .send(HubCommand::Register(handle))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Remove a connection. Unknown or already-removed ids are ignored, and so
    /// is a stopped hub, whose membership is gone anyway.
    pub async fn unregister(&self, id: ConnectionId) {
        if self.commands.send(HubCommand::Unregister(id)).await.is_err() {
            tracing::debug!("unregister sent to a stopped hub");
        }
    }

    /// Hand a message to the hub, waiting at most `budget` for room in its
    /// command channel.
    pub async fn broadcast(&self, from: ConnectionId, message: Message, budget: Duration) -> Result<(), HubError> {
        let command = HubCommand::Broadcast {
            from,
            message: Arc::new(message),
        };
        match self.commands.send_timeout(command, budget).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(HubError::Saturated),
            Err(SendTimeoutError::Closed(_)) => Err(HubError::Closed),
        }
    }

    pub async fn member_count(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(HubCommand::Members(reply))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Drop every member and refuse new ones. Returns how many connections
    /// were dropped.
    pub async fn shutdown(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(HubCommand::Shutdown(reply))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

struct ControlLoop {
    room_id: Option<RoomId>,
    label: String,
    members: HashMap<ConnectionId, ConnectionHandle>,
    persistence: PersistenceQueue,
    shutting_down: bool,
    rx: mpsc::Receiver<HubCommand>,
}

impl ControlLoop {
    async fn run(mut self) {
        tracing::debug!(hub = %self.label, "hub started");

        while let Some(command) = self.rx.recv().await {
            match command {
                HubCommand::Register(handle) => self.register(handle),
                HubCommand::Unregister(id) => self.unregister(&id),
                HubCommand::Broadcast { from, message } => self.broadcast(&from, message),
                HubCommand::Members(reply) => {
                    let _ = reply.send(self.members.len());
                }
                HubCommand::Shutdown(reply) => {
                    let dropped = self.shutdown();
                    let _ = reply.send(dropped);
                }
            }
        }

        tracing::debug!(hub = %self.label, "hub stopped");
    }

    fn register(&mut self, handle: ConnectionHandle) {
        if self.shutting_down {
            // Dropping the handle releases the connection.
            tracing::debug!(hub = %self.label, connection_id = %handle.id(), "hub shutting down, refusing connection");
            return;
        }

        tracing::info!(
            hub = %self.label,
            connection_id = %handle.id(),
            members = self.members.len() + 1,
            "connection joined"
        );
        self.members.insert(handle.id().clone(), handle);
    }

    fn unregister(&mut self, id: &ConnectionId) {
        if self.members.remove(id).is_some() {
            tracing::info!(
                hub = %self.label,
                connection_id = %id,
                members = self.members.len(),
                "connection left"
            );
        }
    }

    fn broadcast(&mut self, from: &ConnectionId, message: Arc<Message>) {
        if self.shutting_down {
            return;
        }
        if !self.members.contains_key(from) {
            tracing::debug!(hub = %self.label, connection_id = %from, "broadcast from non-member ignored");
            return;
        }
        if message.room_id() != self.room_id {
            tracing::warn!(
                hub = %self.label,
                connection_id = %from,
                room_id = ?message.room_id(),
                "message addressed to another room, dropping it"
            );
            return;
        }

        let mut evicted = Vec::new();
        for (id, handle) in &self.members {
            if id == from {
                continue;
            }
            if let Err(err) = handle.push(message.clone()) {
                tracing::warn!(hub = %self.label, connection_id = %id, %err, "evicting connection");
                evicted.push(id.clone());
            }
        }
        for id in &evicted {
            self.members.remove(id);
        }

        if let Err(err) = self.persistence.enqueue(message) {
            tracing::warn!(hub = %self.label, %err, "chat message will not be persisted");
        }
    }

    fn shutdown(&mut self) -> usize {
        self.shutting_down = true;
        let dropped = self.members.len();
        self.members.clear();
        tracing::info!(hub = %self.label, dropped, "hub shut down");
        dropped
    }
}
