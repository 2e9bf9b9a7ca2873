//! The set of running hubs: one per catalog room plus the unassigned hub.

use std::collections::HashMap;

use crate::error::JoinError;
use crate::models::message::RoomId;
use crate::models::room::Room;
use crate::persistence::PersistenceQueue;

use super::connection::{Connection, ConnectionSettings};
use super::hub::{HubSettings, RoomHub};
use super::transport::Transport;

pub struct HubSet {
    rooms: HashMap<RoomId, RoomHub>,
    global: RoomHub,
}

impl HubSet {
    /// Spawn a hub for every room in `catalog` and one for connections not
    /// bound to a room. All of them feed the same persistence queue.
    pub fn start(catalog: &[Room], persistence: PersistenceQueue, settings: &HubSettings) -> Self {
        let rooms = catalog
            .iter()
            .map(|room| {
                let hub = RoomHub::spawn(Some(room.clone()), persistence.clone(), settings);
                (room.room_id(), hub)
            })
            .collect::<HashMap<_, _>>();
        let global = RoomHub::spawn(None, persistence, settings);

        tracing::info!(rooms = rooms.len(), "hubs started");

        Self { rooms, global }
    }

    /// Look up the hub for `room`; `None` is the unassigned hub.
    pub fn hub(&self, room: Option<RoomId>) -> Result<&RoomHub, JoinError> {
        match room {
            None => Ok(&self.global),
            Some(id) => self.rooms.get(&id).ok_or(JoinError::UnknownRoom(id)),
        }
    }

    /// Register a new connection over `transport` with the hub for `room`.
    /// No connection is created for an unknown room.
    pub async fn join<T: Transport>(
        &self,
        room: Option<RoomId>,
        transport: T,
        settings: ConnectionSettings,
    ) -> Result<Connection<T>, JoinError> {
        self.hub(room)?.join(transport, settings).await
    }

    /// The catalog rooms, ordered by id.
    pub fn rooms(&self) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self.rooms.values().filter_map(RoomHub::room).collect();
        rooms.sort_by_key(|room| room.id);
        rooms
    }

    /// Shut every hub down. Returns the total number of connections dropped.
    pub async fn shutdown(&self) -> usize {
        let mut dropped = 0;
        for hub in self.rooms.values().chain(std::iter::once(&self.global)) {
            match hub.shutdown().await {
                Ok(n) => dropped += n,
                Err(err) => tracing::debug!(%err, room_id = ?hub.room_id(), "hub already stopped"),
            }
        }
        tracing::info!(dropped, "all hubs shut down");
        dropped
    }
}
