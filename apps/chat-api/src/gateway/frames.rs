//! Wire format: one JSON text frame per chat message, both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::models::message::{Message, RoomId, UserId};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A chat frame sent by the browser. Any `room_id` or `timestamp` the client
/// includes is ignored: the room comes from the hub the connection joined and
/// the timestamp is taken on receipt.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub sender: UserId,
    #[serde(default)]
    pub receiver: Option<UserId>,
    pub message: String,
}

impl ClientFrame {
    /// Decode raw frame bytes, rejecting anything over `max_len` bytes.
    pub fn decode(bytes: &[u8], max_len: usize) -> Result<Self, DecodeError> {
        if bytes.len() > max_len {
            return Err(DecodeError::TooLarge {
                len: bytes.len(),
                max: max_len,
            });
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Turn the frame into a [`Message`] for a connection joined to `room`
    /// (`None` for the unassigned hub, which only carries direct messages).
    pub fn into_message(self, room: Option<RoomId>, received_at: DateTime<Utc>) -> Result<Message, DecodeError> {
        match (room, self.receiver) {
            (Some(room), None) => Ok(Message::room(self.sender, room, self.message, received_at)),
            (Some(_), Some(_)) => Err(DecodeError::AmbiguousTarget),
            (None, Some(receiver)) => Ok(Message::direct(self.sender, receiver, self.message, received_at)),
            (None, None) => Err(DecodeError::MissingReceiver),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ServerFrame<'a> {
    pub sender: UserId,
    pub receiver: Option<UserId>,
    pub message: &'a str,
    pub room_id: Option<RoomId>,
    pub timestamp: DateTime<Utc>,
}

impl<'a> From<&'a Message> for ServerFrame<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            sender: message.sender(),
            receiver: message.receiver(),
            message: message.text(),
            room_id: message.room_id(),
            timestamp: message.timestamp(),
        }
    }
}

impl ServerFrame<'_> {
    pub fn encode(message: &Message) -> Result<String, serde_json::Error> {
        serde_json::to_string(&ServerFrame::from(message))
    }
}
