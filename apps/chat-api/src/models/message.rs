use std::fmt;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::schema::chatlog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Where a message goes: a whole room, or one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Room(RoomId),
    Direct(UserId),
}

/// One chat event. Built once when a client frame is accepted and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    sender: UserId,
    target: Target,
    text: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub fn room(sender: UserId, room: RoomId, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender,
            target: Target::Room(room),
            text: text.into(),
            timestamp,
        }
    }

    pub fn direct(sender: UserId, receiver: UserId, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender,
            target: Target::Direct(receiver),
            text: text.into(),
            timestamp,
        }
    }

    pub fn sender(&self) -> UserId {
        self.sender
    }

    pub fn receiver(&self) -> Option<UserId> {
        match self.target {
            Target::Direct(user) => Some(user),
            Target::Room(_) => None,
        }
    }

    pub fn room_id(&self) -> Option<RoomId> {
        match self.target {
            Target::Room(room) => Some(room),
            Target::Direct(_) => None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chatlog)]
pub struct NewChatlogEntry<'a> {
    pub sender: i64,
    pub receiver: Option<i64>,
    pub message: &'a str,
    pub room_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl<'a> From<&'a Message> for NewChatlogEntry<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            sender: message.sender.0,
            receiver: message.receiver().map(|user| user.0),
            message: &message.text,
            room_id: message.room_id().map(|room| room.0),
            timestamp: message.timestamp,
        }
    }
}
