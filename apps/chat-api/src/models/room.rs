use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::rooms;

use super::message::RoomId;

/// One entry of the room catalog. Each row gets its own hub at startup.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = rooms)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub picture: Option<String>,
}

impl Room {
    pub fn room_id(&self) -> RoomId {
        RoomId(self.id)
    }
}
