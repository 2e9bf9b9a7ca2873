use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;

use crate::db::pool::DbPool;
use crate::db::schema::rooms;
use crate::error::StoreError;
use crate::models::room::Room;

/// Load the room catalog, ordered by id.
pub async fn load_rooms(db: &DbPool) -> Result<Vec<Room>, StoreError> {
    let mut conn = db.get().await?;
    let catalog = rooms::table
        .order(rooms::id.asc())
        .select(Room::as_select())
        .load(&mut conn)
        .await?;

    tracing::info!(rooms = catalog.len(), "room catalog loaded");

    Ok(catalog)
}
