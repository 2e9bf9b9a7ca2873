//! WebSocket upgrade routes. The hub is resolved before upgrading so an
//! unknown room is a plain 404 and no connection is ever created for it.

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::ApiError;
use crate::models::message::RoomId;
use crate::AppState;

use super::connection::ConnectionSettings;
use super::hub::RoomHub;

/// Hard ceiling for the websocket layer. Anything between this and
/// `max_frame_bytes` reaches the decoder, which closes with 1007.
const WS_MESSAGE_CEILING: usize = 64 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(global_ws))
        .route("/rooms/{room_id}/ws", get(room_ws))
}

async fn global_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Result<Response, ApiError> {
    let hub = state.hubs.hub(None)?.clone();
    Ok(upgrade(ws, hub, state.config.connection.clone()))
}

async fn room_ws(
    ws: WebSocketUpgrade,
    Path(room_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let hub = state.hubs.hub(Some(RoomId(room_id)))?.clone();
    Ok(upgrade(ws, hub, state.config.connection.clone()))
}

fn upgrade(ws: WebSocketUpgrade, hub: RoomHub, settings: ConnectionSettings) -> Response {
    ws.max_message_size(WS_MESSAGE_CEILING.max(settings.max_frame_bytes))
        .on_upgrade(move |socket| async move {
            match hub.join(socket, settings).await {
                Ok(connection) => {
                    tracing::debug!(connection_id = %connection.id(), room_id = ?hub.room_id(), "websocket connected");
                    connection.run().await;
                }
                Err(err) => tracing::warn!(%err, room_id = ?hub.room_id(), "could not join hub"),
            }
        })
        .into_response()
}
