use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::models::message::RoomId;

/// Structured API error returned to clients.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND".to_string(),
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "UNAVAILABLE".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        match err {
            JoinError::UnknownRoom(_) => Self::not_found(err.to_string()),
            JoinError::HubClosed => Self::unavailable(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Core errors. Each one is contained to a single connection, hub call, or
// write; none of them crosses into another connection's pumps.
// ---------------------------------------------------------------------------

/// Read, write, or keep-alive failure on one connection's transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("read failed: {0}")]
    Read(#[source] axum::Error),
    #[error("write failed: {0}")]
    Write(#[source] axum::Error),
    #[error("write did not complete before the deadline")]
    WriteTimeout,
    #[error("no pong received before the keep-alive deadline")]
    KeepAliveTimeout,
}

/// A client frame that cannot become a [`Message`](crate::models::message::Message).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("room connections cannot address a receiver")]
    AmbiguousTarget,
    #[error("direct messages need a receiver")]
    MissingReceiver,
}

/// Pushing a frame into a recipient's outbound buffer failed.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound buffer is full")]
    BufferFull,
    #[error("outbound buffer is closed")]
    Closed,
}

/// The hub did not accept a command from a connection.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("hub did not accept the message within the hand-off budget")]
    Saturated,
    #[error("hub is no longer running")]
    Closed,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("unknown room {0}")]
    UnknownRoom(RoomId),
    #[error("hub is no longer running")]
    HubClosed,
}

/// A message could not be handed to the storage writer.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    #[error("persistence queue is full, message dropped")]
    Saturated,
    #[error("storage writer has stopped")]
    Closed,
}

/// The durable insert for one message failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("pool error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
