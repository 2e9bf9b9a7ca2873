use axum::extract::ws::Message as WsMessage;
use futures_util::{Sink, Stream};

/// A duplex websocket transport. axum's `WebSocket` is the production one.
pub trait Transport:
    Stream<Item = Result<WsMessage, axum::Error>> + Sink<WsMessage, Error = axum::Error> + Send + Unpin + 'static
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<WsMessage, axum::Error>> + Sink<WsMessage, Error = axum::Error> + Send + Unpin + 'static
{
}
