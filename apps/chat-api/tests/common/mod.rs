#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chat_api::config::Config;
use chat_api::db::store::MemoryMessageStore;
use chat_api::gateway::connection::ConnectionSettings;
use chat_api::gateway::hub::HubSettings;
use chat_api::gateway::hubs::HubSet;
use chat_api::models::room::Room;
use chat_api::{persistence, AppState};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The rooms every test server starts with.
pub fn test_catalog() -> Vec<Room> {
    vec![
        Room {
            id: 1,
            name: "Welcome".to_string(),
            picture: Some("placeholder.jpg".to_string()),
        },
        Room {
            id: 2,
            name: "Random".to_string(),
            picture: None,
        },
    ]
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        port: 0,
        db_pool_size: 1,
        persist_queue_capacity: 64,
        hub: HubSettings::default(),
        connection: ConnectionSettings::default(),
    }
}

/// Build a test AppState backed by an in-memory message store.
pub fn test_state(store: Arc<MemoryMessageStore>) -> AppState {
    let config = test_config();
    let (queue, _writer) = persistence::start(store, config.persist_queue_capacity);
    let hubs = HubSet::start(&test_catalog(), queue.clone(), &config.hub);

    AppState {
        hubs: Arc::new(hubs),
        persistence: queue,
        config: Arc::new(config),
    }
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background.
pub async fn start_server(store: Arc<MemoryMessageStore>) -> (SocketAddr, AppState) {
    let state = test_state(store);
    let app = chat_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub async fn connect(addr: SocketAddr, path: &str) -> WsClient {
    let url = format!("ws://{addr}{path}");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
