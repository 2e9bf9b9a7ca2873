use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_api::config::Config;
use chat_api::db::store::{MessageStore, PgMessageStore};
use chat_api::gateway::hubs::HubSet;
use chat_api::{persistence, AppState};

/// How long the storage writer gets to drain its backlog on shutdown.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    // .env is optional; the variables may come from the environment.
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Connect to PostgreSQL.
    let db = chat_api::db::pool::connect(&config.database_url, config.db_pool_size)
        .expect("failed to build connection pool");

    let catalog = chat_api::db::catalog::load_rooms(&db)
        .await
        .expect("failed to load room catalog");

    // One writer drains every hub's accepted messages into the chatlog.
    let store: Arc<dyn MessageStore> = Arc::new(PgMessageStore::new(db));
    let (persistence, writer) = persistence::start(store, config.persist_queue_capacity);

    let hubs = Arc::new(HubSet::start(&catalog, persistence.clone(), &config.hub));

    let state = AppState {
        hubs: hubs.clone(),
        persistence,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hubs.clone()))
        .await
        .expect("server error");

    // Dropping the last hub handles stops the hub loops, which releases the
    // persistence queue and lets the writer finish its backlog.
    drop(hubs);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        tracing::warn!("storage writer did not drain before the deadline");
    }
}

/// Wait for ctrl-c, then close every websocket so the server can stop.
async fn shutdown_signal(hubs: Arc<HubSet>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown requested");
    hubs.shutdown().await;
}
