pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod persistence;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::hubs::HubSet;
use persistence::PersistenceQueue;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub hubs: Arc<HubSet>,
    pub persistence: PersistenceQueue,
    pub config: Arc<Config>,
}
