use std::str::FromStr;
use std::time::Duration;

use crate::gateway::connection::ConnectionSettings;
use crate::gateway::hub::HubSettings;

/// Chat server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Maximum size of the database connection pool.
    pub db_pool_size: usize,
    /// Messages that may wait for the storage writer before new ones are dropped.
    pub persist_queue_capacity: usize,
    pub hub: HubSettings,
    pub connection: ConnectionSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        let defaults = ConnectionSettings::default();
        Self {
            database_url: required_var("DATABASE_URL"),
            port: parsed_var("PORT").unwrap_or(8000),
            db_pool_size: parsed_var("DB_POOL_SIZE").unwrap_or(4),
            persist_queue_capacity: parsed_var("PERSIST_QUEUE_CAPACITY").unwrap_or(4096),
            hub: HubSettings {
                command_capacity: parsed_var("HUB_COMMAND_CAPACITY")
                    .unwrap_or(HubSettings::default().command_capacity),
            },
            connection: ConnectionSettings {
                outbound_capacity: parsed_var("OUTBOUND_BUFFER").unwrap_or(defaults.outbound_capacity),
                max_frame_bytes: parsed_var("MAX_FRAME_BYTES").unwrap_or(defaults.max_frame_bytes),
                ping_interval: parsed_var("PING_INTERVAL_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.ping_interval),
                write_timeout: parsed_var("WRITE_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.write_timeout),
                handoff_timeout: parsed_var("HANDOFF_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.handoff_timeout),
            },
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

/// Read and parse an optional variable; unset, empty, or unparsable values
/// fall back to the default.
fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}
