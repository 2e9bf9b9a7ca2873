pub mod connection;
pub mod frames;
pub mod hub;
pub mod hubs;
pub mod server;
pub mod transport;
