pub mod app;
pub mod config;
pub mod focus;
pub mod host;
pub mod logger;
pub mod manifest;
pub mod registry;
pub mod router;
pub mod schema;
pub mod server;
pub mod session;
