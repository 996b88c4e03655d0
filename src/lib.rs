pub mod app;
pub mod authz;
pub mod commands;
pub mod config;
pub mod db;
pub mod docs;
pub mod errors;
pub mod events;
pub mod jwt;
pub mod mediator;
pub mod models;
pub mod provider;
pub mod routes;
pub mod seed;
pub mod utils;

// Re-export commonly used items for tests
pub use app::create_app;
