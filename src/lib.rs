pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod feedback;
pub mod memory;
pub mod pagination;
pub mod rate_limit;
pub mod seed;
pub mod state;
pub mod users;
pub mod validation;
