pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;
pub mod transport;
pub mod validation;
