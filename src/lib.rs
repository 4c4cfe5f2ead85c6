//! Desktop sync client for the photo sharing service.
//!
//! Watches local project folders and uploads every new image exactly once to
//! the web service's desktop-sync endpoint.

pub mod cli;
pub mod config;
pub mod server_client;
pub mod sync;
pub mod types;

pub use config::ClientConfig;
pub use types::SyncError;
