//! Keygate — token authentication and storage service.
//!
//! Mints bearer tokens for external callers, stores only their hashes,
//! validates presented tokens, and gates HTTP handlers on permission tags.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod store;

use store::TokenStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub tokens: TokenStore,
    pub config: config::Config,
}
