//! torgate - Tor exit node feed with an authenticated exclusion list.
//!
//! The binary in `main.rs` wires these modules together; integration tests in
//! `tests/` drive the same router through [`api::router`].

use std::sync::Arc;

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod ip;
pub mod middleware;
pub mod sources;
pub mod store;
pub mod telemetry;

use auth::{CredentialStore, TokenService};
use sources::SourceAggregator;
use store::ExclusionStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: Arc<dyn ExclusionStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub tokens: TokenService,
    pub sources: SourceAggregator,
}
