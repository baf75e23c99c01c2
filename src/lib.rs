//! # Quire
//!
//! Backend for a multi-tenant blogging dashboard: users own sites, sites own
//! posts, and a paid subscription lifts the free-plan site limit. Usable both
//! as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! quire = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quire::billing::StripeClient;
//! use quire::config::{BillingConfig, ServerConfig};
//! use quire::server::{AppState, create_router};
//!
//! let config = ServerConfig {
//!     database_url: "sqlite://./data/quire.db".to_string(),
//!     billing: BillingConfig::new("sk_live_...", "price_..."),
//!     ..ServerConfig::default()
//! };
//! let billing = Arc::new(StripeClient::new(&config.billing)?);
//! let state = Arc::new(AppState::new(&config, billing)?);
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `quire` binary. Disable with `default-features = false`.

pub mod auth;
pub mod billing;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
