//! # Logdeck
//!
//! Backend API of a log management console: session and proxy
//! authentication, root and grant based permissions, and the lifecycle of log
//! storages kept in ClickHouse and fed from Kafka. Usable both as a standalone
//! binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! logdeck = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use logdeck::config::AppConfig;
//! use logdeck::engine::ClickhouseInstances;
//! use logdeck::server::{AppState, create_router};
//! use logdeck::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/logdeck.db").unwrap();
//! store.initialize().unwrap();
//! let store: Arc<dyn Store> = Arc::new(store);
//!
//! let instances = Arc::new(ClickhouseInstances::new(store.clone()));
//! let state = Arc::new(AppState::new(store, AppConfig::default(), instances));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod permission;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
