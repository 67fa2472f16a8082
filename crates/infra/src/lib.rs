//! # ErpSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite/SQLCipher repositories for credentials and mirrored entities
//! - The reqwest HTTP transport
//! - ERP integration adapters (OAuth token endpoint, REST mirror)
//! - Configuration loading and tracing initialisation
//! - The `ErpSyncService` facade wiring everything from a `Config`
//!
//! ## Architecture
//! - Implements traits defined in `erpsync-core`
//! - Contains all "impure" code (I/O, network, environment)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;
pub mod services;

// Re-export commonly used items
pub use database::{DbManager, SqliteCredentialRepository, SqliteEntityRepository};
pub use errors::InfraError;
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use integrations::erp::{ErpMirror, ErpOAuthClient};
pub use observability::{init_tracing, LogFormat};
pub use services::ErpSyncService;
