//! # ErpSync Domain
//!
//! Business domain types and models for the ERP synchronization layer.
//!
//! This crate contains:
//! - Credential, request/response and sync-report types
//! - The `SyncError` type and `Result` alias shared by every crate
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other ErpSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
