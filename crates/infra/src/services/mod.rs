//! Service layer implementations.
//!
//! Services wire the core sync logic to the infrastructure adapters and
//! expose the operations callers use.

pub mod sync_service;

pub use sync_service::ErpSyncService;
