//! Per-tenant OAuth credential lifecycle

pub mod ports;
pub mod token_lifecycle;

pub use token_lifecycle::TokenLifecycleManager;
