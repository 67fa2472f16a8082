//! Upstream call resilience and ERP mirroring

pub mod batch;
pub mod classifier;
pub mod executor;
pub mod persister;
pub mod ports;

pub use batch::BatchThrottler;
pub use classifier::TransientErrorClassifier;
pub use executor::{RequestExecutor, RetryPolicy};
pub use persister::DegradedModePersister;
