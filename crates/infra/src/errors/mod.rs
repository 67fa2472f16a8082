//! Infrastructure error conversions

pub mod conversions;

pub use conversions::{map_join_error, transport_error, InfraError};
