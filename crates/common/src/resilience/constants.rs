// Constants for the backoff scheduler

/// Lower bound of the multiplicative jitter window
pub const JITTER_MIN_FACTOR: f64 = 0.8;

/// Upper bound of the multiplicative jitter window
pub const JITTER_MAX_FACTOR: f64 = 1.2;

/// Additive jitter ceiling applied on top of an upstream wait hint
pub const WAIT_HINT_JITTER_MS: u64 = 1_000;

/// Ceiling on an upstream wait hint; longer hints are clamped to this
pub const MAX_WAIT_HINT_MS: u64 = 300_000;

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;
