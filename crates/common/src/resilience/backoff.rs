// Backoff scheduling with exponential growth and jitter
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::debug;

use super::constants::{
    JITTER_MAX_FACTOR, JITTER_MIN_FACTOR, MAX_BACKOFF_EXPONENT, MAX_WAIT_HINT_MS,
    WAIT_HINT_JITTER_MS,
};
use super::wait_hint::parse_wait_hint;

/// Where a scheduled delay came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaySource {
    /// `min(base * 2^attempt, max)` with multiplicative jitter
    Exponential,
    /// Upstream wait hint plus additive jitter
    WaitHint,
}

/// A computed wait before the next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledDelay {
    pub delay_ms: u64,
    pub source: DelaySource,
    /// The parsed hint, before jitter, when `source == WaitHint`.
    pub hint_ms: Option<u64>,
}

/// Computes how long to wait between attempts.
///
/// The jitter windows default to `[0.8, 1.2]` (multiplicative, exponential
/// schedule) and `[0, 1000)` ms (additive, wait hints). Wait hints are
/// clamped to [`MAX_WAIT_HINT_MS`] unless overridden.
#[derive(Debug, Clone, Copy)]
pub struct BackoffScheduler {
    min_factor: f64,
    max_factor: f64,
    hint_jitter_ms: u64,
    max_hint_ms: u64,
}

impl Default for BackoffScheduler {
    fn default() -> Self {
        Self {
            min_factor: JITTER_MIN_FACTOR,
            max_factor: JITTER_MAX_FACTOR,
            hint_jitter_ms: WAIT_HINT_JITTER_MS,
            max_hint_ms: MAX_WAIT_HINT_MS,
        }
    }
}

impl BackoffScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler without any randomness, for deterministic callers.
    pub fn without_jitter() -> Self {
        Self { min_factor: 1.0, max_factor: 1.0, hint_jitter_ms: 0, max_hint_ms: MAX_WAIT_HINT_MS }
    }

    /// Longest wait hint that is honoured as given.
    #[must_use]
    pub fn with_max_hint_ms(mut self, max_hint_ms: u64) -> Self {
        self.max_hint_ms = max_hint_ms;
        self
    }

    /// `min(base_ms * 2^attempt, max_ms)` before jitter.
    pub fn exponential_delay(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let multiplier = 2_u64.saturating_pow(exponent);
        base_ms.saturating_mul(multiplier).min(max_ms)
    }

    /// Exponential delay with multiplicative jitter, rounded to whole ms.
    pub fn compute_delay(&self, attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
        let capped = Self::exponential_delay(attempt, base_ms, max_ms);
        self.apply_jitter(capped)
    }

    /// Upstream wait hint plus additive jitter.
    pub fn delay_for_hint(&self, hint_ms: u64) -> u64 {
        let extra = if self.hint_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.hint_jitter_ms)
        };
        hint_ms.saturating_add(extra)
    }

    /// Pick the delay for a retry.
    ///
    /// A wait hint is only honoured when `rate_limited` is set; an
    /// unparsable hint falls back to the exponential schedule. Hints above
    /// the ceiling are clamped to it.
    pub fn schedule(
        &self,
        attempt: u32,
        base_ms: u64,
        max_ms: u64,
        rate_limited: bool,
        wait_hint: Option<&str>,
        now: DateTime<Utc>,
    ) -> ScheduledDelay {
        if rate_limited {
            if let Some(raw) = wait_hint {
                match parse_wait_hint(raw, now) {
                    Some(parsed_ms) => {
                        let hint_ms = parsed_ms.min(self.max_hint_ms);
                        if hint_ms < parsed_ms {
                            debug!(hint_ms = parsed_ms, cap_ms = hint_ms, "clamping long wait hint");
                        }
                        return ScheduledDelay {
                            delay_ms: self.delay_for_hint(hint_ms),
                            source: DelaySource::WaitHint,
                            hint_ms: Some(hint_ms),
                        };
                    }
                    None => debug!(hint = raw, "ignoring unparsable wait hint"),
                }
            }
        }

        ScheduledDelay {
            delay_ms: self.compute_delay(attempt, base_ms, max_ms),
            source: DelaySource::Exponential,
            hint_ms: None,
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn apply_jitter(&self, delay_ms: u64) -> u64 {
        if delay_ms == 0 || self.min_factor >= self.max_factor {
            return (delay_ms as f64 * self.min_factor).round() as u64;
        }
        let factor = rand::thread_rng().gen_range(self.min_factor..=self.max_factor);
        (delay_ms as f64 * factor).round().max(0.0) as u64
    }
}
