//! Delay schedules for retry policies.
//!
//! Attempt semantics: attempt `0` is the initial call (no delay); retries
//! start at attempt `1`. The exponential schedule takes an arbitrary growth
//! factor, so retry `n` waits `base * factor^(n-1)`, with the conventional
//! doubling as the default. All computations saturate at [`MAX_BACKOFF`].
//!
//! ```rust
//! use std::time::Duration;
//! use guardrail::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_secs(2))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::ZERO); // initial call
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay(2), Duration::from_millis(200));
//! assert_eq!(backoff.delay(6), Duration::from_secs(2)); // capped
//! ```

use std::time::Duration;
use thiserror::Error;

/// Delay ceiling applied when a schedule would otherwise overflow (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors returned by backoff configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackoffError {
    #[error("with_max is only valid for linear or exponential backoff")]
    MaxUnsupported,
    #[error("max must be greater than zero")]
    ZeroMax,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxBelowBase { base: Duration, max: Duration },
    #[error("with_factor is only valid for exponential backoff")]
    FactorUnsupported,
    #[error("factor must be finite and >= 1.0 (got {0})")]
    InvalidFactor(f64),
}

#[derive(Debug, Clone, PartialEq)]
enum Schedule {
    Constant { delay: Duration },
    Linear { base: Duration, max: Option<Duration> },
    Exponential { base: Duration, factor: f64, max: Option<Duration> },
}

/// A delay schedule: constant, linear, or exponential with a growth factor.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    schedule: Schedule,
}

impl Backoff {
    /// Same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self { schedule: Schedule::Constant { delay } }
    }

    /// Delay grows by `base` per retry.
    pub fn linear(base: Duration) -> Self {
        Self { schedule: Schedule::Linear { base, max: None } }
    }

    /// Delay multiplies by a factor per retry; the factor defaults to 2.
    pub fn exponential(base: Duration) -> Self {
        Self { schedule: Schedule::Exponential { base, factor: 2.0, max: None } }
    }

    /// Override the exponential growth factor. Must be finite and >= 1.0.
    pub fn with_factor(mut self, factor: f64) -> Result<Self, BackoffError> {
        if !factor.is_finite() || factor < 1.0 {
            return Err(BackoffError::InvalidFactor(factor));
        }
        match &mut self.schedule {
            Schedule::Exponential { factor: existing, .. } => {
                *existing = factor;
                Ok(self)
            }
            _ => Err(BackoffError::FactorUnsupported),
        }
    }

    /// Cap the delay for a linear or exponential schedule.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::ZeroMax);
        }
        match &mut self.schedule {
            Schedule::Linear { base, max: existing }
            | Schedule::Exponential { base, max: existing, .. } => {
                if max < *base {
                    return Err(BackoffError::MaxBelowBase { base: *base, max });
                }
                *existing = Some(max);
                Ok(self)
            }
            Schedule::Constant { .. } => Err(BackoffError::MaxUnsupported),
        }
    }

    /// Delay before the given attempt (0-based; 0 = initial call, no delay).
    pub fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match &self.schedule {
            Schedule::Constant { delay } => *delay,
            Schedule::Linear { base, max } => {
                let attempt = attempt.min(u32::MAX as usize) as u32;
                let raw = base.checked_mul(attempt).unwrap_or(MAX_BACKOFF);
                cap(raw, *max)
            }
            Schedule::Exponential { base, factor, max } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
                let secs = base.as_secs_f64() * factor.powi(exponent);
                let raw = if secs.is_finite() && secs < MAX_BACKOFF.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    MAX_BACKOFF
                };
                cap(raw, *max)
            }
        }
    }
}

fn cap(raw: Duration, max: Option<Duration>) -> Duration {
    let capped = max.map_or(raw, |m| raw.min(m));
    capped.min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_schedule_is_flat() {
        let backoff = Backoff::constant(Duration::from_secs(1));
        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(50), Duration::from_secs(1));
    }

    #[test]
    fn linear_schedule_grows_by_base() {
        let backoff = Backoff::linear(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(10), Duration::from_millis(1000));
    }

    #[test]
    fn exponential_schedule_doubles_by_default() {
        let backoff = Backoff::exponential(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
    }

    #[test]
    fn exponential_schedule_honors_custom_factor() {
        let backoff =
            Backoff::exponential(Duration::from_millis(100)).with_factor(3.0).unwrap();
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(300));
        assert_eq!(backoff.delay(3), Duration::from_millis(900));
    }

    #[test]
    fn factor_of_one_is_a_flat_schedule() {
        let backoff =
            Backoff::exponential(Duration::from_millis(500)).with_factor(1.0).unwrap();
        assert_eq!(backoff.delay(1), Duration::from_millis(500));
        assert_eq!(backoff.delay(9), Duration::from_millis(500));
    }

    #[test]
    fn invalid_factors_are_rejected() {
        let err = Backoff::exponential(Duration::from_secs(1)).with_factor(0.5).unwrap_err();
        assert!(matches!(err, BackoffError::InvalidFactor(_)));
        let err =
            Backoff::exponential(Duration::from_secs(1)).with_factor(f64::NAN).unwrap_err();
        assert!(matches!(err, BackoffError::InvalidFactor(_)));
        let err = Backoff::linear(Duration::from_secs(1)).with_factor(2.0).unwrap_err();
        assert_eq!(err, BackoffError::FactorUnsupported);
    }

    #[test]
    fn max_caps_the_schedule() {
        let backoff = Backoff::exponential(Duration::from_millis(100))
            .with_max(Duration::from_secs(1))
            .unwrap();
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(5), Duration::from_secs(1));
        assert_eq!(backoff.delay(20), Duration::from_secs(1));
    }

    #[test]
    fn with_max_on_constant_errors() {
        let err = Backoff::constant(Duration::from_secs(5))
            .with_max(Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err, BackoffError::MaxUnsupported);
    }

    #[test]
    fn max_below_base_is_rejected() {
        let err = Backoff::linear(Duration::from_secs(100))
            .with_max(Duration::from_secs(50))
            .unwrap_err();
        assert!(matches!(err, BackoffError::MaxBelowBase { .. }));
    }

    #[test]
    fn huge_attempts_saturate() {
        let backoff = Backoff::exponential(Duration::from_secs(1));
        assert_eq!(backoff.delay(1_000_000_000), MAX_BACKOFF);
        let backoff = Backoff::linear(Duration::from_secs(u64::MAX / 2));
        assert_eq!(backoff.delay(1_000_000_000), MAX_BACKOFF);
    }

    #[test]
    fn zero_base_stays_zero() {
        assert_eq!(Backoff::linear(Duration::ZERO).delay(5), Duration::ZERO);
        assert_eq!(Backoff::exponential(Duration::ZERO).delay(5), Duration::ZERO);
    }
}
