//! Optional randomization of retry delays.
//!
//! The default for retry policies is [`Jitter::None`], which keeps the
//! backoff schedule deterministic. `Full` and `Equal` spread concurrent
//! retries to avoid synchronized bursts against a recovering dependency.

use rand::{rng, Rng};
use std::time::Duration;

/// Strategy for randomizing a computed backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// Use the exact backoff delay.
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[delay/2, delay]`, keeping a floor while adding spread.
    Equal,
}

impl Jitter {
    pub fn full() -> Self {
        Jitter::Full
    }

    pub fn equal() -> Self {
        Jitter::Equal
    }

    /// Apply jitter to a delay using the thread-local RNG.
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rng();
        self.apply_with_rng(delay, &mut rng)
    }

    /// Apply jitter with a caller-supplied RNG, for deterministic tests.
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        let millis = delay.as_millis().try_into().unwrap_or(u64::MAX);
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                if millis == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(0..=millis))
            }
            Jitter::Equal => {
                if millis == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(millis / 2..=millis))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_passes_the_delay_through() {
        let delay = Duration::from_millis(750);
        assert_eq!(Jitter::None.apply(delay), delay);
    }

    #[test]
    fn full_stays_within_bounds() {
        let delay = Duration::from_millis(100);
        for _ in 0..100 {
            let jittered = Jitter::full().apply(delay);
            assert!(jittered <= delay);
        }
    }

    #[test]
    fn equal_keeps_half_the_delay_as_floor() {
        let delay = Duration::from_millis(100);
        for _ in 0..100 {
            let jittered = Jitter::equal().apply(delay);
            assert!(jittered >= Duration::from_millis(50));
            assert!(jittered <= delay);
        }
    }

    #[test]
    fn zero_delay_is_a_fixed_point() {
        assert_eq!(Jitter::full().apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(Jitter::equal().apply(Duration::ZERO), Duration::ZERO);
    }
}
