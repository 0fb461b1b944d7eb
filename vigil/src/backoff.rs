//! Restart pacing: exponential backoff with jitter.
//!
//! The delay doubles per consecutive attempt up to a ceiling, then a
//! uniform jitter spreads restarts out so a fleet of deployments recovering
//! from the same platform outage does not stampede it in lockstep.

use std::time::Duration;

use rand::Rng;
use rand::RngExt;

/// Default jitter fraction (±30%).
pub const DEFAULT_JITTER: f64 = 0.3;

/// Maximum exponent to prevent overflow.
const MAX_EXPONENT: u32 = 10;

/// Backoff policy for restart delays.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Base delay for attempt 0.
    pub initial: Duration,
    /// Ceiling on the un-jittered delay.
    pub max: Duration,
    /// Floor applied after jitter.
    pub floor: Duration,
    /// Jitter fraction applied symmetrically around the clamped delay.
    pub jitter: f64,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration, floor: Duration) -> Self {
        Self {
            initial,
            max,
            floor,
            jitter: DEFAULT_JITTER,
        }
    }

    /// Delay before the next restart, given the attempt count read from the
    /// recovery state before it is incremented.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::rng())
    }

    /// Same as [`delay_for_attempt`](Self::delay_for_attempt) with an
    /// injected randomness source, so tests can pin the jitter.
    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);

        let jittered = if self.jitter > 0.0 {
            let factor = 1.0 + rng.random_range(-self.jitter..=self.jitter);
            Duration::from_secs_f64(base.as_secs_f64() * factor)
        } else {
            base
        };

        jittered.max(self.floor)
    }

    /// The clamped exponential term without jitter.
    fn base_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.min(MAX_EXPONENT));
        self.initial.saturating_mul(multiplier).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(10),
            Duration::from_secs(900),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn delay_respects_floor_and_jitter_ceiling() {
        let policy = policy();
        let mut rng = StdRng::seed_from_u64(7);

        for attempt in 0..64 {
            let delay = policy.delay_with_rng(attempt, &mut rng);
            assert!(delay >= policy.floor, "attempt {} below floor", attempt);
            assert!(
                delay.as_secs_f64() <= policy.max.as_secs_f64() * (1.0 + policy.jitter) + 1e-6,
                "attempt {} exceeds jitter ceiling",
                attempt
            );
        }
    }

    #[test]
    fn base_delay_doubles_then_plateaus() {
        let policy = policy();

        assert_eq!(policy.base_delay(0), Duration::from_secs(10));
        assert_eq!(policy.base_delay(1), Duration::from_secs(20));
        assert_eq!(policy.base_delay(2), Duration::from_secs(40));
        assert_eq!(policy.base_delay(3), Duration::from_secs(80));

        // 10 * 2^7 = 1280 > 900: clamped from here on.
        assert_eq!(policy.base_delay(7), Duration::from_secs(900));
        assert_eq!(policy.base_delay(12), Duration::from_secs(900));
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(900));
    }

    #[test]
    fn expected_delay_is_non_decreasing_up_to_the_plateau() {
        // With jitter disabled the delay equals its expectation.
        let mut policy = policy();
        policy.jitter = 0.0;
        let mut rng = StdRng::seed_from_u64(1);

        let mut previous = Duration::ZERO;
        for attempt in 0..16 {
            let delay = policy.delay_with_rng(attempt, &mut rng);
            assert!(delay >= previous, "decreased at attempt {}", attempt);
            previous = delay;
        }
        assert_eq!(previous, Duration::from_secs(900));
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let policy = policy();
        let a = policy.delay_with_rng(4, &mut StdRng::seed_from_u64(99));
        let b = policy.delay_with_rng(4, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn tiny_initial_delay_is_floored() {
        let policy = BackoffPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(900),
            Duration::from_secs(5),
        );
        let mut rng = StdRng::seed_from_u64(3);
        assert!(policy.delay_with_rng(0, &mut rng) >= Duration::from_secs(5));
    }
}
