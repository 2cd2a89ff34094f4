//! Exponential backoff schedule used between retry attempts.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Default base delay before the first retry.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Default maximum delay between retries.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(10);
/// Default absolute window for all retries of one request.
pub const DEFAULT_BACKOFF_DEADLINE: Duration = Duration::from_secs(120);

/// Exponential backoff policy for retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Window for all retries of one request, from the first attempt. A retry
    /// is not started if its delay would end past this point.
    pub deadline: Duration,
    /// Randomise each delay within the lower half of its ceiling.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            cap: DEFAULT_BACKOFF_CAP,
            deadline: DEFAULT_BACKOFF_DEADLINE,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Policy that retries without sleeping.
    pub fn immediate() -> Self {
        Self {
            base: Duration::ZERO,
            cap: Duration::ZERO,
            jitter: false,
            ..Self::default()
        }
    }

    /// Upper bound for the delay before retry `retry` (1-based).
    pub fn ceiling(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base.saturating_mul(1 << exponent).min(self.cap)
    }
}

/// Per-request backoff state.
///
/// Delays never shrink from one retry to the next and never exceed the cap.
pub struct Backoff {
    policy: BackoffPolicy,
    previous: Duration,
    rng: StdRng,
}

impl Backoff {
    /// Create a new state machine from the supplied policy.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            previous: Duration::ZERO,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic jitter for tests.
    pub fn with_seed(policy: BackoffPolicy, seed: u64) -> Self {
        Self {
            policy,
            previous: Duration::ZERO,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Delay to wait before retry `retry` (1-based).
    pub fn next_delay(&mut self, retry: u32) -> Duration {
        let ceiling = self.policy.ceiling(retry);
        let ceiling_ms = ceiling.as_millis().min(u128::from(u64::MAX)) as u64;
        let sleep = if self.policy.jitter && ceiling_ms > 1 {
            Duration::from_millis(self.rng.gen_range(ceiling_ms / 2..=ceiling_ms))
        } else {
            ceiling
        };
        let delay = sleep.max(self.previous).min(self.policy.cap);
        self.previous = delay;
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy(jitter: bool) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(1),
            deadline: Duration::from_secs(5),
            jitter,
        }
    }

    #[rstest]
    #[case(1, 100)]
    #[case(2, 200)]
    #[case(3, 400)]
    #[case(4, 800)]
    #[case(5, 1000)]
    #[case(40, 1000)]
    fn ceiling_doubles_until_cap(#[case] retry: u32, #[case] expected_ms: u64) {
        assert_eq!(policy(false).ceiling(retry), Duration::from_millis(expected_ms));
    }

    #[test]
    fn delays_without_jitter_follow_ceiling() {
        let mut backoff = Backoff::new(policy(false));
        let delays: Vec<_> = (1..=5).map(|n| backoff.next_delay(n)).collect();
        assert_eq!(
            delays,
            [100, 200, 400, 800, 1000].map(Duration::from_millis).to_vec()
        );
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(42)]
    fn jittered_delays_are_monotonic_and_capped(#[case] seed: u64) {
        let mut backoff = Backoff::with_seed(policy(true), seed);
        let mut previous = Duration::ZERO;
        for retry in 1..=12 {
            let delay = backoff.next_delay(retry);
            assert!(delay >= previous, "delay shrank at retry {retry}");
            assert!(delay <= Duration::from_secs(1));
            assert!(delay >= backoff.policy().ceiling(retry) / 2);
            previous = delay;
        }
    }

    #[test]
    fn immediate_policy_never_sleeps() {
        let mut backoff = Backoff::new(BackoffPolicy::immediate());
        assert!((1..=4).all(|n| backoff.next_delay(n).is_zero()));
    }
}
