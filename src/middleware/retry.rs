//! Retry stage.
//!
//! Re-runs the inner chain while failures classify as
//! [`ResponseClass::Retryable`], sleeping an exponential backoff between
//! attempts.
//!
//! Measurement submissions are not idempotent. A retry after a timeout or a
//! dropped connection can deliver the same batch twice when the first attempt
//! reached the service; callers that cannot tolerate duplicates should set
//! `max_attempts` to 1.

use std::{
    thread,
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    error::{MetricsError, ResponseClass},
    transport::{Middleware, Next, Request, Response},
};

use super::backoff::{Backoff, BackoffPolicy};

/// Default number of physical attempts per logical request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How many times to try a request and how long to wait in between.
///
/// Two limits apply and whichever is hit first ends the retries:
/// `max_attempts`, and `backoff.deadline` measured from the first attempt.
/// A retry whose delay would end past the deadline is not started, so a
/// short deadline can yield fewer than `max_attempts` attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves like one.
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    /// Policy that makes exactly one attempt.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Same attempt budget without any sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffPolicy::immediate(),
        }
    }

    /// Run `attempt` until it succeeds, fails fatally, or the budget runs out.
    ///
    /// `attempt` receives the zero-based attempt number. When retries are
    /// exhausted the outcome of the last attempt is returned as-is.
    pub fn execute<T, E, A, C>(&self, mut attempt: A, classify: C) -> Result<T, E>
    where
        A: FnMut(u32) -> Result<T, E>,
        C: Fn(&Result<T, E>) -> ResponseClass,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let started = Instant::now();
        let mut backoff = Backoff::new(self.backoff.clone());
        let mut number = 0;
        loop {
            let outcome = attempt(number);
            number += 1;
            if classify(&outcome) != ResponseClass::Retryable {
                return outcome;
            }
            if number >= max_attempts {
                if let Err(err) = &outcome {
                    warn!("giving up after {number} attempts: {err}");
                }
                return outcome;
            }
            let delay = backoff.next_delay(number);
            if started.elapsed().saturating_add(delay) >= self.backoff.deadline {
                warn!(
                    "retry deadline of {:?} reached after {number} attempts",
                    self.backoff.deadline
                );
                return outcome;
            }
            match &outcome {
                Err(err) => warn!("attempt {number} failed: {err}; retrying in {delay:?}"),
                Ok(_) => warn!("attempt {number} was retryable; retrying in {delay:?}"),
            }
            sleep(delay);
        }
    }
}

fn sleep(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// Middleware that applies a [`RetryPolicy`] to the rest of the chain.
#[derive(Clone, Debug, Default)]
pub struct Retry {
    policy: RetryPolicy,
}

impl Retry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl Middleware for Retry {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn handle(&self, request: Request, next: Next<'_>) -> Result<Response, MetricsError> {
        self.policy.execute(
            |attempt| {
                if attempt > 0 {
                    debug!(
                        "retrying {} {} (attempt {})",
                        request.method,
                        request.url,
                        attempt + 1
                    );
                }
                // Each attempt consumes its own copy; the encoded body is shared.
                next.run(request.clone())
            },
            |outcome| match outcome {
                Ok(_) => ResponseClass::Success,
                Err(err) => err.class(),
            },
        )
    }
}
