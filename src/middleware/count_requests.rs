//! Per-attempt request accounting.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    error::MetricsError,
    transport::{Middleware, Next, Request, Response},
};

#[derive(Debug, Default)]
struct Counts {
    total: AtomicU64,
    failed: AtomicU64,
}

/// Shared count of physical attempts made by one transport.
///
/// Clones observe the same counts. Counts only ever increase.
#[derive(Clone, Debug, Default)]
pub struct RequestCounter {
    inner: Arc<Counts>,
}

/// Point-in-time copy of a [`RequestCounter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub total: u64,
    pub failed: u64,
}

impl RequestStats {
    pub fn succeeded(&self) -> u64 {
        self.total - self.failed
    }
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an attempt is about to be made.
    pub fn on_attempt(&self, _request: &Request) {
        self.inner.total.fetch_add(1, Ordering::Relaxed);
    }

    fn on_failure(&self) {
        self.inner.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Attempts made so far.
    pub fn total(&self) -> u64 {
        self.inner.total.load(Ordering::Relaxed)
    }

    /// Attempts that ended in an error, including rejected statuses.
    pub fn failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.snapshot().succeeded()
    }

    pub fn snapshot(&self) -> RequestStats {
        // Read failed first so a concurrent attempt cannot make it exceed total.
        let failed = self.failed();
        RequestStats {
            total: self.total(),
            failed,
        }
    }
}

/// Middleware that counts every request passing through it.
///
/// Placed inside the retry stage, so each retry is counted separately.
#[derive(Clone, Debug, Default)]
pub struct CountRequests {
    counter: RequestCounter,
}

impl CountRequests {
    pub fn new(counter: RequestCounter) -> Self {
        Self { counter }
    }

    pub fn counter(&self) -> &RequestCounter {
        &self.counter
    }
}

impl Middleware for CountRequests {
    fn name(&self) -> &'static str {
        "count_requests"
    }

    fn handle(&self, request: Request, next: Next<'_>) -> Result<Response, MetricsError> {
        self.counter.on_attempt(&request);
        let result = next.run(request);
        if result.is_err() {
            self.counter.on_failure();
        }
        result
    }
}
