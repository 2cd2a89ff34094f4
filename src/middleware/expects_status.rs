//! Status validation stage.
//!
//! Converts non-2xx responses into errors so the stages outside it only see
//! successful responses in the `Ok` branch.
//!
//! | Status             | Class     | Error                         |
//! |--------------------|-----------|-------------------------------|
//! | 200-299            | Success   | none                          |
//! | 429, 502, 503, 504 | Retryable | [`MetricsError::RetryableStatus`] |
//! | anything else      | Fatal     | [`MetricsError::FatalStatus`] |

use std::collections::BTreeSet;

use crate::{
    error::{MetricsError, ResponseClass, StatusKind},
    transport::{Middleware, Next, Request, Response},
};

/// Statuses retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Classify a status code against the default table.
pub fn classify_status(status: u16) -> ResponseClass {
    StatusPolicy::default().classify(status)
}

/// Which non-2xx statuses are worth retrying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusPolicy {
    retryable: BTreeSet<u16>,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::with_retryable(DEFAULT_RETRYABLE_STATUSES)
    }
}

impl StatusPolicy {
    /// Replace the retryable set. 2xx codes in `statuses` are ignored.
    pub fn with_retryable(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            retryable: statuses
                .into_iter()
                .filter(|status| !(200..=299).contains(status))
                .collect(),
        }
    }

    pub fn retryable(&self) -> impl Iterator<Item = u16> + '_ {
        self.retryable.iter().copied()
    }

    pub fn classify(&self, status: u16) -> ResponseClass {
        match status {
            200..=299 => ResponseClass::Success,
            s if self.retryable.contains(&s) => ResponseClass::Retryable,
            _ => ResponseClass::Fatal,
        }
    }

    /// Pass successful responses through and turn the rest into errors.
    pub fn check(&self, response: Response) -> Result<Response, MetricsError> {
        let status = response.status();
        match self.classify(status) {
            ResponseClass::Success => Ok(response),
            ResponseClass::Retryable => Err(MetricsError::RetryableStatus {
                status,
                body: response.text(),
            }),
            ResponseClass::Fatal => Err(MetricsError::FatalStatus {
                status,
                kind: StatusKind::from_status(status),
                body: response.text(),
            }),
        }
    }
}

/// Middleware applying a [`StatusPolicy`] to backend responses.
#[derive(Clone, Debug, Default)]
pub struct ExpectsStatus {
    policy: StatusPolicy,
}

impl ExpectsStatus {
    pub fn new(policy: StatusPolicy) -> Self {
        Self { policy }
    }
}

impl Middleware for ExpectsStatus {
    fn name(&self) -> &'static str {
        "expects_status"
    }

    fn handle(&self, request: Request, next: Next<'_>) -> Result<Response, MetricsError> {
        self.policy.check(next.run(request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Headers;
    use rstest::rstest;

    #[rstest]
    #[case(200, ResponseClass::Success)]
    #[case(202, ResponseClass::Success)]
    #[case(204, ResponseClass::Success)]
    #[case(429, ResponseClass::Retryable)]
    #[case(502, ResponseClass::Retryable)]
    #[case(503, ResponseClass::Retryable)]
    #[case(504, ResponseClass::Retryable)]
    #[case(500, ResponseClass::Fatal)]
    #[case(400, ResponseClass::Fatal)]
    #[case(401, ResponseClass::Fatal)]
    #[case(404, ResponseClass::Fatal)]
    #[case(422, ResponseClass::Fatal)]
    #[case(301, ResponseClass::Fatal)]
    fn default_table(#[case] status: u16, #[case] expected: ResponseClass) {
        assert_eq!(classify_status(status), expected);
    }

    #[test]
    fn retryable_set_can_be_overridden() {
        let policy = StatusPolicy::with_retryable([500, 204]);
        assert_eq!(policy.classify(500), ResponseClass::Retryable);
        assert_eq!(policy.classify(503), ResponseClass::Fatal);
        assert_eq!(policy.classify(204), ResponseClass::Success);
        assert_eq!(policy.retryable().collect::<Vec<_>>(), vec![500]);
    }

    #[test]
    fn fatal_errors_carry_kind_and_body() {
        let response = Response::new(401, Headers::new(), b"bad token".to_vec());
        let err = StatusPolicy::default().check(response).expect_err("fatal");
        match err {
            MetricsError::FatalStatus { status, kind, body } => {
                assert_eq!(status, 401);
                assert_eq!(kind, StatusKind::Unauthorized);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
