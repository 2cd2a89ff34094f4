//! Pipeline stages applied to every transport request.
//!
//! The transport composes them outermost first:
//! [`RequestBody`] → [`Retry`] → [`CountRequests`] → [`ExpectsStatus`].

pub mod backoff;
pub mod count_requests;
pub mod expects_status;
pub mod request_body;
pub mod retry;

pub use backoff::{Backoff, BackoffPolicy};
pub use count_requests::{CountRequests, RequestCounter, RequestStats};
pub use expects_status::{ExpectsStatus, StatusPolicy, classify_status};
pub use request_body::{Encoded, RequestBody, encode};
pub use retry::{Retry, RetryPolicy};
