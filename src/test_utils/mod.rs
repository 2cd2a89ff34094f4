//! Helpers for exercising the transport without a network.
//!
//! Compiled for unit tests and behind the `test-util` feature for
//! integration tests.

pub mod scripted_backend;

pub use scripted_backend::{Reply, ScriptedBackend};
