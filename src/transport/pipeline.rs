//! Middleware chain wrapped around the backend.
//!
//! ```text
//! request ──► stage 0 ──► stage 1 ──► … ──► backend.send
//!                 ◄──────────◄──────────◄──── response / error
//! ```
//!
//! Each stage receives the request and a [`Next`] handle for the rest of the
//! chain. A stage may transform the request, observe the result, or call
//! `next.run` several times (the retry stage does). `Next` is `Copy`, so
//! re-invoking the remainder of the chain is just another call.

use crate::error::MetricsError;

use super::{
    backend::HttpBackend,
    request::{Request, Response},
};

/// A single pipeline stage.
pub trait Middleware: Send + Sync {
    /// Stage name for identification and logging.
    fn name(&self) -> &'static str;

    /// Handle a request, delegating to `next` for the rest of the chain.
    fn handle(&self, request: Request, next: Next<'_>) -> Result<Response, MetricsError>;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Box<dyn Middleware>],
    backend: &'a dyn HttpBackend,
}

impl<'a> Next<'a> {
    /// Run the remaining stages and finally the backend.
    pub fn run(self, request: Request) -> Result<Response, MetricsError> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(
                request,
                Next {
                    stages: rest,
                    backend: self.backend,
                },
            ),
            None => self.backend.send(&request),
        }
    }
}

/// Ordered list of stages, outermost first.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage inside the ones already present.
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.stages.push(Box::new(middleware));
        self
    }

    /// Send `request` through every stage and the backend.
    pub fn run(
        &self,
        backend: &dyn HttpBackend,
        request: Request,
    ) -> Result<Response, MetricsError> {
        Next {
            stages: &self.stages,
            backend,
        }
        .run(request)
    }

    /// Get names of all stages in chain order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.names())
            .finish()
    }
}
