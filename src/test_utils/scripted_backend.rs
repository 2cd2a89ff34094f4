//! An in-memory backend that answers from a script and records every request.
//!
//! Shared by unit and integration tests so the retry, counting, and persister
//! tests do not each need their own fake.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::{MetricsError, TransportError},
    transport::{BackendKind, Headers, HttpBackend, Request, Response},
};

/// One scripted answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Answer with the status and an empty body.
    Status(u16),
    /// Answer with the status and the given body.
    StatusWithBody(u16, String),
    /// Fail as if the read timed out.
    Timeout,
    /// Fail as if the connection was refused.
    ConnectionRefused,
}

impl Reply {
    fn into_result(self) -> Result<Response, MetricsError> {
        match self {
            Self::Status(status) => Ok(Response::with_status(status)),
            Self::StatusWithBody(status, body) => {
                Ok(Response::new(status, Headers::new(), body.into_bytes()))
            }
            Self::Timeout => Err(TransportError::Timeout("scripted timeout".into()).into()),
            Self::ConnectionRefused => {
                Err(TransportError::Connect("scripted connection refused".into()).into())
            }
        }
    }
}

/// Backend that replays queued replies, then repeats a fallback.
#[derive(Clone, Debug)]
pub struct ScriptedBackend {
    script: Arc<Mutex<VecDeque<Reply>>>,
    fallback: Reply,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::always(Reply::Status(200))
    }
}

impl ScriptedBackend {
    /// Backend answering 200 to everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend giving the same reply to every request.
    pub fn always(reply: Reply) -> Self {
        Self {
            script: Arc::default(),
            fallback: reply,
            requests: Arc::default(),
        }
    }

    /// Queue a reply ahead of the fallback.
    pub fn then(self, reply: Reply) -> Self {
        self.push(reply);
        self
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().push_back(reply);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Wrap for injection into a transport.
    pub fn shared(&self) -> Arc<dyn HttpBackend> {
        Arc::new(self.clone())
    }
}

impl HttpBackend for ScriptedBackend {
    fn send(&self, request: &Request) -> Result<Response, MetricsError> {
        self.requests.lock().push(request.clone());
        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        reply.into_result()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }
}
