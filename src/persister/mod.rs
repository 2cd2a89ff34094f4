//! Destinations for metrics batches.
//!
//! Callers submit through [`Persister`] without caring whether the batch goes
//! to the service ([`NetworkPersister`]) or into memory ([`TestPersister`]).

use log::warn;

use crate::{
    config::PersistenceMode, error::PersistenceError, measurement::MetricsBatch,
    transport::Transport,
};

pub mod network;
pub mod test_sink;

pub use network::NetworkPersister;
pub use test_sink::{Persisted, TestPersister};

/// Something that can store a metrics batch.
pub trait Persister: Send + Sync {
    /// Store the batch, reporting why it was not stored.
    fn persist(&self, batch: &MetricsBatch) -> Result<(), PersistenceError>;

    /// Store the batch, logging failures. Returns whether it was stored.
    fn submit(&self, batch: &MetricsBatch) -> bool {
        match self.persist(batch) {
            Ok(()) => true,
            Err(err) => {
                warn!("dropped metrics batch of {} measurements: {err}", batch.len());
                false
            }
        }
    }

    /// Everything stored so far, for persisters that keep batches in memory.
    fn persisted(&self) -> Option<Persisted> {
        None
    }

    /// Forget stored batches. Does nothing for persisters that keep none.
    fn reset(&self) {}
}

/// Persister for `mode`.
///
/// `Test` mode ignores the transport and collects batches in memory; read
/// them back through [`Persister::persisted`].
pub fn persister_for(mode: PersistenceMode, transport: Transport) -> Box<dyn Persister> {
    match mode {
        PersistenceMode::Direct => Box::new(NetworkPersister::new(transport)),
        PersistenceMode::Test => Box::new(TestPersister::new()),
    }
}
