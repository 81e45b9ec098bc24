//! Fixed-size oracle pool with exclusive leases.
//!
//! A semaphore bounds concurrent users to the number of slots; the lease
//! holds both the permit and the slot mutex, so the UCI conversation of a
//! leased oracle can never interleave with another caller's.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

use crate::error::AnalysisError;

pub struct OraclePool<O> {
    slots: Vec<Arc<Mutex<O>>>,
    permits: Arc<Semaphore>,
}

impl<O> OraclePool<O> {
    pub fn new(oracles: Vec<O>) -> Self {
        let permits = Arc::new(Semaphore::new(oracles.len()));
        Self {
            slots: oracles.into_iter().map(|o| Arc::new(Mutex::new(o))).collect(),
            permits,
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Wait for a free oracle and lease it exclusively. The permit
    /// guarantees a free slot exists; the scan finds it.
    pub async fn lease(&self) -> Result<OracleLease<O>, AnalysisError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AnalysisError::Engine("oracle pool closed".into()))?;
        loop {
            for slot in &self.slots {
                if let Ok(guard) = slot.clone().try_lock_owned() {
                    return Ok(OracleLease {
                        guard,
                        _permit: permit,
                    });
                }
            }
            tokio::task::yield_now().await;
        }
    }
}

/// Exclusive access to one pooled oracle; returns both the slot and the
/// permit when dropped.
pub struct OracleLease<O> {
    guard: OwnedMutexGuard<O>,
    _permit: OwnedSemaphorePermit,
}

impl<O> std::ops::Deref for OracleLease<O> {
    type Target = O;

    fn deref(&self) -> &O {
        &self.guard
    }
}

impl<O> std::ops::DerefMut for OracleLease<O> {
    fn deref_mut(&mut self) -> &mut O {
        &mut self.guard
    }
}
