//! Bounded admission for connection handlers.

use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Counting gate that caps how many handlers run at once.
///
/// Clones share the same counter. A slot is handed out as an [`AdmissionSlot`]
/// and goes back to the gate when that value is dropped, whichever way the
/// handler holding it exits.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// One admitted handler. Dropping it releases the slot.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits until a slot is free and takes it.
    pub async fn acquire(&self) -> Result<AdmissionSlot, AcquireError> {
        let permit = Arc::clone(&self.permits).acquire_owned().await?;
        Ok(AdmissionSlot { _permit: permit })
    }

    /// Takes a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionSlot> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionSlot { _permit: permit })
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }
}
