//! Incident number allocation.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result, StoreError};
use crate::model::IncidentId;
use crate::store::IncidentStore;

/// Hands out strictly increasing, unique incident numbers.
///
/// Ordering and uniqueness come entirely from the store's atomic increment;
/// this type adds no locking of its own.
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn IncidentStore>,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self { store }
    }

    pub async fn next(&self) -> Result<IncidentId> {
        let id = self.store.allocate_next_incident_number().await?;
        if id <= 0 {
            return Err(Error::Store(StoreError::Backend(format!(
                "counter returned non-positive incident number {id}"
            ))));
        }
        debug!(incident_id = id, "Allocated incident number");
        Ok(id)
    }
}
