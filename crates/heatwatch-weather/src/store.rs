//! In-memory store of the latest reading per location.

use parking_lot::RwLock;

use crate::types::{LocatedReading, Readings};

/// Latest readings, last write wins per location key.
#[derive(Debug, Default)]
pub struct ReadingStore {
    readings: RwLock<Readings>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch into the store. Locations absent from the batch keep
    /// their previous reading.
    pub fn set_readings(&self, batch: Readings) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        self.readings.write().extend(batch);
        tracing::debug!("Published {} readings", count);
    }

    pub fn get(&self, key: &str) -> Option<LocatedReading> {
        self.readings.read().get(key).cloned()
    }

    /// Owned copy of all readings, consistent at the moment of the call.
    pub fn snapshot(&self) -> Readings {
        self.readings.read().clone()
    }

    pub fn len(&self) -> usize {
        self.readings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.read().is_empty()
    }

    pub fn clear(&self) {
        self.readings.write().clear();
    }
}
