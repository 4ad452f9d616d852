use crate::prelude::{RecordStore, StoreError, StoreResult};
use crate::record::{Detection, Snapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Volatile store backed by a vector.
///
/// Can be switched into a failing state to simulate an unreachable
/// database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Detection>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Detection>) -> Self {
        Self {
            records: Mutex::new(records),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, detection: Detection) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(detection);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl RecordStore for MemoryStore {
    fn fetch_all(&self) -> StoreResult<Snapshot> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        let records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(Snapshot::from_unordered(records))
    }
}
