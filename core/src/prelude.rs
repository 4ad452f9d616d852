use crate::record::Snapshot;

/// Failure of a store query.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read side of the detection store.
///
/// Implementations return every record, newest first, ties broken by
/// location ascending.
pub trait RecordStore: Send + Sync {
    fn fetch_all(&self) -> StoreResult<Snapshot>;
}
