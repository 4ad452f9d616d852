//! Core types for the live detection feed.
//!
//! Records and snapshots are shared by the broadcaster and the viewer;
//! the store backends are only used server side, the projector only in
//! the viewer.

pub mod prelude;
pub mod projector;
pub mod record;
pub mod store;
pub mod telemetry;

pub use prelude::{RecordStore, StoreError, StoreResult};
pub use record::{Detection, Snapshot};
