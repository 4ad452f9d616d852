pub mod detection;
pub mod snapshot;

pub use detection::Detection;
pub use snapshot::Snapshot;
