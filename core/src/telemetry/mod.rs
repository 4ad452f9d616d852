pub mod metrics;

pub use metrics::{BroadcastMetrics, MetricsSnapshot};
