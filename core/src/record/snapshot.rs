use crate::record::Detection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Full, immutable copy of the detection set at one point in time.
///
/// Records are kept newest first, ties broken by location ascending.
/// On the wire a snapshot is a bare JSON array of detections.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<Detection>,
}

/// Feed ordering: timestamp descending, then location ascending.
pub fn feed_order(a: &Detection, b: &Detection) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| a.location.cmp(&b.location))
}

impl Snapshot {
    /// Wraps records that are already in feed order.
    pub fn from_ordered(records: Vec<Detection>) -> Self {
        Self { records }
    }

    /// Sorts `records` into feed order and wraps them.
    pub fn from_unordered(mut records: Vec<Detection>) -> Self {
        records.sort_by(feed_order);
        Self::from_ordered(records)
    }

    pub fn records(&self) -> &[Detection] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_feed_ordered(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| feed_order(&pair[0], &pair[1]) != Ordering::Greater)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}
