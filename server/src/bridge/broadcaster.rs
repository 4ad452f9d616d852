//! Periodic snapshot fan-out.
//!
//! A tick fetches the whole detection set, serializes it once and queues
//! the same frame for every registered viewer. Ticks that fail to fetch
//! send nothing; the next tick starts from scratch.

use crate::bridge::registry::{Frame, FrameSender, Registry};
use feedcore::telemetry::BroadcastMetrics;
use feedcore::{RecordStore, Snapshot, StoreError};
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// Period between broadcast ticks.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

#[derive(thiserror::Error, Debug)]
pub enum BroadcastError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("encoding snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outcome of one delivered tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub seq: u64,
    pub delivered: usize,
    pub closed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Broadcaster {
    store: Arc<dyn RecordStore>,
    registry: Registry,
    metrics: Arc<BroadcastMetrics>,
    sequence: Arc<AtomicU64>,
}

impl Broadcaster {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: Registry,
        metrics: Arc<BroadcastMetrics>,
    ) -> Self {
        Self {
            store,
            registry,
            metrics,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<BroadcastMetrics> {
        &self.metrics
    }

    /// Queries the store off the async workers.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, StoreError> {
        let store = Arc::clone(&self.store);
        let snapshot = tokio::task::spawn_blocking(move || store.fetch_all())
            .await
            .map_err(|err| StoreError::Unavailable(format!("store query aborted: {}", err)))??;
        debug_assert!(snapshot.is_feed_ordered(), "store returned records out of feed order");
        Ok(snapshot)
    }

    async fn fetch_frame(&self) -> Result<Frame, BroadcastError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.fetch_snapshot().await?;
        Ok(Frame {
            seq,
            body: snapshot.to_json()?.into(),
        })
    }

    /// Runs one broadcast cycle.
    pub async fn tick(&self) -> Result<TickReport, BroadcastError> {
        let frame = match self.fetch_frame().await {
            Ok(frame) => frame,
            Err(err) => {
                warn!("broadcast tick skipped: {}", err);
                self.metrics.record_failed_tick();
                return Err(err);
            }
        };

        let report = self.deliver(&frame);
        self.metrics.record_tick(report.delivered, report.failed);
        debug!(
            "tick {} -> {} delivered, {} closed, {} failed",
            report.seq, report.delivered, report.closed, report.failed
        );
        Ok(report)
    }

    fn deliver(&self, frame: &Frame) -> TickReport {
        let mut report = TickReport {
            seq: frame.seq,
            delivered: 0,
            closed: 0,
            failed: 0,
        };

        for (id, sender) in self.registry.members() {
            if sender.is_closed() {
                self.registry.remove(id);
                report.closed += 1;
                continue;
            }
            match sender.offer(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    warn!("send to viewer {} failed, dropping it", id);
                    self.registry.remove(id);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Sends one freshly fetched snapshot to a single viewer, outside the
    /// timer cycle.
    pub async fn greet(&self, sender: &FrameSender) -> Result<(), BroadcastError> {
        let frame = self.fetch_frame().await?;
        if sender.offer(frame).is_ok() {
            self.metrics.record_direct_frame();
        }
        Ok(())
    }

    /// Ticks forever every `period`. Late ticks are skipped, never
    /// bunched up.
    pub async fn run(self, period: Duration) {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let _ = self.tick().await;
        }
    }
}
