use std::sync::Mutex;

/// Counters for the broadcast loop and viewer sessions.
pub struct BroadcastMetrics {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks_delivered: usize,
    pub ticks_failed: usize,
    pub frames_sent: usize,
    pub send_failures: usize,
    pub viewers_connected: usize,
}

impl BroadcastMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_tick(&self, frames_sent: usize, send_failures: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.ticks_delivered += 1;
            metrics.frames_sent += frames_sent;
            metrics.send_failures += send_failures;
        }
    }

    pub fn record_failed_tick(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.ticks_failed += 1;
        }
    }

    /// A viewer's socket write failed after its frame was queued.
    pub fn record_send_failure(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.send_failures += 1;
        }
    }

    pub fn record_direct_frame(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.frames_sent += 1;
        }
    }

    pub fn record_viewer(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.viewers_connected += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for BroadcastMetrics {
    fn default() -> Self {
        Self::new()
    }
}
