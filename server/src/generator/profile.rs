use anyhow::{bail, Context};
use chrono::{DateTime, FixedOffset, Utc};
use feedcore::store::SqliteStore;
use feedcore::Detection;
use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// Configuration for the synthetic detection producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Camera source id to location name.
    pub sources: BTreeMap<i64, String>,
    pub period_ms: u64,
    pub seed: u64,
    /// Offset of the producer's clock, used for the stored date/time.
    pub utc_offset_minutes: i32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            sources: BTreeMap::from([(0, "Gate1".to_string()), (1, "Gate2".to_string())]),
            period_ms: 1500,
            seed: 0,
            utc_offset_minutes: 330,
        }
    }
}

/// Writes a detection for a random configured source on every period.
pub struct DemoGenerator {
    sources: Vec<(i64, String)>,
    period: Duration,
    zone: FixedOffset,
    rng: StdRng,
}

impl DemoGenerator {
    pub fn new(config: DemoConfig) -> anyhow::Result<Self> {
        if config.sources.is_empty() {
            bail!("demo generator needs at least one source");
        }
        let zone = FixedOffset::east_opt(config.utc_offset_minutes * 60)
            .with_context(|| format!("utc offset {} minutes", config.utc_offset_minutes))?;
        Ok(Self {
            sources: config.sources.into_iter().collect(),
            period: Duration::from_millis(config.period_ms.max(1)),
            zone,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    pub fn next_detection(&mut self, now: DateTime<Utc>) -> Detection {
        let index = self.rng.gen_range(0..self.sources.len());
        let (source, location) = &self.sources[index];
        Detection::stamped(now, location.clone(), *source, &self.zone)
    }

    pub async fn run(mut self, store: Arc<SqliteStore>) {
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let detection = self.next_detection(Utc::now());
            let writer = Arc::clone(&store);
            let written = detection.clone();
            match tokio::task::spawn_blocking(move || writer.record_detection(&written)).await {
                Ok(Ok(removed)) => info!(
                    "demo detection at {} (source {}), {} collapsed",
                    detection.location, detection.source, removed
                ),
                Ok(Err(err)) => warn!("demo detection not stored: {}", err),
                Err(err) => warn!("demo writer aborted: {}", err),
            }
        }
    }
}
