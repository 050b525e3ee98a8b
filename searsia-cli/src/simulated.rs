//! Simulated search resources with a known update interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use searsia_core::error::{Result, SearsiaError};
use searsia_core::traits::Resource;
use searsia_core::types::{Hit, SearchResult};

const HITS_PER_RESULT: usize = 3;

/// A resource whose results change every `change_every`.
///
/// The cache never sees `change_every`; the simulation prints it next to the
/// learned TTL so the two can be compared.
pub struct SimulatedResource {
    id: String,
    change_every: Duration,
    latency: Duration,
    failure_rate: f64,
    epoch: Instant,
    searches: AtomicU64,
    failures: AtomicU64,
}

impl SimulatedResource {
    pub fn new(id: impl Into<String>, change_every: Duration) -> Self {
        Self {
            id: id.into(),
            change_every,
            latency: Duration::ZERO,
            failure_rate: 0.0,
            epoch: Instant::now(),
            searches: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    pub fn change_every(&self) -> Duration {
        self.change_every
    }

    /// Searches issued against this resource, failed ones included.
    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Index of the current content generation. A zero interval never changes.
    fn generation(&self) -> u128 {
        match self.change_every.as_millis() {
            0 => 0,
            every => self.epoch.elapsed().as_millis() / every,
        }
    }
}

#[async_trait]
impl Resource for SimulatedResource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(&self, query: &str) -> Result<SearchResult> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failure_rate > 0.0 && rand::random::<f64>() < self.failure_rate {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(SearsiaError::unavailable(&self.id, "simulated outage"));
        }

        let generation = self.generation();
        debug!(resource = %self.id, query, generation, "Simulated search");
        let hits = (1..=HITS_PER_RESULT)
            .map(|rank| {
                Hit::new(format!("{query} #{rank}"))
                    .with_url(format!("https://{}.example/{generation}/{rank}", self.id))
            })
            .collect();
        Ok(SearchResult::new(hits).with_query(query).with_resource(&self.id))
    }
}
