//! Shared test resource for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use searsia_cache::Resource;
use searsia_core::error::{Result, SearsiaError};
use searsia_core::types::{Hit, SearchResult};

/// A resource whose answers only change when the test says so.
pub struct TestResource {
    id: String,
    version: AtomicUsize,
    failing: AtomicBool,
    latency: Duration,
    calls: AtomicUsize,
}

impl TestResource {
    pub fn new(id: &str) -> Self {
        Self::with_latency(id, Duration::ZERO)
    }

    pub fn with_latency(id: &str, latency: Duration) -> Self {
        Self {
            id: id.to_owned(),
            version: AtomicUsize::new(1),
            failing: AtomicBool::new(false),
            latency,
            calls: AtomicUsize::new(0),
        }
    }

    /// Makes every later search return a different result.
    pub fn change(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of searches issued so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resource for TestResource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(&self, query: &str) -> Result<SearchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SearsiaError::unavailable(&self.id, "connection refused"));
        }
        let version = self.version.load(Ordering::SeqCst);
        Ok(SearchResult::new(vec![Hit::new(format!("{query} v{version}"))])
            .with_query(query)
            .with_resource(&self.id))
    }
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
