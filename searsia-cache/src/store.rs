//! Two-level concurrent storage: resource → (query → entry), plus one estimator per resource.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::entry::{CachedEntry, INFINITE_AGE_MS};
use crate::estimator::TtlEstimator;

/// Proof that the owning resource's refresh lock is held.
pub(crate) type RefreshGuard<'a> = MutexGuard<'a, ()>;

/// Everything the cache keeps for one resource.
///
/// The slot owns the resource's exclusion domain: every refresh, and with it
/// every mutation of the query map and the estimator, happens while
/// [`lock`](Self::lock) is held. Plain reads of the query map do not take it.
#[derive(Debug)]
pub struct ResourceSlot {
    resource_id: String,
    entries: DashMap<String, Arc<CachedEntry>>,
    estimator: TtlEstimator,
    refresh_lock: Mutex<()>,
}

impl ResourceSlot {
    fn new(resource_id: &str, initial_ttl_ms: u64) -> Self {
        Self {
            resource_id: resource_id.to_owned(),
            entries: DashMap::new(),
            estimator: TtlEstimator::new(initial_ttl_ms),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Identity of the resource this slot belongs to.
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// The resource's running-average estimator.
    pub fn estimator(&self) -> &TtlEstimator {
        &self.estimator
    }

    /// The live entry for `query`, if any. Does not lock.
    pub fn entry(&self, query: &str) -> Option<Arc<CachedEntry>> {
        self.entries.get(query).map(|e| Arc::clone(e.value()))
    }

    /// The live entry for `query` together with its age ([`INFINITE_AGE_MS`] when absent).
    pub fn lookup(&self, query: &str) -> (Option<Arc<CachedEntry>>, u64) {
        let entry = self.entry(query);
        let age_ms = entry.as_ref().map_or(INFINITE_AGE_MS, |e| e.age_ms());
        (entry, age_ms)
    }

    /// Number of live (query → entry) mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no query has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Acquires the resource's exclusion domain.
    pub(crate) async fn lock(&self) -> RefreshGuard<'_> {
        self.refresh_lock.lock().await
    }

    /// Publishes `entry` as the live entry for `query`.
    pub(crate) fn insert(&self, _guard: &RefreshGuard<'_>, query: &str, entry: Arc<CachedEntry>) {
        self.entries.insert(query.to_owned(), entry);
    }
}

/// Resource → [`ResourceSlot`] mapping.
///
/// Slots are created on first access and never removed. Entries are never
/// pruned either; retention is unbounded for the lifetime of the store.
#[derive(Debug)]
pub struct CacheStore {
    resources: DashMap<String, Arc<ResourceSlot>>,
    initial_ttl_ms: u64,
}

impl CacheStore {
    /// Creates an empty store whose estimators start at `initial_ttl_ms`.
    pub fn new(initial_ttl_ms: u64) -> Self {
        Self {
            resources: DashMap::new(),
            initial_ttl_ms,
        }
    }

    /// Returns the slot for `resource_id`, creating it on first access.
    ///
    /// Concurrent first accesses for the same resource all observe one slot.
    pub fn slot(&self, resource_id: &str) -> Arc<ResourceSlot> {
        if let Some(slot) = self.resources.get(resource_id) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .resources
            .entry(resource_id.to_owned())
            .or_insert_with(|| {
                debug!(resource = resource_id, "Creating resource slot");
                Arc::new(ResourceSlot::new(resource_id, self.initial_ttl_ms))
            });
        Arc::clone(slot.value())
    }

    /// Returns the slot for `resource_id` without creating it.
    pub fn get(&self, resource_id: &str) -> Option<Arc<ResourceSlot>> {
        self.resources.get(resource_id).map(|s| Arc::clone(s.value()))
    }

    /// All known resource identities, sorted.
    pub fn resource_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.resources.iter().map(|s| s.key().clone()).collect();
        ids.sort();
        ids
    }

    /// All slots, sorted by resource identity.
    pub fn slots(&self) -> Vec<Arc<ResourceSlot>> {
        let mut slots: Vec<_> = self.resources.iter().map(|s| Arc::clone(s.value())).collect();
        slots.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        slots
    }

    /// Running-average TTL before any measurement.
    pub fn initial_ttl_ms(&self) -> u64 {
        self.initial_ttl_ms
    }

    /// Number of known resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resource has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
