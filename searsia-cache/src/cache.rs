//! Running-average TTL cache for search results.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use searsia_core::error::Result;
use searsia_core::traits::{Resource, ResourceCache};
use searsia_core::types::SearchResult;

use crate::config::CacheConfig;
use crate::entry::EntrySnapshot;
use crate::refresh::RefreshCoordinator;
use crate::stats::{render_table, ExportReport, StatisticsExporter};
use crate::store::CacheStore;

/// Adaptive cache of search results.
///
/// Every resource has an estimated TTL, the running average of the estimated
/// TTLs of all results ever measured for it. A cached result younger than
/// that estimate is served without contacting the resource. Older results
/// are refreshed: an equal answer raises the entry's confirmed lifetime, a
/// different one fixes its upper bound and replaces it.
///
/// Cloning is cheap and clones share state.
///
/// # Example
///
/// ```rust,ignore
/// use searsia_cache::{CacheConfig, RunningAvgTtlCache};
///
/// let cache = RunningAvgTtlCache::with_config(CacheConfig::with_initial_ttl_ms(60_000));
/// let result = cache.get_search_result(resource.clone(), "rust").await?;
///
/// // Later, dump what was learned.
/// cache.export_statistics().await?;
/// ```
#[derive(Clone, Debug)]
pub struct RunningAvgTtlCache {
    store: Arc<CacheStore>,
    coordinator: RefreshCoordinator,
    config: Arc<CacheConfig>,
}

impl RunningAvgTtlCache {
    /// Creates a cache with default configuration (initial TTL 0).
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            store: Arc::new(CacheStore::new(config.initial_ttl_ms)),
            coordinator: RefreshCoordinator::new(config.max_background_refreshes),
            config: Arc::new(config),
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Gets the result of `query` on `resource`, from cache when it is fresh enough.
    ///
    /// Fails with `ResourceUnavailable` when a synchronous refresh fails; the
    /// cache is left exactly as it was. No stale result is served instead.
    #[instrument(skip(self, resource), fields(resource = resource.id()))]
    pub async fn get_search_result(
        &self,
        resource: Arc<dyn Resource>,
        query: &str,
    ) -> Result<Arc<SearchResult>> {
        let slot = self.store.slot(resource.id());
        self.coordinator.serve(resource, slot, query).await
    }

    /// Current running-average TTL (ms) of a resource.
    ///
    /// Unknown resources report the configured initial TTL.
    pub fn current_ttl_ms(&self, resource_id: &str) -> u64 {
        self.store
            .get(resource_id)
            .map_or(self.store.initial_ttl_ms(), |s| s.estimator().current_ttl_ms())
    }

    /// Statistics of the live entry for (resource, query).
    pub fn entry_snapshot(&self, resource_id: &str, query: &str) -> Option<EntrySnapshot> {
        self.store
            .get(resource_id)?
            .entry(query)
            .map(|e| e.snapshot())
    }

    /// Every entry registered with a resource's estimator, retired ones included.
    pub fn registered_entries(&self, resource_id: &str) -> Vec<EntrySnapshot> {
        self.store
            .get(resource_id)
            .map(|s| s.estimator().registered())
            .unwrap_or_default()
    }

    /// Identities of all resources seen so far, sorted.
    pub fn resource_ids(&self) -> Vec<String> {
        self.store.resource_ids()
    }

    /// The statistics table of one resource, as it would be exported.
    pub fn statistics_table(&self, resource_id: &str) -> Option<String> {
        let slot = self.store.get(resource_id)?;
        Some(render_table(&slot.estimator().registered()))
    }

    /// Exports statistics into the configured directory.
    pub async fn export_statistics(&self) -> Result<ExportReport> {
        self.export_statistics_to(&self.config.statistics_dir).await
    }

    /// Exports statistics into `dir`.
    pub async fn export_statistics_to(&self, dir: impl AsRef<Path>) -> Result<ExportReport> {
        StatisticsExporter::new(dir.as_ref())
            .export(&self.store)
            .await
    }
}

impl Default for RunningAvgTtlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceCache for RunningAvgTtlCache {
    async fn get_search_result(
        &self,
        resource: Arc<dyn Resource>,
        query: &str,
    ) -> Result<Arc<SearchResult>> {
        RunningAvgTtlCache::get_search_result(self, resource, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searsia_core::error::SearsiaError;
    use searsia_core::types::Hit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Constant {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Resource for Constant {
        fn id(&self) -> &str {
            "constant"
        }

        async fn search(&self, query: &str) -> Result<SearchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchResult::new(vec![Hit::new(query)]))
        }
    }

    #[tokio::test]
    async fn test_unknown_resource_reports_initial_ttl() {
        let cache = RunningAvgTtlCache::with_config(CacheConfig::with_initial_ttl_ms(750));
        assert_eq!(cache.current_ttl_ms("nowhere"), 750);
        assert!(cache.entry_snapshot("nowhere", "q").is_none());
        assert!(cache.registered_entries("nowhere").is_empty());
        assert!(cache.statistics_table("nowhere").is_none());
    }

    #[tokio::test]
    async fn test_unbounded_background_limit_builds() {
        let cache = RunningAvgTtlCache::with_config(
            CacheConfig::with_initial_ttl_ms(60_000).max_background_refreshes(usize::MAX),
        );
        let resource = Arc::new(Constant { calls: AtomicUsize::new(0) });
        cache.get_search_result(resource.clone(), "rust").await.unwrap();
        cache.get_search_result(resource.clone(), "rust").await.unwrap();
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let resource = Arc::new(Constant { calls: AtomicUsize::new(0) });
        let cache: Arc<dyn ResourceCache> =
            Arc::new(RunningAvgTtlCache::with_config(CacheConfig::with_initial_ttl_ms(60_000)));

        let first = cache.get_search_result(resource.clone(), "rust").await.unwrap();
        let second = cache.get_search_result(resource.clone(), "rust").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let resource = Arc::new(Constant { calls: AtomicUsize::new(0) });
        let cache = RunningAvgTtlCache::with_config(CacheConfig::with_initial_ttl_ms(60_000));
        let clone = cache.clone();

        cache.get_search_result(resource.clone(), "rust").await.unwrap();
        clone.get_search_result(resource.clone(), "rust").await.unwrap();
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
        assert_eq!(clone.resource_ids(), vec!["constant"]);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RunningAvgTtlCache>();
        assert_send_sync::<SearsiaError>();
    }
}
