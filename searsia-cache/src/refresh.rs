//! Hit/miss decision and the refresh protocol.
//!
//! # Protocol
//!
//! 1. Unlocked lookup of the (resource, query) entry. A missing entry has infinite age.
//! 2. `age < ttl`: serve from cache. If the entry is a refresh candidate, a
//!    background refresh is spawned and never awaited.
//! 3. Otherwise take the resource's lock, look again, and either serve the
//!    entry another caller just refreshed or refresh synchronously.
//!
//! A refresh always runs under the resource's lock. It queries the resource,
//! compares the new result with the cached one, and then either extends the
//! entry's confirmed lifetime (`min_ttl`) or retires it (`max_ttl`) and
//! publishes a new entry. A failed search changes nothing.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use searsia_core::error::{Result, SearsiaError};
use searsia_core::traits::Resource;
use searsia_core::types::SearchResult;

use crate::entry::CachedEntry;
use crate::store::{RefreshGuard, ResourceSlot};

/// Outcome of one refresh, for logging and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// No previous entry; a new one was stored.
    Created,
    /// The resource returned an equal result; `min_ttl` was extended.
    Unchanged,
    /// The resource returned a different result; the old entry was retired.
    Changed,
}

/// Serializes refreshes per resource and applies their measurements.
#[derive(Clone, Debug, Default)]
pub(crate) struct RefreshCoordinator {
    background_permits: Option<Arc<Semaphore>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(max_background_refreshes: Option<usize>) -> Self {
        Self {
            background_permits: max_background_refreshes
                .map(|n| Arc::new(Semaphore::new(n.min(Semaphore::MAX_PERMITS)))),
        }
    }

    /// Serves `query` from `slot`, refreshing from `resource` when needed.
    pub(crate) async fn serve(
        &self,
        resource: Arc<dyn Resource>,
        slot: Arc<ResourceSlot>,
        query: &str,
    ) -> Result<Arc<SearchResult>> {
        let (cached, age_ms) = slot.lookup(query);
        let ttl_ms = slot.estimator().current_ttl_ms();

        if age_ms < ttl_ms {
            if let Some(entry) = cached {
                // Retired between lookup and read: fall through to the locked path.
                if let Some(result) = entry.result() {
                    debug!(resource = slot.resource_id(), query, age_ms, ttl_ms, "Cache hit");
                    if entry.is_refresh_candidate() {
                        self.spawn_background(resource, Arc::clone(&slot), query, entry);
                    }
                    return Ok(result);
                }
            }
        }

        let guard = slot.lock().await;

        // The first check was unsynchronized; another caller may have refreshed meanwhile.
        let (cached, age_ms) = slot.lookup(query);
        let ttl_ms = slot.estimator().current_ttl_ms();
        if age_ms < ttl_ms {
            if let Some(result) = cached.as_ref().and_then(|e| e.result()) {
                debug!(resource = slot.resource_id(), query, age_ms, ttl_ms, "Refreshed by another caller");
                return Ok(result);
            }
        }

        debug!(resource = slot.resource_id(), query, age_ms, ttl_ms, "Cache miss");
        let (result, _) = self
            .refresh(&guard, resource.as_ref(), &slot, query, cached)
            .await?;
        Ok(result)
    }

    /// Runs the refresh protocol. The caller must hold `slot`'s lock.
    #[instrument(skip_all, fields(resource = slot.resource_id(), query = %query))]
    pub(crate) async fn refresh(
        &self,
        guard: &RefreshGuard<'_>,
        resource: &dyn Resource,
        slot: &ResourceSlot,
        query: &str,
        previous: Option<Arc<CachedEntry>>,
    ) -> Result<(Arc<SearchResult>, RefreshOutcome)> {
        let age_ms = previous.as_ref().map(|e| e.age_ms());

        let fresh = resource.search(query).await.map_err(|e| match e {
            e @ SearsiaError::ResourceUnavailable { .. } => e,
            other => SearsiaError::unavailable(slot.resource_id(), other.to_string()),
        })?;

        let (previous, previous_result, age_ms) = match (previous, age_ms) {
            (Some(entry), Some(age_ms)) => match entry.result() {
                Some(result) => (entry, result, age_ms),
                None => return Ok(self.publish(guard, slot, query, fresh, RefreshOutcome::Created)),
            },
            _ => return Ok(self.publish(guard, slot, query, fresh, RefreshOutcome::Created)),
        };

        if *previous_result == fresh {
            previous.confirm_unchanged(age_ms);
            let ttl_ms = slot.estimator().notify_change(&previous);
            debug!(age_ms, ttl_ms, "Result unchanged");
            Ok((previous_result, RefreshOutcome::Unchanged))
        } else {
            previous.retire(age_ms);
            let ttl_ms = slot.estimator().notify_change(&previous);
            info!(age_ms, ttl_ms, "Result changed, entry retired");
            Ok(self.publish(guard, slot, query, fresh, RefreshOutcome::Changed))
        }
    }

    fn publish(
        &self,
        guard: &RefreshGuard<'_>,
        slot: &ResourceSlot,
        query: &str,
        fresh: SearchResult,
        outcome: RefreshOutcome,
    ) -> (Arc<SearchResult>, RefreshOutcome) {
        let result = Arc::new(fresh);
        slot.insert(guard, query, Arc::new(CachedEntry::new(Arc::clone(&result))));
        (result, outcome)
    }

    /// Spawns a detached refresh that only improves the statistics.
    ///
    /// Failures are logged and never reach a caller. Without a configured
    /// bound, any number of these may be in flight at once.
    fn spawn_background(
        &self,
        resource: Arc<dyn Resource>,
        slot: Arc<ResourceSlot>,
        query: &str,
        trigger: Arc<CachedEntry>,
    ) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(resource = slot.resource_id(), query, error = %e, "No runtime for background refresh");
                return;
            }
        };

        let permit = match &self.background_permits {
            Some(permits) => match Arc::clone(permits).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    debug!(resource = slot.resource_id(), query, "Background refresh limit reached, skipping");
                    return;
                }
            },
            None => None,
        };

        let coordinator = self.clone();
        let query = query.to_owned();
        handle.spawn(async move {
            let _permit = permit;
            if let Err(e) = coordinator
                .refresh_in_background(resource, &slot, &query, trigger)
                .await
            {
                warn!(resource = slot.resource_id(), query = %query, error = %e, "Background refresh failed");
            }
        });
    }

    async fn refresh_in_background(
        &self,
        resource: Arc<dyn Resource>,
        slot: &ResourceSlot,
        query: &str,
        trigger: Arc<CachedEntry>,
    ) -> Result<Option<RefreshOutcome>> {
        let guard = slot.lock().await;

        match slot.entry(query) {
            Some(current) if Arc::ptr_eq(&current, &trigger) && !current.is_retired() => {}
            _ => {
                debug!(resource = slot.resource_id(), query, "Entry superseded, dropping background refresh");
                return Ok(None);
            }
        }

        let (_, outcome) = self
            .refresh(&guard, resource.as_ref(), slot, query, Some(trigger))
            .await?;
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CacheStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use searsia_core::types::Hit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the queued results in order, failing once the queue is empty.
    struct Scripted {
        results: Mutex<Vec<Option<&'static str>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(script: &[Option<&'static str>]) -> Self {
            Self {
                results: Mutex::new(script.iter().rev().copied().collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Resource for Scripted {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn search(&self, _query: &str) -> Result<SearchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.results.lock().pop().flatten() {
                Some(title) => Ok(SearchResult::new(vec![Hit::new(title)])),
                None => Err(SearsiaError::unavailable("scripted", "down")),
            }
        }
    }

    async fn refresh_once(
        coordinator: &RefreshCoordinator,
        resource: &Scripted,
        slot: &ResourceSlot,
    ) -> Result<(Arc<SearchResult>, RefreshOutcome)> {
        let guard = slot.lock().await;
        let previous = slot.entry("q");
        coordinator.refresh(&guard, resource, slot, "q", previous).await
    }

    #[tokio::test]
    async fn test_refresh_outcomes() {
        let coordinator = RefreshCoordinator::default();
        let store = CacheStore::new(0);
        let slot = store.slot("scripted");
        let resource = Scripted::new(&[Some("a"), Some("a"), Some("b")]);

        let (first, outcome) = refresh_once(&coordinator, &resource, &slot).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Created);
        assert!(slot.estimator().is_empty());

        let (second, outcome) = refresh_once(&coordinator, &resource, &slot).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Unchanged);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(slot.estimator().count(), 1);

        let old = slot.entry("q").unwrap();
        let (third, outcome) = refresh_once(&coordinator, &resource, &slot).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Changed);
        assert_eq!(third.hits[0].title, "b");
        assert!(old.is_retired());
        assert!(!Arc::ptr_eq(&old, &slot.entry("q").unwrap()));
        assert_eq!(slot.estimator().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_changes_nothing() {
        let coordinator = RefreshCoordinator::default();
        let store = CacheStore::new(0);
        let slot = store.slot("scripted");
        let resource = Scripted::new(&[Some("a"), None]);

        refresh_once(&coordinator, &resource, &slot).await.unwrap();
        let before = slot.entry("q").unwrap().snapshot();

        let err = refresh_once(&coordinator, &resource, &slot).await.unwrap_err();
        assert!(matches!(err, SearsiaError::ResourceUnavailable { .. }));
        assert_eq!(slot.entry("q").unwrap().snapshot(), before);
        assert!(slot.estimator().is_empty());
    }

    #[tokio::test]
    async fn test_background_refresh_skips_superseded_entry() {
        let coordinator = RefreshCoordinator::default();
        let store = CacheStore::new(0);
        let slot = store.slot("scripted");
        let resource = Arc::new(Scripted::new(&[Some("a"), Some("b")]));

        refresh_once(&coordinator, &resource, &slot).await.unwrap();
        let stale = slot.entry("q").unwrap();
        refresh_once(&coordinator, &resource, &slot).await.unwrap();
        assert_eq!(resource.calls.load(Ordering::SeqCst), 2);

        let outcome = coordinator
            .refresh_in_background(resource.clone(), &slot, "q", stale)
            .await
            .unwrap();
        assert_eq!(outcome, None);
        assert_eq!(resource.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_background_limit_is_clamped() {
        let coordinator = RefreshCoordinator::new(Some(usize::MAX));
        let permits = coordinator.background_permits.unwrap();
        assert_eq!(permits.available_permits(), Semaphore::MAX_PERMITS);

        let disabled = RefreshCoordinator::new(Some(0));
        assert_eq!(disabled.background_permits.unwrap().available_permits(), 0);
    }

    #[tokio::test]
    async fn test_background_limit_skips_when_exhausted() {
        let coordinator = RefreshCoordinator::new(Some(1));
        let permits = coordinator.background_permits.clone().unwrap();
        let _held = permits.try_acquire_owned().unwrap();

        let store = CacheStore::new(0);
        let slot = store.slot("scripted");
        let resource = Arc::new(Scripted::new(&[Some("a"), Some("a")]));
        refresh_once(&coordinator, &resource, &slot).await.unwrap();
        let entry = slot.entry("q").unwrap();

        coordinator.spawn_background(resource.clone(), Arc::clone(&slot), "q", entry);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
    }
}
