//! Common traits for Searsia.
//!
//! These traits define the boundary between the cache and its collaborators:
//! the resources it queries and the serving layer that queries it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::SearchResult;

// ═══════════════════════════════════════════════════════════════════════════════
// RESOURCE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// A search provider, local or remote.
///
/// The cache never learns a TTL from the resource itself; it only observes
/// whether successive results for the same query are equal.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Stable identity of this resource.
    ///
    /// Used as the cache key, the locking domain, and the statistics file stem.
    fn id(&self) -> &str;

    /// Runs `query` against this resource.
    ///
    /// Fails with [`SearsiaError::ResourceUnavailable`](crate::SearsiaError::ResourceUnavailable)
    /// when the resource cannot answer.
    async fn search(&self, query: &str) -> Result<SearchResult>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Caching strategy for search results, as consumed by the serving layer.
#[async_trait]
pub trait ResourceCache: Send + Sync {
    /// Returns a result for `query` against `resource`, deciding transparently
    /// whether to serve from cache or to refresh.
    async fn get_search_result(
        &self,
        resource: Arc<dyn Resource>,
        query: &str,
    ) -> Result<Arc<SearchResult>>;
}
