//! # Searsia Cache
//!
//! Adaptive TTL caching for federated search resources.
//!
//! No resource declares how long its results stay valid. The cache learns it,
//! per resource, from the only evidence it has: whether re-querying a cached
//! result returns the same answer.
//!
//! - [`RunningAvgTtlCache`]: the entry point used by the serving layer
//! - [`CachedEntry`] / [`TtlEstimator`]: per-result evidence and the per-resource running average
//! - [`CacheStore`]: lazily created per-resource containers
//! - [`StatisticsExporter`]: tab-separated dump of everything learned
//!
//! ## Example
//!
//! ```rust,ignore
//! use searsia_cache::RunningAvgTtlCache;
//!
//! let cache = RunningAvgTtlCache::new();
//! let result = cache.get_search_result(resource, "federated search").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod config;
mod entry;
mod estimator;
mod refresh;
mod stats;
mod store;

pub use cache::RunningAvgTtlCache;
pub use config::{
    CacheConfig, ENV_INITIAL_TTL_MS, ENV_MAX_BACKGROUND_REFRESHES, ENV_STATISTICS_DIR,
};
pub use entry::{CachedEntry, EntrySnapshot, INFINITE_AGE_MS};
pub use estimator::TtlEstimator;
pub use stats::{
    render_table, validate_resource_id, ExportReport, StatisticsExporter, STATISTICS_EXTENSION,
    STATISTICS_HEADER,
};
pub use store::{CacheStore, ResourceSlot};

// Re-export the collaborator traits from core
pub use searsia_core::traits::{Resource, ResourceCache};
