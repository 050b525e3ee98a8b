//! Cached search results and the TTL evidence each one has produced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use searsia_core::types::SearchResult;

/// Age of a slot that holds no entry. Never fresh under any TTL.
pub const INFINITE_AGE_MS: u64 = u64::MAX;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// One served result plus the two TTL bounds learned for it.
///
/// Fields are written at most once per refresh and only while the owning
/// resource's refresh lock is held. Unlocked readers therefore observe either
/// the old or the new value of each field, never a torn one.
///
/// # Bounds
/// - `min_ttl`: largest age at which the result was confirmed still valid (0 = never confirmed)
/// - `max_ttl`: age at which the result was observed to have changed (0 = never observed)
///
/// Once retired (result changed) the entry no longer serves results and is
/// kept only for the resource's statistics.
#[derive(Debug)]
pub struct CachedEntry {
    id: u64,
    result: RwLock<Option<Arc<SearchResult>>>,
    created: Instant,
    /// Unix time (ms) at creation
    created_at_ms: i64,
    min_ttl_ms: AtomicU64,
    max_ttl_ms: AtomicU64,
}

impl CachedEntry {
    /// Creates an unmeasured entry holding `result`.
    pub fn new(result: Arc<SearchResult>) -> Self {
        Self {
            id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
            result: RwLock::new(Some(result)),
            created: Instant::now(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
            min_ttl_ms: AtomicU64::new(0),
            max_ttl_ms: AtomicU64::new(0),
        }
    }

    /// Process-unique identity of this entry.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The cached result, or `None` once the entry is retired.
    pub fn result(&self) -> Option<Arc<SearchResult>> {
        self.result.read().clone()
    }

    /// Unix time (ms) at which this entry was created.
    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    /// Milliseconds since this entry was created.
    pub fn age_ms(&self) -> u64 {
        u64::try_from(self.created.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Confirmed-valid bound (ms).
    pub fn min_ttl_ms(&self) -> u64 {
        self.min_ttl_ms.load(Ordering::SeqCst)
    }

    /// Observed-changed bound (ms).
    pub fn max_ttl_ms(&self) -> u64 {
        self.max_ttl_ms.load(Ordering::SeqCst)
    }

    /// The TTL this entry's evidence suggests.
    ///
    /// Twice the confirmed lifetime while no change has been seen, otherwise
    /// the midpoint of the two bounds (truncated).
    pub fn estimated_ttl_ms(&self) -> u64 {
        estimate_ttl_ms(self.min_ttl_ms(), self.max_ttl_ms())
    }

    /// True once a refresh observed a different result for this entry.
    pub fn is_retired(&self) -> bool {
        self.result.read().is_none()
    }

    /// True when the entry is old enough, relative to its confirmed lifetime,
    /// that re-checking it is likely to teach something.
    pub fn is_refresh_candidate(&self) -> bool {
        is_refresh_candidate_at(self.age_ms(), self.min_ttl_ms())
    }

    /// Records that the result was still valid at `age_ms`.
    pub(crate) fn confirm_unchanged(&self, age_ms: u64) {
        self.min_ttl_ms.store(age_ms, Ordering::SeqCst);
    }

    /// Records that the result had changed by `age_ms` and drops the payload.
    pub(crate) fn retire(&self, age_ms: u64) {
        self.max_ttl_ms.store(age_ms, Ordering::SeqCst);
        self.result.write().take();
    }

    /// Copies the current bounds out of the entry.
    pub fn snapshot(&self) -> EntrySnapshot {
        let min_ttl_ms = self.min_ttl_ms();
        let max_ttl_ms = self.max_ttl_ms();
        EntrySnapshot {
            created_at_ms: self.created_at_ms,
            min_ttl_ms,
            max_ttl_ms,
            estimated_ttl_ms: estimate_ttl_ms(min_ttl_ms, max_ttl_ms),
            retired: self.is_retired(),
        }
    }
}

/// Point-in-time copy of a [`CachedEntry`]'s statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    /// Unix time (ms) at creation
    pub created_at_ms: i64,
    /// Confirmed-valid bound
    pub min_ttl_ms: u64,
    /// Observed-changed bound
    pub max_ttl_ms: u64,
    /// Estimate derived from the two bounds
    pub estimated_ttl_ms: u64,
    /// Whether the entry has been superseded
    pub retired: bool,
}

pub(crate) fn estimate_ttl_ms(min_ttl_ms: u64, max_ttl_ms: u64) -> u64 {
    if max_ttl_ms == 0 {
        min_ttl_ms.saturating_mul(2)
    } else {
        // (min + max) / 2 without overflowing
        min_ttl_ms / 2 + max_ttl_ms / 2 + (min_ttl_ms % 2 + max_ttl_ms % 2) / 2
    }
}

/// `age > min_ttl * 1.1`, evaluated in integers.
pub(crate) fn is_refresh_candidate_at(age_ms: u64, min_ttl_ms: u64) -> bool {
    u128::from(age_ms) * 10 > u128::from(min_ttl_ms) * 11
}

#[cfg(test)]
mod tests {
    use super::*;
    use searsia_core::types::Hit;
    use std::time::Duration;
    use test_case::test_case;

    fn make_entry() -> CachedEntry {
        CachedEntry::new(Arc::new(SearchResult::new(vec![Hit::new("a")])))
    }

    #[test_case(0, 0 => 0 ; "unmeasured")]
    #[test_case(40, 0 => 80 ; "min only doubles")]
    #[test_case(40, 100 => 70 ; "midpoint")]
    #[test_case(3, 4 => 3 ; "midpoint truncates")]
    #[test_case(0, 9 => 4 ; "max only")]
    #[test_case(u64::MAX, u64::MAX => u64::MAX ; "no overflow")]
    fn test_estimate(min: u64, max: u64) -> u64 {
        estimate_ttl_ms(min, max)
    }

    #[test_case(0, 0 => false ; "zero age")]
    #[test_case(1, 0 => true ; "unconfirmed")]
    #[test_case(110, 100 => false ; "at threshold")]
    #[test_case(111, 100 => true ; "past threshold")]
    #[test_case(50, 100 => false ; "younger than confirmed")]
    fn test_refresh_candidate(age: u64, min: u64) -> bool {
        is_refresh_candidate_at(age, min)
    }

    #[test]
    fn test_new_entry_is_unmeasured() {
        let entry = make_entry();
        assert_eq!(entry.min_ttl_ms(), 0);
        assert_eq!(entry.max_ttl_ms(), 0);
        assert_eq!(entry.estimated_ttl_ms(), 0);
        assert!(!entry.is_retired());
        assert!(entry.result().is_some());
        assert!(entry.created_at_ms() > 0);
    }

    #[test]
    fn test_entry_ids_are_unique() {
        assert_ne!(make_entry().id(), make_entry().id());
    }

    #[test]
    fn test_age_grows() {
        let entry = make_entry();
        std::thread::sleep(Duration::from_millis(15));
        assert!(entry.age_ms() >= 15);
        assert!(entry.is_refresh_candidate());
    }

    #[test]
    fn test_confirm_unchanged_keeps_result() {
        let entry = make_entry();
        let before = entry.result().unwrap();
        entry.confirm_unchanged(40);
        assert_eq!(entry.min_ttl_ms(), 40);
        assert_eq!(entry.estimated_ttl_ms(), 80);
        assert!(Arc::ptr_eq(&before, &entry.result().unwrap()));
    }

    #[test]
    fn test_retire_clears_result() {
        let entry = make_entry();
        entry.confirm_unchanged(40);
        entry.retire(100);
        assert!(entry.is_retired());
        assert!(entry.result().is_none());

        let snapshot = entry.snapshot();
        assert_eq!(snapshot.min_ttl_ms, 40);
        assert_eq!(snapshot.max_ttl_ms, 100);
        assert_eq!(snapshot.estimated_ttl_ms, 70);
        assert!(snapshot.retired);
    }
}
