//! Per-resource running average of estimated TTLs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::entry::{CachedEntry, EntrySnapshot};

/// Running-average TTL for one resource.
///
/// Every entry ever measured for the resource stays registered here, retired
/// ones included, so memory grows with the number of distinct results the
/// resource has produced over the process lifetime. Nothing is evicted: the
/// average is defined over the full history.
///
/// Updates are serialized by an internal mutex. [`current_ttl_ms`](Self::current_ttl_ms)
/// reads an atomic and never blocks.
#[derive(Debug)]
pub struct TtlEstimator {
    ttl_ms: AtomicU64,
    state: Mutex<EstimatorState>,
}

#[derive(Debug, Default)]
struct EstimatorState {
    sum: u128,
    /// Registration order
    registrations: Vec<Registration>,
    /// Entry id → index into `registrations`
    positions: HashMap<u64, usize>,
}

#[derive(Debug)]
struct Registration {
    entry: Arc<CachedEntry>,
    estimate_ms: u64,
}

impl TtlEstimator {
    /// Creates an estimator that reports `initial_ttl_ms` until the first entry is registered.
    pub fn new(initial_ttl_ms: u64) -> Self {
        Self {
            ttl_ms: AtomicU64::new(initial_ttl_ms),
            state: Mutex::new(EstimatorState::default()),
        }
    }

    /// The last computed running average (ms).
    pub fn current_ttl_ms(&self) -> u64 {
        self.ttl_ms.load(Ordering::Acquire)
    }

    /// Registers `entry`'s current estimate, replacing its previous contribution.
    ///
    /// Re-registering an entry retracts what it contributed before, so the sum
    /// always equals the sum of the latest estimate of every registered entry.
    /// Returns the new running average.
    pub fn notify_change(&self, entry: &Arc<CachedEntry>) -> u64 {
        let estimate_ms = entry.estimated_ttl_ms();
        let mut state = self.state.lock();

        match state.positions.get(&entry.id()).copied() {
            Some(index) => {
                let previous = state.registrations[index].estimate_ms;
                state.sum -= u128::from(previous);
                state.registrations[index].estimate_ms = estimate_ms;
            }
            None => {
                let index = state.registrations.len();
                state.positions.insert(entry.id(), index);
                state.registrations.push(Registration {
                    entry: Arc::clone(entry),
                    estimate_ms,
                });
            }
        }
        state.sum += u128::from(estimate_ms);

        let count = state.registrations.len() as u128;
        let ttl = u64::try_from(state.sum / count).unwrap_or(u64::MAX);
        self.ttl_ms.store(ttl, Ordering::Release);
        ttl
    }

    /// Number of registered entries.
    pub fn count(&self) -> usize {
        self.state.lock().registrations.len()
    }

    /// Returns true if no entry has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Registered entries in registration order.
    ///
    /// `estimated_ttl_ms` is the contribution currently counted in the average.
    pub fn registered(&self) -> Vec<EntrySnapshot> {
        let state = self.state.lock();
        state
            .registrations
            .iter()
            .map(|r| EntrySnapshot {
                estimated_ttl_ms: r.estimate_ms,
                ..r.entry.snapshot()
            })
            .collect()
    }
}
