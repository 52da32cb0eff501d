//! Progress notifications for embedders of a consolidation run.

use std::sync::atomic::{AtomicU64, Ordering};

/// Observer notified as a consolidation run progresses.
///
/// The primary state names the traversal phase (`"seeding"`, `"caching"`,
/// `"processing"`, `"finished"`); the secondary state names the region or
/// locality currently worked on. Implementations only observe: nothing they
/// do changes which regions are visited or which matches are produced.
pub trait ConsolidationDiagnostics: Send + Sync {
    /// Reports a change of traversal phase.
    fn primary_state(&self, state: &str);

    /// Reports progress within the current phase.
    fn secondary_state(&self, state: &str);

    /// Records that a region's localities were loaded.
    fn region_cached(&self, localities: usize);

    /// Records that a region reached `Complete`.
    fn region_completed(&self);

    /// Records that a locality was evicted after comparison.
    fn locality_evicted(&self);

    /// Records one locality-to-locality phonetic comparison.
    fn comparison(&self);

    /// Records an emitted match (`suppressed == false`) or one dropped by exclusions.
    fn match_found(&self, suppressed: bool);
}

/// Discards every notification.
#[derive(Default)]
pub struct NoopDiagnostics;

impl ConsolidationDiagnostics for NoopDiagnostics {
    fn primary_state(&self, _state: &str) {}
    fn secondary_state(&self, _state: &str) {}
    fn region_cached(&self, _localities: usize) {}
    fn region_completed(&self) {}
    fn locality_evicted(&self) {}
    fn comparison(&self) {}
    fn match_found(&self, _suppressed: bool) {}
}

/// Thread-safe counters over every notification.
///
/// `cached_localities` tracks the live working set and `peak_cached_localities`
/// its high-water mark, which is how the scheduler's memory bound is observed.
#[derive(Default)]
pub struct CounterDiagnostics {
    /// Number of regions whose localities were loaded.
    pub regions_cached: AtomicU64,
    /// Number of regions marked complete.
    pub regions_completed: AtomicU64,
    /// Number of localities loaded into the cache.
    pub localities_cached: AtomicU64,
    /// Number of localities evicted from the cache.
    pub localities_evicted: AtomicU64,
    /// Localities currently resident.
    pub cached_localities: AtomicU64,
    /// Highest value `cached_localities` reached.
    pub peak_cached_localities: AtomicU64,
    /// Number of phonetic comparisons performed.
    pub comparisons: AtomicU64,
    /// Number of matches emitted.
    pub matches_emitted: AtomicU64,
    /// Number of matches dropped entirely by exclusions.
    pub matches_suppressed: AtomicU64,
    /// Number of phase changes reported.
    pub state_changes: AtomicU64,
}

impl CounterDiagnostics {
    /// Returns the high-water mark of simultaneously cached localities.
    pub fn peak(&self) -> u64 {
        self.peak_cached_localities.load(Ordering::Relaxed)
    }
}

impl ConsolidationDiagnostics for CounterDiagnostics {
    fn primary_state(&self, _state: &str) {
        self.state_changes.fetch_add(1, Ordering::Relaxed);
    }

    fn secondary_state(&self, _state: &str) {}

    fn region_cached(&self, localities: usize) {
        let added = localities as u64;
        self.regions_cached.fetch_add(1, Ordering::Relaxed);
        self.localities_cached.fetch_add(added, Ordering::Relaxed);
        let live = self.cached_localities.fetch_add(added, Ordering::Relaxed) + added;
        self.peak_cached_localities.fetch_max(live, Ordering::Relaxed);
    }

    fn region_completed(&self) {
        self.regions_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn locality_evicted(&self) {
        self.localities_evicted.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .cached_localities
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |live| {
                Some(live.saturating_sub(1))
            });
    }

    fn comparison(&self) {
        self.comparisons.fetch_add(1, Ordering::Relaxed);
    }

    fn match_found(&self, suppressed: bool) {
        if suppressed {
            self.matches_suppressed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.matches_emitted.fetch_add(1, Ordering::Relaxed);
        }
    }
}
