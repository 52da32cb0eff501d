//! Builder-style knobs for a consolidation run.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::diagnostics::{ConsolidationDiagnostics, NoopDiagnostics};
use crate::locality::DEFAULT_MEMO_CAPACITY;
use crate::types::RegionId;

/// Default number of internal driver steps between cooperative ticks.
pub const DEFAULT_YIELD_INTERVAL: usize = 128;

/// Options supplied when starting a consolidation run.
#[derive(Clone)]
pub struct ConsolidationOptions {
    /// Internal driver steps between ticks; `0` disables ticks.
    pub yield_interval: usize,
    /// Only pairs where an in-domain side changed on or after this instant are compared.
    pub baseline: Option<OffsetDateTime>,
    /// Region the traversal starts from; the first in-domain region otherwise.
    pub start_region: Option<RegionId>,
    /// Capacity of the word to phonetic code memo.
    pub phonetic_memo_capacity: usize,
    /// Progress observer.
    pub diagnostics: Arc<dyn ConsolidationDiagnostics>,
}

impl ConsolidationOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            yield_interval: DEFAULT_YIELD_INTERVAL,
            baseline: None,
            start_region: None,
            phonetic_memo_capacity: DEFAULT_MEMO_CAPACITY,
            diagnostics: Arc::new(NoopDiagnostics),
        }
    }

    /// Sets the tick interval.
    pub fn yield_interval(mut self, steps: usize) -> Self {
        self.yield_interval = steps;
        self
    }

    /// Restricts comparisons to pairs touched since `baseline`.
    pub fn baseline(mut self, baseline: OffsetDateTime) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Sets the region the traversal starts from.
    pub fn start_region(mut self, region: RegionId) -> Self {
        self.start_region = Some(region);
        self
    }

    /// Sets the phonetic memo capacity.
    pub fn phonetic_memo_capacity(mut self, capacity: usize) -> Self {
        self.phonetic_memo_capacity = capacity;
        self
    }

    /// Sets the progress observer.
    pub fn diagnostics(mut self, diagnostics: Arc<dyn ConsolidationDiagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

impl Default for ConsolidationOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConsolidationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidationOptions")
            .field("yield_interval", &self.yield_interval)
            .field("baseline", &self.baseline)
            .field("start_region", &self.start_region)
            .field("phonetic_memo_capacity", &self.phonetic_memo_capacity)
            .finish_non_exhaustive()
    }
}
