//! Host loop tying the driver and the processor together.
//!
//! [`Consolidation`] pulls one driver step at a time. Each yielded region is
//! handed to a fresh [`RegionProcessor`] whose matches are passed on before
//! the driver is asked for its next step, which is what marks the region
//! complete. Dropping a `Consolidation` between events leaves the context
//! consistent: every event boundary falls between two whole steps.

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::locality::LocalityMatch;
use crate::region::{AdjoiningRegionDriver, ConsolidationContext, DriverStep, RegionProcessor};
use crate::types::RegionId;

/// Counters describing one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationSummary {
    /// Regions handed to the processor.
    pub regions_processed: usize,
    /// Regions marked complete, including empty ones never processed.
    pub regions_completed: usize,
    /// Locality pairs compared.
    pub comparisons: usize,
    /// Matches handed to the caller.
    pub matches_emitted: usize,
    /// Matches dropped entirely by curator exclusions.
    pub matches_suppressed: usize,
    /// Localities evicted from the cache.
    pub localities_evicted: usize,
    /// Most localities resident in the cache at once.
    pub peak_cached_localities: usize,
}

/// One unit of run output.
#[derive(Debug)]
pub enum ConsolidationEvent {
    /// Cooperative yield point.
    Tick,
    /// Processing of a region has begun.
    Region(RegionId),
    /// A candidate duplicate pair.
    Match(Box<LocalityMatch>),
}

/// A consolidation run over one context.
pub struct Consolidation {
    ctx: ConsolidationContext,
    driver: AdjoiningRegionDriver,
    processor: Option<RegionProcessor>,
    started: bool,
    finished: bool,
}

impl Consolidation {
    /// Prepares a run; the start region and tick interval come from the
    /// context's options.
    pub fn new(ctx: ConsolidationContext) -> Self {
        let driver = AdjoiningRegionDriver::from_options(ctx.options());
        Self {
            ctx,
            driver,
            processor: None,
            started: false,
            finished: false,
        }
    }

    /// The context the run mutates.
    pub fn context(&self) -> &ConsolidationContext {
        &self.ctx
    }

    /// Mutable access between events, e.g. to record curator decisions.
    pub fn context_mut(&mut self) -> &mut ConsolidationContext {
        &mut self.ctx
    }

    /// Counters accumulated so far.
    pub fn summary(&self) -> &ConsolidationSummary {
        self.ctx.summary()
    }

    /// Returns true once the traversal has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advances to the next event, or `None` when the run is over.
    pub fn next_event(&mut self) -> Result<Option<ConsolidationEvent>> {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            info!(
                domain = self.ctx.domain().len(),
                baseline = ?self.ctx.options().baseline,
                "consolidation.start"
            );
        }
        loop {
            if let Some(processor) = self.processor.as_mut() {
                if let Some(found) = processor.next_match(&mut self.ctx)? {
                    return Ok(Some(ConsolidationEvent::Match(Box::new(found))));
                }
                self.processor = None;
            }
            match self.driver.next_step(&mut self.ctx)? {
                Some(DriverStep::Tick) => return Ok(Some(ConsolidationEvent::Tick)),
                Some(DriverStep::Region(region)) => {
                    let baseline = self.ctx.options().baseline;
                    self.processor = Some(RegionProcessor::new(&mut self.ctx, region, baseline)?);
                    self.ctx.summary.regions_processed += 1;
                    return Ok(Some(ConsolidationEvent::Region(region)));
                }
                None => {
                    self.finished = true;
                    let summary = self.ctx.summary();
                    info!(
                        regions = summary.regions_processed,
                        comparisons = summary.comparisons,
                        matches = summary.matches_emitted,
                        suppressed = summary.matches_suppressed,
                        peak_cached = summary.peak_cached_localities,
                        "consolidation.finished"
                    );
                    return Ok(None);
                }
            }
        }
    }

    /// Runs to the end, handing every match to `on_match`.
    pub fn run_to_end<F>(&mut self, mut on_match: F) -> Result<ConsolidationSummary>
    where
        F: FnMut(LocalityMatch),
    {
        while let Some(event) = self.next_event()? {
            if let ConsolidationEvent::Match(found) = event {
                on_match(*found);
            }
        }
        Ok(self.ctx.summary().clone())
    }

    /// Gives the context back, e.g. to inspect the roster after a run.
    pub fn into_context(self) -> ConsolidationContext {
        self.ctx
    }
}

impl Iterator for Consolidation {
    type Item = Result<ConsolidationEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
