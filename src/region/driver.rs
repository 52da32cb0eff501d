//! Greedy cache/evict scheduler over the region graph.
//!
//! Regions move `Pending -> Cached -> Complete`. A cached region becomes
//! current once it has the lowest count of localities still pending around
//! it; before it is handed to the caller every pending neighbor is cached so
//! that its localities can be compared across the border. After the caller
//! processes the region it is marked complete and the next current region is
//! chosen. Keeping the current region the one with the least pending around
//! it keeps the set of simultaneously cached localities small.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info, trace};

use crate::error::Result;
use crate::options::ConsolidationOptions;
use crate::types::RegionId;

use super::context::ConsolidationContext;
use super::tracked::RegionStatus;

/// One unit of driver output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverStep {
    /// Cooperative yield point; nothing to do.
    Tick,
    /// The region is ready: compare and evict its localities, then ask for
    /// the next step.
    Region(RegionId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Seeding,
    Starting,
    Current,
    CachingNeighbors,
    Ready,
    Completing,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reach {
    All,
    InDomainOnly,
    Skip,
}

/// Which relations of a region count as its neighborhood.
#[derive(Clone, Copy, Debug)]
struct NeighborPolicy {
    adjacent: Reach,
    contained: Reach,
    containing: Reach,
}

enum Advance {
    Continue,
    Yield(RegionId),
    Done,
}

#[derive(Debug)]
struct Ticker {
    interval: usize,
    steps: usize,
}

impl Ticker {
    fn due(&mut self) -> bool {
        if self.interval == 0 || self.steps < self.interval {
            return false;
        }
        self.steps = 0;
        true
    }

    fn count(&mut self) {
        self.steps += 1;
    }
}

/// The scheduler. Drive it with [`AdjoiningRegionDriver::next_step`].
#[derive(Debug)]
pub struct AdjoiningRegionDriver {
    phase: Phase,
    start: Option<RegionId>,
    current: Option<RegionId>,
    neighbor_queue: VecDeque<RegionId>,
    waiting_on: BTreeMap<RegionId, Vec<RegionId>>,
    cached: BTreeSet<RegionId>,
    over_domain: BTreeSet<RegionId>,
    ticker: Ticker,
}

impl AdjoiningRegionDriver {
    /// Creates a driver starting at `start`, or at the lowest in-domain id.
    pub fn new(start: Option<RegionId>, yield_interval: usize) -> Self {
        Self {
            phase: Phase::Seeding,
            start,
            current: None,
            neighbor_queue: VecDeque::new(),
            waiting_on: BTreeMap::new(),
            cached: BTreeSet::new(),
            over_domain: BTreeSet::new(),
            ticker: Ticker {
                interval: yield_interval,
                steps: 0,
            },
        }
    }

    /// Creates a driver from run options.
    pub fn from_options(options: &ConsolidationOptions) -> Self {
        Self::new(options.start_region, options.yield_interval)
    }

    /// Returns true once every in-domain region is complete.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// The region currently being prepared or processed.
    pub fn current(&self) -> Option<RegionId> {
        self.current
    }

    /// Regions cached and not yet complete, ascending.
    pub fn cached_regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.cached.iter().copied()
    }

    /// Non-domain regions directly containing an in-domain region.
    pub fn over_domain(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.over_domain.iter().copied()
    }

    /// Runs internal steps until a region is ready, a tick is due, or the
    /// traversal ends (`None`).
    ///
    /// The region returned by the previous call is marked complete at the
    /// start of this call, so its localities must have been processed by then.
    ///
    /// # Panics
    ///
    /// Panics when the bookkeeping is inconsistent: an in-domain region
    /// containing a non-domain region, a pending count that does not return
    /// to zero, or an in-domain region left incomplete at the end.
    pub fn next_step(&mut self, ctx: &mut ConsolidationContext) -> Result<Option<DriverStep>> {
        loop {
            if self.phase == Phase::Finished {
                return Ok(None);
            }
            if self.ticker.due() {
                return Ok(Some(DriverStep::Tick));
            }
            let advance = self.advance(ctx)?;
            self.ticker.count();
            match advance {
                Advance::Continue => {}
                Advance::Yield(region) => return Ok(Some(DriverStep::Region(region))),
                Advance::Done => return Ok(None),
            }
        }
    }

    /// Iterates over the remaining steps, borrowing the context throughout.
    pub fn run<'a>(&'a mut self, ctx: &'a mut ConsolidationContext) -> DriverRun<'a> {
        DriverRun { driver: self, ctx }
    }

    fn advance(&mut self, ctx: &mut ConsolidationContext) -> Result<Advance> {
        match self.phase {
            Phase::Seeding => {
                ctx.options().diagnostics.primary_state("seeding");
                ctx.seed_roster()?;
                self.over_domain = over_domain(ctx)?;
                debug!(
                    regions = ctx.domain().len(),
                    over_domain = self.over_domain.len(),
                    "driver.seeded"
                );
                self.phase = Phase::Starting;
            }
            Phase::Starting => {
                let start = match self.start {
                    Some(requested) => {
                        let unit = ctx.scheduling_unit(requested);
                        let in_domain = ctx.domain().contains(unit);
                        ctx.track(unit, in_domain)?;
                        Some(unit)
                    }
                    None => next_seed(ctx),
                };
                let Some(start) = start else {
                    return Ok(self.finish(ctx));
                };
                ctx.options().diagnostics.primary_state("caching");
                info!(region = %start, "driver.start");
                self.cache_region(ctx, start)?;
                self.current = Some(start);
                self.phase = Phase::Current;
            }
            Phase::Current => {
                let region = self.current_region();
                if ctx.roster().expect(region).adjoining_pending_count() > 0 {
                    let neighbors = self.neighbors(ctx, region)?;
                    self.neighbor_queue = neighbors
                        .into_iter()
                        .filter(|&n| ctx.roster().expect(n).status() == RegionStatus::Pending)
                        .collect();
                    trace!(%region, queued = self.neighbor_queue.len(), "driver.neighbors.queued");
                    self.phase = Phase::CachingNeighbors;
                } else {
                    self.phase = Phase::Ready;
                }
            }
            Phase::CachingNeighbors => match self.neighbor_queue.pop_front() {
                Some(neighbor) => {
                    if ctx.roster().expect(neighbor).status() == RegionStatus::Pending {
                        self.cache_region(ctx, neighbor)?;
                    }
                }
                None => {
                    let region = self.current_region();
                    let pending = ctx.roster().expect(region).adjoining_pending_count();
                    assert_eq!(
                        pending, 0,
                        "region {region} still waits on {pending} localities after caching its neighbors"
                    );
                    self.phase = Phase::Ready;
                }
            },
            Phase::Ready => {
                let region = self.current_region();
                let total = ctx.locality_total(region)?;
                self.phase = Phase::Completing;
                if total > 0 {
                    let diagnostics = &ctx.options().diagnostics;
                    diagnostics.primary_state("processing");
                    diagnostics.secondary_state(&format!("region {region}"));
                    debug!(%region, localities = total, "driver.region.ready");
                    return Ok(Advance::Yield(region));
                }
                debug!(%region, "driver.region.empty");
            }
            Phase::Completing => {
                let region = self.current_region();
                self.complete(ctx, region);
                if let Some(next) = self.next_current(ctx) {
                    self.current = Some(next);
                    self.phase = Phase::Current;
                } else if let Some(seed) = next_seed(ctx) {
                    debug!(region = %seed, "driver.reseed");
                    ctx.options().diagnostics.primary_state("caching");
                    self.cache_region(ctx, seed)?;
                    self.current = Some(seed);
                    self.phase = Phase::Current;
                } else {
                    return Ok(self.finish(ctx));
                }
            }
            Phase::Finished => return Ok(Advance::Done),
        }
        Ok(Advance::Continue)
    }

    fn current_region(&self) -> RegionId {
        self.current
            .unwrap_or_else(|| panic!("driver in phase {:?} without a current region", self.phase))
    }

    /// Loads `region` (and anything it absorbs) and settles pending counts.
    fn cache_region(&mut self, ctx: &mut ConsolidationContext, region: RegionId) -> Result<()> {
        let neighbors = self.neighbors(ctx, region)?;
        let mut pending = Vec::new();
        for &neighbor in &neighbors {
            let in_domain = ctx.domain().contains(neighbor);
            if ctx.track(neighbor, in_domain)?.status() == RegionStatus::Pending {
                pending.push((neighbor, ctx.locality_total(neighbor)?));
            }
        }
        let total = ctx.locality_total(region)?;

        let mut loaded = ctx.load_region(region)?;
        let children = ctx.absorbed_children(region).to_vec();
        for &child in &children {
            loaded += ctx.load_region(child)?;
        }

        let roster = ctx.roster_mut();
        roster.expect_mut(region).advance(RegionStatus::Cached);
        for &child in &children {
            roster.expect_mut(child).advance(RegionStatus::Cached);
        }
        self.cached.insert(region);
        for (neighbor, localities) in pending {
            roster.expect_mut(region).add_pending(localities);
            self.waiting_on.entry(neighbor).or_default().push(region);
        }
        if let Some(waiters) = self.waiting_on.remove(&region) {
            for waiter in waiters {
                roster.expect_mut(waiter).discharge_pending(total);
            }
        }

        ctx.options().diagnostics.region_cached(loaded);
        debug!(
            %region,
            localities = loaded,
            pending = ctx.roster().expect(region).adjoining_pending_count(),
            "driver.region.cached"
        );
        Ok(())
    }

    fn complete(&mut self, ctx: &mut ConsolidationContext, region: RegionId) {
        let children = ctx.absorbed_children(region).to_vec();
        ctx.release_region(region);
        for &child in &children {
            ctx.release_region(child);
        }
        let roster = ctx.roster_mut();
        roster.expect_mut(region).advance(RegionStatus::Complete);
        for &child in &children {
            roster.expect_mut(child).advance(RegionStatus::Complete);
        }
        self.cached.remove(&region);
        ctx.summary.regions_completed += 1;
        ctx.options().diagnostics.region_completed();
        debug!(%region, "driver.region.complete");
    }

    /// The cached region with the fewest pending localities around it,
    /// lowest id first on ties.
    fn next_current(&self, ctx: &ConsolidationContext) -> Option<RegionId> {
        self.cached.iter().copied().min_by_key(|&id| {
            (ctx.roster().expect(id).adjoining_pending_count(), id)
        })
    }

    fn finish(&mut self, ctx: &ConsolidationContext) -> Advance {
        self.phase = Phase::Finished;
        self.current = None;
        let incomplete: Vec<RegionId> = ctx
            .roster()
            .iter()
            .filter(|tracked| tracked.in_domain && tracked.status() != RegionStatus::Complete)
            .map(|tracked| tracked.id)
            .collect();
        assert!(
            incomplete.is_empty(),
            "driver finished with in-domain regions incomplete: {incomplete:?}"
        );
        ctx.options().diagnostics.primary_state("finished");
        info!(regions = ctx.roster().len(), "driver.finished");
        Advance::Done
    }

    fn policy(&self, ctx: &ConsolidationContext, region: RegionId) -> NeighborPolicy {
        let tracked = ctx.roster().expect(region);
        if tracked.in_domain {
            NeighborPolicy {
                adjacent: Reach::All,
                contained: if tracked.process_subregions {
                    Reach::Skip
                } else {
                    Reach::All
                },
                containing: Reach::All,
            }
        } else {
            NeighborPolicy {
                adjacent: Reach::InDomainOnly,
                contained: if self.over_domain.contains(&region) {
                    Reach::InDomainOnly
                } else {
                    Reach::Skip
                },
                containing: Reach::Skip,
            }
        }
    }

    /// Neighborhood of `region` under its policy, in discovery order,
    /// with absorbed regions replaced by the region absorbing them.
    fn neighbors(&self, ctx: &ConsolidationContext, region: RegionId) -> Result<Vec<RegionId>> {
        let policy = self.policy(ctx, region);
        let graph = ctx.graph();
        let mut found = Vec::new();
        let mut seen = BTreeSet::new();
        if policy.adjacent != Reach::Skip {
            gather(ctx, region, graph.adjacent(region)?, policy.adjacent, &mut seen, &mut found);
        }
        if policy.contained != Reach::Skip {
            let children = graph.contained(region)?;
            if policy.contained == Reach::All {
                for &child in &children {
                    assert!(
                        ctx.domain().contains(child),
                        "in-domain region {region} contains non-domain region {child}"
                    );
                }
            }
            gather(ctx, region, children, policy.contained, &mut seen, &mut found);
        }
        if policy.containing != Reach::Skip {
            gather(ctx, region, graph.containing(region)?, policy.containing, &mut seen, &mut found);
        }
        // Absorbed descendants are compared with `region`, so their borders
        // are its borders. Relations back into the subtree map to `region`
        // and are dropped by `gather`.
        for &child in ctx.absorbed_children(region) {
            if policy.adjacent != Reach::Skip {
                gather(ctx, region, graph.adjacent(child)?, policy.adjacent, &mut seen, &mut found);
            }
            if policy.containing != Reach::Skip {
                gather(ctx, region, graph.containing(child)?, policy.containing, &mut seen, &mut found);
            }
        }
        Ok(found)
    }
}

fn gather(
    ctx: &ConsolidationContext,
    region: RegionId,
    candidates: Vec<RegionId>,
    reach: Reach,
    seen: &mut BTreeSet<RegionId>,
    found: &mut Vec<RegionId>,
) {
    for candidate in candidates {
        let unit = ctx.scheduling_unit(candidate);
        if unit == region {
            continue;
        }
        if reach == Reach::InDomainOnly && !ctx.domain().contains(unit) {
            continue;
        }
        if seen.insert(unit) {
            found.push(unit);
        }
    }
}

fn over_domain(ctx: &ConsolidationContext) -> Result<BTreeSet<RegionId>> {
    let mut parents = BTreeSet::new();
    for region in ctx.domain().iter() {
        for parent in ctx.graph().containing(region)? {
            if !ctx.domain().contains(parent) {
                parents.insert(parent);
            }
        }
    }
    Ok(parents)
}

/// First pending in-domain region that schedules itself.
fn next_seed(ctx: &ConsolidationContext) -> Option<RegionId> {
    ctx.roster()
        .iter()
        .find(|tracked| {
            tracked.in_domain
                && tracked.absorbed_by.is_none()
                && tracked.status() == RegionStatus::Pending
        })
        .map(|tracked| tracked.id)
}

/// Iterator over a driver's remaining steps.
pub struct DriverRun<'a> {
    driver: &'a mut AdjoiningRegionDriver,
    ctx: &'a mut ConsolidationContext,
}

impl Iterator for DriverRun<'_> {
    type Item = Result<DriverStep>;

    fn next(&mut self) -> Option<Self::Item> {
        self.driver.next_step(self.ctx).transpose()
    }
}
