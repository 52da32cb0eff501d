use std::collections::BTreeMap;
use std::fmt;

use crate::geography::{Region, RegionRank};
use crate::types::RegionId;

/// Traversal state of one region. Transitions only move forward.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionStatus {
    /// Known, localities not loaded.
    Pending,
    /// Localities loaded and available for comparison.
    Cached,
    /// Processed; localities evicted.
    Complete,
}

impl fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegionStatus::Pending => "pending",
            RegionStatus::Cached => "cached",
            RegionStatus::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Per-region bookkeeping kept for the whole run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedRegion {
    /// Region identifier.
    pub id: RegionId,
    /// Level in the containment tree.
    pub rank: RegionRank,
    /// Whether the run deduplicates this region, or only borrows its localities.
    pub in_domain: bool,
    /// Descendants are processed together with this region.
    pub process_subregions: bool,
    /// The region this one is processed with, when it was absorbed.
    pub absorbed_by: Option<RegionId>,
    status: RegionStatus,
    locality_total: Option<usize>,
    adjoining_pending_count: usize,
}

impl TrackedRegion {
    /// Starts tracking `region` as `Pending`.
    pub fn new(region: &Region, in_domain: bool) -> Self {
        Self {
            id: region.id,
            rank: region.rank,
            in_domain,
            process_subregions: region.flags.process_subregions,
            absorbed_by: None,
            status: RegionStatus::Pending,
            locality_total: None,
            adjoining_pending_count: 0,
        }
    }

    /// Current status.
    pub fn status(&self) -> RegionStatus {
        self.status
    }

    /// Moves to `status`.
    ///
    /// # Panics
    ///
    /// Panics when the transition would move backwards.
    pub fn advance(&mut self, status: RegionStatus) {
        assert!(
            status >= self.status,
            "region {} cannot move from {} to {}",
            self.id,
            self.status,
            status
        );
        self.status = status;
    }

    /// Locality count once computed.
    pub fn locality_total(&self) -> Option<usize> {
        self.locality_total
    }

    /// Stores the lazily computed locality count.
    pub fn record_locality_total(&mut self, total: usize) {
        self.locality_total = Some(total);
    }

    /// Localities in adjoining regions that were pending when this region was
    /// cached and have not been cached since.
    pub fn adjoining_pending_count(&self) -> usize {
        self.adjoining_pending_count
    }

    /// Counts a still-pending neighbor's localities.
    pub fn add_pending(&mut self, localities: usize) {
        self.adjoining_pending_count += localities;
    }

    /// Discharges a neighbor that has just been cached.
    ///
    /// # Panics
    ///
    /// Panics when more is discharged than was counted.
    pub fn discharge_pending(&mut self, localities: usize) {
        self.adjoining_pending_count = self
            .adjoining_pending_count
            .checked_sub(localities)
            .unwrap_or_else(|| {
                panic!(
                    "region {} pending count {} cannot discharge {}",
                    self.id, self.adjoining_pending_count, localities
                )
            });
    }
}

/// Directory of every region the traversal has touched, by id.
///
/// Enumeration is in ascending id order, which is also the order ties are
/// broken in when choosing the next region.
#[derive(Debug, Default)]
pub struct RegionRoster {
    regions: BTreeMap<RegionId, TrackedRegion>,
}

impl RegionRoster {
    /// Creates an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `region`, returning false when the id was already tracked.
    pub fn add(&mut self, region: TrackedRegion) -> bool {
        if self.regions.contains_key(&region.id) {
            return false;
        }
        self.regions.insert(region.id, region);
        true
    }

    /// Looks up a tracked region.
    pub fn get(&self, id: RegionId) -> Option<&TrackedRegion> {
        self.regions.get(&id)
    }

    /// Looks up a tracked region for mutation.
    pub fn get_mut(&mut self, id: RegionId) -> Option<&mut TrackedRegion> {
        self.regions.get_mut(&id)
    }

    /// Looks up a region that must already be tracked.
    ///
    /// # Panics
    ///
    /// Panics when `id` is unknown.
    pub fn expect(&self, id: RegionId) -> &TrackedRegion {
        self.regions
            .get(&id)
            .unwrap_or_else(|| panic!("region {id} is not tracked"))
    }

    /// Mutable counterpart of [`RegionRoster::expect`].
    ///
    /// # Panics
    ///
    /// Panics when `id` is unknown.
    pub fn expect_mut(&mut self, id: RegionId) -> &mut TrackedRegion {
        self.regions
            .get_mut(&id)
            .unwrap_or_else(|| panic!("region {id} is not tracked"))
    }

    /// Returns the tracked region, creating it from `create` when absent.
    pub fn get_or_create<F>(&mut self, id: RegionId, create: F) -> &mut TrackedRegion
    where
        F: FnOnce() -> TrackedRegion,
    {
        self.regions.entry(id).or_insert_with(create)
    }

    /// Returns true when `id` is tracked.
    pub fn contains(&self, id: RegionId) -> bool {
        self.regions.contains_key(&id)
    }

    /// Stops tracking `id`.
    pub fn remove(&mut self, id: RegionId) -> Option<TrackedRegion> {
        self.regions.remove(&id)
    }

    /// Any tracked region; the lowest id.
    pub fn any(&self) -> Option<&TrackedRegion> {
        self.regions.values().next()
    }

    /// Every tracked region in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedRegion> {
        self.regions.values()
    }

    /// Number of tracked regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(id: u32, in_domain: bool) -> TrackedRegion {
        TrackedRegion::new(&Region::new(id, RegionRank::County, "r"), in_domain)
    }

    #[test]
    fn get_or_create_keeps_existing() {
        let mut roster = RegionRoster::new();
        roster.add(tracked(3, true));
        let entry = roster.get_or_create(RegionId(3), || tracked(3, false));
        assert!(entry.in_domain);
        roster.get_or_create(RegionId(1), || tracked(1, false));
        assert_eq!(roster.any().map(|r| r.id), Some(RegionId(1)));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn add_rejects_duplicates() {
        let mut roster = RegionRoster::new();
        assert!(roster.add(tracked(1, true)));
        assert!(!roster.add(tracked(1, false)));
        assert!(roster.expect(RegionId(1)).in_domain);
        assert!(roster.remove(RegionId(1)).is_some());
        assert!(!roster.contains(RegionId(1)));
    }

    #[test]
    fn status_moves_forward() {
        let mut region = tracked(1, true);
        region.advance(RegionStatus::Cached);
        region.advance(RegionStatus::Cached);
        region.advance(RegionStatus::Complete);
        assert_eq!(region.status(), RegionStatus::Complete);
    }

    #[test]
    #[should_panic(expected = "cannot move from complete to cached")]
    fn status_never_moves_back() {
        let mut region = tracked(1, true);
        region.advance(RegionStatus::Complete);
        region.advance(RegionStatus::Cached);
    }

    #[test]
    #[should_panic(expected = "cannot discharge")]
    fn pending_count_cannot_go_negative() {
        let mut region = tracked(1, true);
        region.add_pending(2);
        region.discharge_pending(3);
    }

    #[test]
    #[should_panic(expected = "is not tracked")]
    fn expect_panics_on_unknown() {
        RegionRoster::new().expect(RegionId(5));
    }
}
