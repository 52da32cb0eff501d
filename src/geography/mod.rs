//! Region model and the read-only graph the scheduler walks.

mod memory;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::types::RegionId;

pub use memory::{MemoryGeography, MemoryGeographyBuilder};

/// Level of a region in the containment tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionRank {
    /// The root.
    Earth,
    /// A continent.
    Continent,
    /// A country.
    Country,
    /// A state, province or similar first-level subdivision.
    State,
    /// A county or similar second-level subdivision.
    County,
}

impl fmt::Display for RegionRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegionRank::Earth => "earth",
            RegionRank::Continent => "continent",
            RegionRank::Country => "country",
            RegionRank::State => "state",
            RegionRank::County => "county",
        };
        f.write_str(name)
    }
}

/// Optional per-region processing flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionFlags {
    /// Process every descendant together with this region instead of on its own.
    #[serde(default)]
    pub process_subregions: bool,
}

/// An immutable region as described by the geography.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region identifier.
    pub id: RegionId,
    /// Level in the containment tree.
    pub rank: RegionRank,
    /// Display name.
    pub name: String,
    /// Containing region, `None` for the root.
    #[serde(default)]
    pub parent: Option<RegionId>,
    /// Processing flags.
    #[serde(default)]
    pub flags: RegionFlags,
}

impl Region {
    /// Creates a root-less region without flags.
    pub fn new(id: impl Into<RegionId>, rank: RegionRank, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rank,
            name: name.into(),
            parent: None,
            flags: RegionFlags::default(),
        }
    }

    /// Sets the containing region.
    pub fn with_parent(mut self, parent: impl Into<RegionId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Marks the region so its descendants are processed with it.
    pub fn with_process_subregions(mut self) -> Self {
        self.flags.process_subregions = true;
        self
    }
}

/// Read access to precomputed geography.
///
/// Every method is a pure read. Unknown ids are reported as
/// [`crate::ConsolidationError::UnknownRegion`].
pub trait RegionGraph {
    /// Looks up a region.
    fn region(&self, id: RegionId) -> Result<Region>;

    /// Regions sharing a border with `id`.
    fn adjacent(&self, id: RegionId) -> Result<Vec<RegionId>>;

    /// Regions directly containing `id`.
    fn containing(&self, id: RegionId) -> Result<Vec<RegionId>>;

    /// Regions directly contained by `id`.
    fn contained(&self, id: RegionId) -> Result<Vec<RegionId>>;

    /// Number of localities whose geography is exactly `id`.
    fn locality_count(&self, id: RegionId) -> Result<usize>;
}

impl<T: RegionGraph + ?Sized> RegionGraph for Arc<T> {
    fn region(&self, id: RegionId) -> Result<Region> {
        (**self).region(id)
    }

    fn adjacent(&self, id: RegionId) -> Result<Vec<RegionId>> {
        (**self).adjacent(id)
    }

    fn containing(&self, id: RegionId) -> Result<Vec<RegionId>> {
        (**self).containing(id)
    }

    fn contained(&self, id: RegionId) -> Result<Vec<RegionId>> {
        (**self).contained(id)
    }

    fn locality_count(&self, id: RegionId) -> Result<usize> {
        (**self).locality_count(id)
    }
}

/// All regions below `id`, parents before children.
pub fn descendants(graph: &dyn RegionGraph, id: RegionId) -> Result<Vec<RegionId>> {
    let mut found = Vec::new();
    let mut seen = BTreeSet::new();
    let mut stack: Vec<RegionId> = graph.contained(id)?.into_iter().rev().collect();
    while let Some(next) = stack.pop() {
        if next == id || !seen.insert(next) {
            continue;
        }
        found.push(next);
        stack.extend(graph.contained(next)?.into_iter().rev());
    }
    Ok(found)
}

/// The set of regions a run deduplicates.
///
/// Built with [`RegionDomain::expand`], the set is closed under containment:
/// every child of a member is a member, except below regions flagged
/// `process_subregions`, whose descendants are absorbed into them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionDomain {
    regions: BTreeSet<RegionId>,
}

impl RegionDomain {
    /// Expands user-selected regions to the full in-domain set.
    pub fn expand<I>(graph: &dyn RegionGraph, selected: I) -> Result<Self>
    where
        I: IntoIterator<Item = RegionId>,
    {
        let mut regions = BTreeSet::new();
        let mut absorbing = Vec::new();
        let mut stack: Vec<RegionId> = selected.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !regions.insert(id) {
                continue;
            }
            let region = graph.region(id)?;
            if region.flags.process_subregions {
                absorbing.push(id);
            } else {
                stack.extend(graph.contained(id)?);
            }
        }
        for parent in absorbing {
            if !regions.contains(&parent) {
                continue;
            }
            for child in descendants(graph, parent)? {
                regions.remove(&child);
            }
        }
        debug!(regions = regions.len(), "domain.expanded");
        Ok(Self { regions })
    }

    /// Uses `regions` as-is. The driver panics later if the set is not closed
    /// under containment.
    pub fn from_regions<I>(regions: I) -> Self
    where
        I: IntoIterator<Item = RegionId>,
    {
        Self {
            regions: regions.into_iter().collect(),
        }
    }

    /// Returns true when `id` is in-domain.
    pub fn contains(&self, id: RegionId) -> bool {
        self.regions.contains(&id)
    }

    /// Members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.iter().copied()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true when nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geography() -> MemoryGeography {
        MemoryGeography::builder()
            .region(Region::new(1, RegionRank::Country, "Country"))
            .region(Region::new(10, RegionRank::State, "North").with_parent(1))
            .region(
                Region::new(20, RegionRank::State, "South")
                    .with_parent(1)
                    .with_process_subregions(),
            )
            .region(Region::new(11, RegionRank::County, "N1").with_parent(10))
            .region(Region::new(12, RegionRank::County, "N2").with_parent(10))
            .region(Region::new(21, RegionRank::County, "S1").with_parent(20))
            .build()
            .unwrap()
    }

    #[test]
    fn expand_includes_descendants() {
        let geo = geography();
        let domain = RegionDomain::expand(&geo, [RegionId(10)]).unwrap();
        assert_eq!(
            domain.iter().collect::<Vec<_>>(),
            vec![RegionId(10), RegionId(11), RegionId(12)]
        );
    }

    #[test]
    fn expand_stops_at_absorbing_regions() {
        let geo = geography();
        let domain = RegionDomain::expand(&geo, [RegionId(1)]).unwrap();
        assert!(domain.contains(RegionId(20)));
        assert!(!domain.contains(RegionId(21)));
        assert_eq!(domain.len(), 5);

        let explicit = RegionDomain::expand(&geo, [RegionId(20), RegionId(21)]).unwrap();
        assert_eq!(explicit.iter().collect::<Vec<_>>(), vec![RegionId(20)]);
    }

    #[test]
    fn descendants_are_parent_first() {
        let geo = geography();
        assert_eq!(
            descendants(&geo, RegionId(1)).unwrap(),
            vec![
                RegionId(10),
                RegionId(11),
                RegionId(12),
                RegionId(20),
                RegionId(21)
            ]
        );
    }

    #[test]
    fn unknown_region_is_an_error() {
        let geo = geography();
        assert!(RegionDomain::expand(&geo, [RegionId(99)]).is_err());
    }
}
