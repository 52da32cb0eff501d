use std::collections::{BTreeMap, BTreeSet};

use crate::cache::LocalitySource;
use crate::error::{ConsolidationError, Result};
use crate::locality::LocalityRecord;
use crate::types::RegionId;

use super::{Region, RegionGraph};

/// Geography and locality records held entirely in memory.
///
/// Serves as the region graph and the locality source for tests, benches and
/// the JSON dataset loader.
#[derive(Clone, Debug, Default)]
pub struct MemoryGeography {
    regions: BTreeMap<RegionId, Region>,
    children: BTreeMap<RegionId, BTreeSet<RegionId>>,
    adjacency: BTreeMap<RegionId, BTreeSet<RegionId>>,
    localities: BTreeMap<RegionId, Vec<LocalityRecord>>,
}

impl MemoryGeography {
    /// Starts an empty builder.
    pub fn builder() -> MemoryGeographyBuilder {
        MemoryGeographyBuilder::default()
    }

    /// Every region in ascending id order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Total number of locality records.
    pub fn locality_total(&self) -> usize {
        self.localities.values().map(Vec::len).sum()
    }

    fn known(&self, id: RegionId) -> Result<&Region> {
        self.regions
            .get(&id)
            .ok_or(ConsolidationError::UnknownRegion(id))
    }
}

impl RegionGraph for MemoryGeography {
    fn region(&self, id: RegionId) -> Result<Region> {
        self.known(id).cloned()
    }

    fn adjacent(&self, id: RegionId) -> Result<Vec<RegionId>> {
        self.known(id)?;
        Ok(self
            .adjacency
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn containing(&self, id: RegionId) -> Result<Vec<RegionId>> {
        Ok(self.known(id)?.parent.into_iter().collect())
    }

    fn contained(&self, id: RegionId) -> Result<Vec<RegionId>> {
        self.known(id)?;
        Ok(self
            .children
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn locality_count(&self, id: RegionId) -> Result<usize> {
        self.known(id)?;
        Ok(self.localities.get(&id).map_or(0, Vec::len))
    }
}

impl LocalitySource for MemoryGeography {
    fn region_localities(&self, region: RegionId) -> Result<Vec<LocalityRecord>> {
        self.known(region)?;
        Ok(self.localities.get(&region).cloned().unwrap_or_default())
    }
}

/// Accumulates regions, borders and localities, validated by [`build`].
///
/// [`build`]: MemoryGeographyBuilder::build
#[derive(Debug, Default)]
pub struct MemoryGeographyBuilder {
    regions: Vec<Region>,
    borders: Vec<(RegionId, RegionId)>,
    localities: Vec<LocalityRecord>,
}

impl MemoryGeographyBuilder {
    /// Adds a region.
    pub fn region(mut self, region: Region) -> Self {
        self.regions.push(region);
        self
    }

    /// Declares that `a` and `b` share a border. Adjacency is symmetric.
    pub fn adjacent(mut self, a: impl Into<RegionId>, b: impl Into<RegionId>) -> Self {
        self.borders.push((a.into(), b.into()));
        self
    }

    /// Adds a locality record.
    pub fn locality(mut self, record: LocalityRecord) -> Self {
        self.localities.push(record);
        self
    }

    /// Adds many locality records.
    pub fn localities<I>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = LocalityRecord>,
    {
        self.localities.extend(records);
        self
    }

    /// Validates references and builds the geography.
    pub fn build(self) -> Result<MemoryGeography> {
        let mut geography = MemoryGeography::default();
        for region in self.regions {
            let id = region.id;
            if geography.regions.insert(id, region).is_some() {
                return Err(ConsolidationError::InvalidArgument(format!(
                    "region {id} declared twice"
                )));
            }
        }
        for region in geography.regions.values() {
            if let Some(parent) = region.parent {
                if parent == region.id || !geography.regions.contains_key(&parent) {
                    return Err(ConsolidationError::InvalidArgument(format!(
                        "region {} has unknown parent {parent}",
                        region.id
                    )));
                }
                geography
                    .children
                    .entry(parent)
                    .or_default()
                    .insert(region.id);
            }
        }
        for (a, b) in self.borders {
            geography.known(a)?;
            geography.known(b)?;
            if a == b {
                continue;
            }
            geography.adjacency.entry(a).or_default().insert(b);
            geography.adjacency.entry(b).or_default().insert(a);
        }
        for record in self.localities {
            geography.known(record.region_id)?;
            geography
                .localities
                .entry(record.region_id)
                .or_default()
                .push(record);
        }
        for records in geography.localities.values_mut() {
            records.sort_by_key(|record| record.locality_id);
        }
        Ok(geography)
    }
}
