//! Working set of localities for the regions currently in play.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::error::{ConsolidationError, Result};
use crate::locality::{CachedLocality, LocalityRecord, PhoneticEncoder};
use crate::types::{LocalityId, RegionId};

/// Supplies the raw locality records of one region.
pub trait LocalitySource {
    /// Records whose geography is exactly `region`.
    fn region_localities(&self, region: RegionId) -> Result<Vec<LocalityRecord>>;
}

impl<T: LocalitySource + ?Sized> LocalitySource for Arc<T> {
    fn region_localities(&self, region: RegionId) -> Result<Vec<LocalityRecord>> {
        (**self).region_localities(region)
    }
}

/// Holds the localities of cached regions until each is evicted.
pub trait LocalityCache {
    /// Loads the localities of `region`, returning how many were added.
    ///
    /// Loading a region twice in one run adds nothing the second time.
    fn cache_region_localities(&mut self, region: RegionId) -> Result<usize>;

    /// Looks up a cached locality.
    fn get_locality(&self, id: LocalityId) -> Option<&CachedLocality>;

    /// Cached localities of `region` in ascending id order.
    fn iterate_region<'a>(
        &'a self,
        region: RegionId,
    ) -> Box<dyn Iterator<Item = &'a CachedLocality> + 'a>;

    /// Evicts one locality, returning it if it was cached.
    fn uncache_locality(&mut self, id: LocalityId) -> Option<CachedLocality>;

    /// Number of localities currently cached.
    fn len(&self) -> usize;

    /// Returns true when nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`LocalityCache`] deriving terms in-process from any [`LocalitySource`].
pub struct MemoryLocalityCache<S> {
    source: S,
    encoder: PhoneticEncoder,
    localities: FxHashMap<LocalityId, CachedLocality>,
    by_region: FxHashMap<RegionId, BTreeSet<LocalityId>>,
    loaded: FxHashSet<RegionId>,
}

impl<S: LocalitySource> MemoryLocalityCache<S> {
    /// Creates a cache reading from `source`, memoizing up to
    /// `memo_capacity` word codes.
    pub fn new(source: S, memo_capacity: usize) -> Self {
        Self {
            source,
            encoder: PhoneticEncoder::new(memo_capacity),
            localities: FxHashMap::default(),
            by_region: FxHashMap::default(),
            loaded: FxHashSet::default(),
        }
    }

    /// Returns true when `region` has been loaded during this run.
    pub fn is_loaded(&self, region: RegionId) -> bool {
        self.loaded.contains(&region)
    }

    /// Memo `(hits, misses)` of the phonetic encoder.
    pub fn encoder_stats(&self) -> (u64, u64) {
        self.encoder.stats()
    }
}

impl<S: LocalitySource> LocalityCache for MemoryLocalityCache<S> {
    fn cache_region_localities(&mut self, region: RegionId) -> Result<usize> {
        if !self.loaded.insert(region) {
            trace!(%region, "cache.region.already_loaded");
            return Ok(0);
        }
        let records = self.source.region_localities(region)?;
        if let Some(stray) = records.iter().find(|record| record.region_id != region) {
            return Err(ConsolidationError::collaborator(format!(
                "locality {} delivered for region {region} belongs to region {}",
                stray.locality_id, stray.region_id
            )));
        }
        let ids = self.by_region.entry(region).or_default();
        let mut added = 0;
        for record in records {
            let locality = CachedLocality::from_record(record, &mut self.encoder);
            ids.insert(locality.locality_id);
            if self.localities.insert(locality.locality_id, locality).is_none() {
                added += 1;
            }
        }
        debug!(%region, localities = added, "cache.region.loaded");
        Ok(added)
    }

    fn get_locality(&self, id: LocalityId) -> Option<&CachedLocality> {
        self.localities.get(&id)
    }

    fn iterate_region<'a>(
        &'a self,
        region: RegionId,
    ) -> Box<dyn Iterator<Item = &'a CachedLocality> + 'a> {
        match self.by_region.get(&region) {
            Some(ids) => Box::new(ids.iter().filter_map(|id| self.localities.get(id))),
            None => Box::new(std::iter::empty()),
        }
    }

    fn uncache_locality(&mut self, id: LocalityId) -> Option<CachedLocality> {
        let locality = self.localities.remove(&id)?;
        if let Some(ids) = self.by_region.get_mut(&locality.region_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_region.remove(&locality.region_id);
            }
        }
        Some(locality)
    }

    fn len(&self) -> usize {
        self.localities.len()
    }
}
