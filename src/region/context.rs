use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::cache::LocalityCache;
use crate::consolidate::ConsolidationSummary;
use crate::error::Result;
use crate::geography::{descendants, RegionDomain, RegionGraph};
use crate::index::{
    ExcludedMatchEntry, ExcludedMatchesStore, IndexBackend, MemoryBackend, PhoneticCodeIndex,
    PotentialSynonymsStore, StoredSynonym,
};
use crate::locality::CachedLocality;
use crate::options::ConsolidationOptions;
use crate::types::{LocalityId, RegionId};

use super::tracked::{RegionRoster, TrackedRegion};

/// Backend type behind the context's synonym store.
pub type SynonymBackend = Box<dyn IndexBackend<Vec<StoredSynonym>>>;

/// Backend type behind the context's exclusion store.
pub type ExclusionBackend = Box<dyn IndexBackend<ExcludedMatchEntry>>;

/// Everything one consolidation run reads and mutates.
///
/// The driver and processor borrow the context mutably one step at a time,
/// so the cache, index and roster are never touched by two steps at once.
pub struct ConsolidationContext {
    graph: Box<dyn RegionGraph>,
    cache: Box<dyn LocalityCache>,
    domain: RegionDomain,
    options: ConsolidationOptions,
    roster: RegionRoster,
    index: PhoneticCodeIndex,
    synonyms: PotentialSynonymsStore<SynonymBackend>,
    exclusions: ExcludedMatchesStore<ExclusionBackend>,
    absorbed: BTreeMap<RegionId, Vec<RegionId>>,
    absorbing: BTreeMap<RegionId, RegionId>,
    pub(crate) summary: ConsolidationSummary,
}

impl std::fmt::Debug for ConsolidationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidationContext")
            .field("domain", &self.domain)
            .field("roster", &self.roster.len())
            .field("cached_localities", &self.cache.len())
            .field("indexed_codes", &self.index.len())
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl ConsolidationContext {
    /// Creates a context with empty in-memory synonym and exclusion stores.
    pub fn new(
        graph: Box<dyn RegionGraph>,
        cache: Box<dyn LocalityCache>,
        domain: RegionDomain,
        options: ConsolidationOptions,
    ) -> Self {
        Self {
            graph,
            cache,
            domain,
            options,
            roster: RegionRoster::new(),
            index: PhoneticCodeIndex::new(),
            synonyms: PotentialSynonymsStore::new(Box::new(MemoryBackend::new())),
            exclusions: ExcludedMatchesStore::new(Box::new(MemoryBackend::new())),
            absorbed: BTreeMap::new(),
            absorbing: BTreeMap::new(),
            summary: ConsolidationSummary::default(),
        }
    }

    /// Replaces the synonym store's backend.
    ///
    /// Series already present in the backend are not indexed automatically;
    /// register them with [`ConsolidationContext::index_synonym_series`].
    pub fn with_synonym_backend(mut self, backend: SynonymBackend) -> Self {
        self.synonyms = PotentialSynonymsStore::new(backend);
        self
    }

    /// Replaces the exclusion store's backend.
    pub fn with_exclusion_backend(mut self, backend: ExclusionBackend) -> Self {
        self.exclusions = ExcludedMatchesStore::new(backend);
        self
    }

    /// The region graph.
    pub fn graph(&self) -> &dyn RegionGraph {
        self.graph.as_ref()
    }

    /// The locality cache.
    pub fn cache(&self) -> &dyn LocalityCache {
        self.cache.as_ref()
    }

    /// The in-domain selection.
    pub fn domain(&self) -> &RegionDomain {
        &self.domain
    }

    /// Run options.
    pub fn options(&self) -> &ConsolidationOptions {
        &self.options
    }

    /// Regions touched so far.
    pub fn roster(&self) -> &RegionRoster {
        &self.roster
    }

    pub(crate) fn roster_mut(&mut self) -> &mut RegionRoster {
        &mut self.roster
    }

    /// The phonetic code index over cached localities and synonym series.
    pub fn index(&self) -> &PhoneticCodeIndex {
        &self.index
    }

    /// Synonym decisions.
    pub fn synonyms(&self) -> &PotentialSynonymsStore<SynonymBackend> {
        &self.synonyms
    }

    /// Exclusion decisions.
    pub fn exclusions(&self) -> &ExcludedMatchesStore<ExclusionBackend> {
        &self.exclusions
    }

    /// Exclusion decisions, for recording new ones.
    pub fn exclusions_mut(&mut self) -> &mut ExcludedMatchesStore<ExclusionBackend> {
        &mut self.exclusions
    }

    /// Counters accumulated so far.
    pub fn summary(&self) -> &ConsolidationSummary {
        &self.summary
    }

    /// Records a synonym pair and indexes both phonetic series.
    pub fn add_synonym(&mut self, a: &StoredSynonym, b: &StoredSynonym) -> Result<()> {
        self.synonyms.add_synonym(a, b)?;
        self.index.add_phonetic_series_synonym(&a.phonetic_series);
        self.index.add_phonetic_series_synonym(&b.phonetic_series);
        Ok(())
    }

    /// Removes the direct edge between `a` and `b`, deindexing any series
    /// left without synonyms.
    pub fn remove_synonym(&mut self, a: &StoredSynonym, b: &StoredSynonym) -> Result<()> {
        self.synonyms.remove_synonym(a, b)?;
        for series in [&a.phonetic_series, &b.phonetic_series] {
            if !self.synonyms.has_synonyms(series)? {
                self.index.remove_phonetic_series_synonym(series);
            }
        }
        Ok(())
    }

    /// Indexes a phonetic series already present in the synonym backend.
    pub fn index_synonym_series(&mut self, series: &str) -> bool {
        self.index.add_phonetic_series_synonym(series)
    }

    /// Returns true when `region` is tracked as in-domain.
    pub fn is_in_domain(&self, region: RegionId) -> bool {
        self.roster.get(region).is_some_and(|tracked| tracked.in_domain)
    }

    /// Descendants processed together with `region`.
    pub fn absorbed_children(&self, region: RegionId) -> &[RegionId] {
        self.absorbed.get(&region).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The region that schedules `region`: its absorbing ancestor, or itself.
    pub fn scheduling_unit(&self, region: RegionId) -> RegionId {
        self.absorbing.get(&region).copied().unwrap_or(region)
    }

    /// Tracks `region`, creating its entry with `in_domain` when absent.
    pub fn track(&mut self, region: RegionId, in_domain: bool) -> Result<&mut TrackedRegion> {
        if !self.roster.contains(region) {
            let described = self.graph.region(region)?;
            self.roster.add(TrackedRegion::new(&described, in_domain));
        }
        Ok(self.roster.expect_mut(region))
    }

    /// Adds every in-domain region as `Pending`, together with the
    /// descendants absorbed by flagged regions.
    pub fn seed_roster(&mut self) -> Result<()> {
        let selected: Vec<RegionId> = self.domain.iter().collect();
        for region in selected {
            let process_subregions = self.track(region, true)?.process_subregions;
            if !process_subregions || self.absorbed.contains_key(&region) {
                continue;
            }
            let children = descendants(self.graph.as_ref(), region)?;
            for &child in &children {
                self.track(child, true)?.absorbed_by = Some(region);
                self.absorbing.insert(child, region);
            }
            debug!(%region, absorbed = children.len(), "roster.absorbed");
            self.absorbed.insert(region, children);
        }
        debug!(regions = self.roster.len(), "roster.seeded");
        Ok(())
    }

    /// Localities local to `region` plus those of its absorbed descendants.
    pub fn locality_total(&mut self, region: RegionId) -> Result<usize> {
        if let Some(total) = self.roster.expect(region).locality_total() {
            return Ok(total);
        }
        let mut total = self.graph.locality_count(region)?;
        for &child in self.absorbed_children(region) {
            total += self.graph.locality_count(child)?;
        }
        self.roster.expect_mut(region).record_locality_total(total);
        Ok(total)
    }

    /// Loads and indexes the localities of `region` only.
    pub fn load_region(&mut self, region: RegionId) -> Result<usize> {
        let loaded = self.cache.cache_region_localities(region)?;
        for locality in self.cache.iterate_region(region) {
            self.index.add_locality(locality);
        }
        let resident = self.cache.len();
        if resident > self.summary.peak_cached_localities {
            self.summary.peak_cached_localities = resident;
        }
        Ok(loaded)
    }

    /// Looks up a cached locality.
    pub fn locality(&self, id: LocalityId) -> Option<&CachedLocality> {
        self.cache.get_locality(id)
    }

    /// Deindexes and evicts one locality.
    pub fn evict_locality(&mut self, id: LocalityId) -> Option<CachedLocality> {
        let locality = self.cache.uncache_locality(id)?;
        self.index.remove_locality(&locality);
        self.options.diagnostics.locality_evicted();
        self.summary.localities_evicted += 1;
        Some(locality)
    }

    /// Evicts whatever is still cached for `region`, returning the count.
    pub fn release_region(&mut self, region: RegionId) -> usize {
        let leftovers: Vec<LocalityId> = self
            .cache
            .iterate_region(region)
            .map(|locality| locality.locality_id)
            .collect();
        for &id in &leftovers {
            self.evict_locality(id);
        }
        if !leftovers.is_empty() {
            warn!(%region, localities = leftovers.len(), "context.region.unprocessed_evicted");
        }
        leftovers.len()
    }
}
