//! Locality comparisons for one region handed out by the driver.
//!
//! Each base locality of the region is compared against every cached
//! locality sharing one of its phonetic codes, or a code of a series declared
//! synonymous with one of its subsets. Once a base locality has no candidates
//! left it is deindexed and evicted, which is what lets the driver release
//! memory as it moves on.

use std::collections::{BTreeSet, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};
use time::OffsetDateTime;
use tracing::{trace, warn};

use crate::error::Result;
use crate::geography::descendants;
use crate::index::ExcludedMatchEntry;
use crate::locality::{
    maximal_cover, CachedLocality, ExcludedSubsetPair, LocalityMatch, PhoneticMatch,
};
use crate::types::{LocalityId, RegionId};

use super::context::ConsolidationContext;

/// Regions whose localities a processor may pair with its own.
#[derive(Debug)]
struct Scope {
    regions: BTreeSet<RegionId>,
    adjoining: BTreeSet<RegionId>,
    baseline: Option<OffsetDateTime>,
}

impl Scope {
    fn covers(&self, region: RegionId) -> bool {
        self.regions.contains(&region) || self.adjoining.contains(&region)
    }
}

/// A base series with synonyms, present in the base locality.
#[derive(Debug)]
struct SynonymGroup {
    series: String,
    synonymous: FxHashSet<String>,
}

#[derive(Debug)]
struct BaseComparison {
    base: CachedLocality,
    base_in_domain: bool,
    candidates: VecDeque<LocalityId>,
    synonyms: Vec<SynonymGroup>,
    compared: FxHashSet<LocalityId>,
}

enum Outcome {
    Skipped,
    NoMatch,
    Suppressed,
    Matched(Box<LocalityMatch>),
}

/// Compares the localities of one region (plus anything it absorbs).
#[derive(Debug)]
pub struct RegionProcessor {
    region: RegionId,
    scope: Scope,
    bases: VecDeque<LocalityId>,
    current: Option<BaseComparison>,
}

impl RegionProcessor {
    /// Prepares to process `region`, comparing only pairs where an in-domain
    /// side changed on or after `baseline` when one is given.
    pub fn new(
        ctx: &mut ConsolidationContext,
        region: RegionId,
        baseline: Option<OffsetDateTime>,
    ) -> Result<Self> {
        let in_domain = ctx.domain().contains(region) || ctx.is_in_domain(region);
        let tracked = ctx.track(region, in_domain)?;
        let (in_domain, flagged) = (tracked.in_domain, tracked.process_subregions);

        let mut regions = BTreeSet::from([region]);
        let mut children = ctx.absorbed_children(region).to_vec();
        if flagged && children.is_empty() {
            children = descendants(ctx.graph(), region)?;
        }
        for &child in &children {
            ctx.track(child, in_domain)?;
            regions.insert(child);
        }

        let graph = ctx.graph();
        let mut adjoining = BTreeSet::new();
        for &member in &regions {
            adjoining.extend(graph.adjacent(member)?);
            adjoining.extend(graph.contained(member)?);
            adjoining.extend(graph.containing(member)?);
        }

        let cache = ctx.cache();
        let bases: VecDeque<LocalityId> = regions
            .iter()
            .flat_map(|&member| cache.iterate_region(member))
            .map(|locality| locality.locality_id)
            .collect();
        trace!(%region, bases = bases.len(), adjoining = adjoining.len(), "processor.start");

        Ok(Self {
            region,
            scope: Scope {
                regions,
                adjoining,
                baseline,
            },
            bases,
            current: None,
        })
    }

    /// The region being processed.
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Returns true when every base locality has been compared and evicted.
    pub fn is_finished(&self) -> bool {
        self.current.is_none() && self.bases.is_empty()
    }

    /// Runs comparisons until the next match, or `None` once the region is done.
    pub fn next_match(&mut self, ctx: &mut ConsolidationContext) -> Result<Option<LocalityMatch>> {
        loop {
            if self.current.is_none() {
                let Some(id) = self.bases.pop_front() else {
                    return Ok(None);
                };
                self.current = begin(ctx, id)?;
                continue;
            }
            let candidate = self
                .current
                .as_mut()
                .and_then(|current| current.candidates.pop_front());
            match candidate {
                Some(test_id) => {
                    if let Some(found) = self.compare(ctx, test_id)? {
                        return Ok(Some(found));
                    }
                }
                None => self.finish_base(ctx),
            }
        }
    }

    /// Iterates over the remaining matches, borrowing the context throughout.
    pub fn matches<'a>(&'a mut self, ctx: &'a mut ConsolidationContext) -> ProcessorMatches<'a> {
        ProcessorMatches {
            processor: self,
            ctx,
        }
    }

    fn compare(
        &mut self,
        ctx: &mut ConsolidationContext,
        test_id: LocalityId,
    ) -> Result<Option<LocalityMatch>> {
        let fresh = match self.current.as_mut() {
            Some(current) => current.compared.insert(test_id),
            None => return Ok(None),
        };
        let Some(current) = self.current.as_ref().filter(|_| fresh) else {
            return Ok(None);
        };

        match evaluate(current, &self.scope, ctx, test_id)? {
            Outcome::Skipped => Ok(None),
            Outcome::NoMatch => {
                record_comparison(ctx);
                Ok(None)
            }
            Outcome::Suppressed => {
                record_comparison(ctx);
                ctx.summary.matches_suppressed += 1;
                ctx.options().diagnostics.match_found(true);
                trace!(base = %current.base.locality_id, test = %test_id, "processor.match.suppressed");
                Ok(None)
            }
            Outcome::Matched(found) => {
                record_comparison(ctx);
                ctx.summary.matches_emitted += 1;
                ctx.options().diagnostics.match_found(false);
                trace!(
                    base = %found.base.locality_id,
                    test = %found.test.locality_id,
                    matches = found.phonetic_matches.len(),
                    excluded = found.excluded_pairs.len(),
                    "processor.match"
                );
                Ok(Some(*found))
            }
        }
    }

    fn finish_base(&mut self, ctx: &mut ConsolidationContext) {
        if let Some(done) = self.current.take() {
            ctx.evict_locality(done.base.locality_id);
            trace!(
                locality = %done.base.locality_id,
                compared = done.compared.len(),
                "processor.base.done"
            );
        }
    }
}

fn record_comparison(ctx: &mut ConsolidationContext) {
    ctx.summary.comparisons += 1;
    ctx.options().diagnostics.comparison();
}

/// Gathers candidates for base locality `id`; unmatchable bases are evicted
/// straight away.
fn begin(ctx: &mut ConsolidationContext, id: LocalityId) -> Result<Option<BaseComparison>> {
    let Some(base) = ctx.locality(id).cloned() else {
        warn!(locality = %id, "processor.base.missing");
        return Ok(None);
    };
    let Some(codes) = base.phonetic_codes.as_deref() else {
        ctx.evict_locality(id);
        return Ok(None);
    };
    ctx.options()
        .diagnostics
        .secondary_state(&format!("locality {id}"));

    let index = ctx.index();
    let mut candidates: BTreeSet<LocalityId> = BTreeSet::new();
    let mut synonym_series: BTreeSet<String> = BTreeSet::new();
    for code in codes {
        candidates.extend(index.locality_ids(code));
        synonym_series.extend(index.synonym_series(code).map(str::to_string));
    }

    let mut synonyms = Vec::new();
    for series in synonym_series {
        let probe: FxHashSet<String> = FxHashSet::from_iter([series.clone()]);
        if base.find_phonetic_subsets(&probe).is_empty() {
            continue;
        }
        let reachable = ctx.synonyms().get_synonymous_series(&series)?;
        if reachable.is_empty() {
            continue;
        }
        for other in &reachable {
            for code in other.split(' ') {
                candidates.extend(index.locality_ids(code));
            }
        }
        synonyms.push(SynonymGroup {
            series,
            synonymous: reachable.into_iter().collect(),
        });
    }
    candidates.remove(&id);

    trace!(
        locality = %id,
        candidates = candidates.len(),
        synonyms = synonyms.len(),
        "processor.base.start"
    );
    let base_in_domain = ctx.is_in_domain(base.region_id);
    Ok(Some(BaseComparison {
        base,
        base_in_domain,
        candidates: candidates.into_iter().collect(),
        synonyms,
        compared: FxHashSet::default(),
    }))
}

fn evaluate(
    current: &BaseComparison,
    scope: &Scope,
    ctx: &ConsolidationContext,
    test_id: LocalityId,
) -> Result<Outcome> {
    let Some(test) = ctx.locality(test_id) else {
        warn!(locality = %test_id, "processor.candidate.missing");
        return Ok(Outcome::Skipped);
    };
    let base = &current.base;
    let test_in_domain = ctx.is_in_domain(test.region_id);
    if !current.base_in_domain && !test_in_domain {
        return Ok(Outcome::Skipped);
    }
    if let Some(baseline) = scope.baseline {
        let touched = (current.base_in_domain && base.last_modified >= baseline)
            || (test_in_domain && test.last_modified >= baseline);
        if !touched {
            return Ok(Outcome::Skipped);
        }
    }
    if !scope.covers(test.region_id) {
        return Ok(Outcome::Skipped);
    }

    let mut matches = base.find_phonetic_matches(test);
    for group in &current.synonyms {
        let test_subsets = maximal_cover(test.find_phonetic_subsets(&group.synonymous));
        if test_subsets.is_empty() {
            continue;
        }
        let probe: FxHashSet<String> = FxHashSet::from_iter([group.series.clone()]);
        matches.push(PhoneticMatch {
            sorted_phonetic_series: group.series.clone(),
            base_subsets: maximal_cover(base.find_phonetic_subsets(&probe)),
            test_subsets,
            synonymous: true,
        });
    }
    if matches.is_empty() {
        return Ok(Outcome::NoMatch);
    }

    if base.name == test.name && identical_name_excluded(base, test, ctx)? {
        return Ok(Outcome::Suppressed);
    }
    let mut excluded_pairs = exclude_subset_pairs(base, test, &mut matches, ctx)?;
    if matches.is_empty() {
        return Ok(Outcome::Suppressed);
    }

    for found in &mut matches {
        base.sort_and_mark_word_locations(&mut found.base_subsets);
        test.sort_and_mark_word_locations(&mut found.test_subsets);
    }
    for pair in &mut excluded_pairs {
        base.sort_and_mark_word_locations(std::slice::from_mut(&mut pair.base_subset));
        test.sort_and_mark_word_locations(std::slice::from_mut(&mut pair.test_subset));
    }
    Ok(Outcome::Matched(Box::new(LocalityMatch {
        base: base.clone(),
        test: test.clone(),
        phonetic_matches: matches,
        excluded_pairs,
    })))
}

/// Same-named localities a curator already declared distinct, by coordinates
/// within one region or by region pair across regions.
fn identical_name_excluded(
    base: &CachedLocality,
    test: &CachedLocality,
    ctx: &ConsolidationContext,
) -> Result<bool> {
    let Some(series) = base.word_series() else {
        return Ok(false);
    };
    let Some(entry) = ctx.exclusions().get_excluded_matches(&series)? else {
        return Ok(false);
    };
    if base.region_id == test.region_id {
        return Ok(match (base.coordinates(), test.coordinates()) {
            (Some(a), Some(b)) => entry.excludes_coordinates(a, b),
            _ => false,
        });
    }
    Ok(entry.excludes_regions(base.region_id, test.region_id))
}

/// Moves subset pairs whose word series were declared non-matching out of
/// `matches`. Subsets left without any applicable partner are dropped, then
/// matches left without subsets.
fn exclude_subset_pairs(
    base: &CachedLocality,
    test: &CachedLocality,
    matches: &mut Vec<PhoneticMatch>,
    ctx: &ConsolidationContext,
) -> Result<Vec<ExcludedSubsetPair>> {
    let mut entries: FxHashMap<String, Option<ExcludedMatchEntry>> = FxHashMap::default();
    let mut excluded = Vec::new();
    for found in matches.iter_mut() {
        let mut base_keep = vec![false; found.base_subsets.len()];
        let mut test_keep = vec![false; found.test_subsets.len()];
        for (base_index, base_subset) in found.base_subsets.iter().enumerate() {
            let base_series = base.subset_word_series(base_subset);
            if !entries.contains_key(base_series) {
                let entry = ctx.exclusions().get_excluded_matches(base_series)?;
                entries.insert(base_series.to_string(), entry);
            }
            let entry = entries.get(base_series).and_then(Option::as_ref);
            for (test_index, test_subset) in found.test_subsets.iter().enumerate() {
                let test_series = test.subset_word_series(test_subset);
                if entry.is_some_and(|e| e.excludes_word_series(test_series)) {
                    excluded.push(ExcludedSubsetPair {
                        base_subset: base_subset.clone(),
                        test_subset: test_subset.clone(),
                    });
                } else {
                    base_keep[base_index] = true;
                    test_keep[test_index] = true;
                }
            }
        }
        let mut keep = base_keep.into_iter();
        found.base_subsets.retain(|_| keep.next().unwrap_or(false));
        let mut keep = test_keep.into_iter();
        found.test_subsets.retain(|_| keep.next().unwrap_or(false));
    }
    matches.retain(|found| !found.base_subsets.is_empty() && !found.test_subsets.is_empty());
    Ok(excluded)
}

/// Iterator over a processor's remaining matches.
pub struct ProcessorMatches<'a> {
    processor: &'a mut RegionProcessor,
    ctx: &'a mut ConsolidationContext,
}

impl Iterator for ProcessorMatches<'_> {
    type Item = Result<LocalityMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.processor.next_match(self.ctx).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryLocalityCache;
    use crate::geography::{MemoryGeography, Region, RegionDomain, RegionRank};
    use crate::index::StoredSynonym;
    use crate::locality::{LocalityRecord, PhoneticEncoder};
    use crate::options::ConsolidationOptions;
    use crate::types::Coordinates;
    use std::sync::Arc;
    use time::macros::datetime;

    fn record(id: u32, region: u32, name: &str) -> LocalityRecord {
        LocalityRecord {
            locality_id: LocalityId(id),
            region_id: RegionId(region),
            latitude: Some(30.0 + f64::from(id)),
            longitude: Some(-97.0),
            name: name.to_string(),
            remarks: None,
            last_modified: datetime!(2020-06-01 0:00 UTC),
        }
    }

    /// Counties 1 and 2 are adjacent and in-domain; 3 borders 2 only and is not.
    fn context(records: Vec<LocalityRecord>, selected: &[u32]) -> ConsolidationContext {
        let geo = Arc::new(
            MemoryGeography::builder()
                .region(Region::new(1, RegionRank::County, "one"))
                .region(Region::new(2, RegionRank::County, "two"))
                .region(Region::new(3, RegionRank::County, "three"))
                .adjacent(1, 2)
                .adjacent(2, 3)
                .localities(records)
                .build()
                .unwrap(),
        );
        let domain =
            RegionDomain::expand(geo.as_ref(), selected.iter().map(|&id| RegionId(id))).unwrap();
        let mut ctx = ConsolidationContext::new(
            Box::new(geo.clone()),
            Box::new(MemoryLocalityCache::new(geo, 64)),
            domain,
            ConsolidationOptions::new(),
        );
        ctx.seed_roster().unwrap();
        for region in 1..=3 {
            let in_domain = selected.contains(&region);
            ctx.track(RegionId(region), in_domain).unwrap();
            ctx.load_region(RegionId(region)).unwrap();
        }
        ctx
    }

    fn run(ctx: &mut ConsolidationContext, region: u32) -> Vec<LocalityMatch> {
        let mut processor = RegionProcessor::new(ctx, RegionId(region), None).unwrap();
        let found: Vec<_> = processor.matches(ctx).map(|m| m.unwrap()).collect();
        assert!(processor.is_finished());
        found
    }

    fn pairs(found: &[LocalityMatch]) -> Vec<(u32, u32)> {
        found
            .iter()
            .map(|m| (m.base.locality_id.0, m.test.locality_id.0))
            .collect()
    }

    #[test]
    fn each_pair_reported_once_and_bases_evicted() {
        let mut ctx = context(
            vec![
                record(1, 1, "Mill Creek"),
                record(2, 1, "Mill Creek Crossing"),
                record(3, 2, "Old Mill"),
            ],
            &[1, 2],
        );
        let found = run(&mut ctx, 1);
        assert_eq!(pairs(&found), vec![(1, 2), (1, 3), (2, 3)]);
        assert!(ctx.locality(LocalityId(1)).is_none());
        assert!(ctx.locality(LocalityId(2)).is_none());
        assert!(ctx.index().contains_locality(LocalityId(3)));
        assert_eq!(ctx.summary().matches_emitted, 3);
    }

    #[test]
    fn regions_beyond_the_border_are_skipped() {
        let mut ctx = context(
            vec![record(1, 1, "Mill Creek"), record(2, 3, "Mill Creek")],
            &[1, 2, 3],
        );
        assert!(run(&mut ctx, 1).is_empty());
        assert_eq!(ctx.summary().comparisons, 0);
    }

    #[test]
    fn pairs_outside_domain_are_skipped() {
        let mut ctx = context(
            vec![record(1, 2, "Salt Lick"), record(2, 3, "Salt Lick")],
            &[1],
        );
        assert!(run(&mut ctx, 2).is_empty());
    }

    #[test]
    fn baseline_requires_recent_in_domain_change() {
        let mut recent = record(2, 2, "Mill Creek");
        recent.last_modified = datetime!(2024-01-01 0:00 UTC);
        let mut ctx = context(vec![record(1, 1, "Mill Creek"), recent.clone()], &[1, 2]);
        let mut processor =
            RegionProcessor::new(&mut ctx, RegionId(1), Some(datetime!(2023-01-01 0:00 UTC)))
                .unwrap();
        assert_eq!(processor.matches(&mut ctx).count(), 1);

        let mut ctx = context(vec![record(1, 1, "Mill Creek"), recent], &[1]);
        let mut processor =
            RegionProcessor::new(&mut ctx, RegionId(1), Some(datetime!(2023-01-01 0:00 UTC)))
                .unwrap();
        assert_eq!(processor.matches(&mut ctx).count(), 0);
    }

    #[test]
    fn identical_names_respect_coordinate_exclusions() {
        let mut ctx = context(
            vec![record(1, 1, "Spring Branch"), record(2, 1, "Spring Branch")],
            &[1, 2],
        );
        ctx.exclusions_mut()
            .exclude_coordinate_match(
                "spring branch",
                Coordinates::new(32.0, -97.0),
                Coordinates::new(31.0, -97.0),
            )
            .unwrap();
        assert!(run(&mut ctx, 1).is_empty());
        assert_eq!(ctx.summary().matches_suppressed, 1);
    }

    #[test]
    fn identical_names_respect_region_exclusions() {
        let mut ctx = context(
            vec![record(1, 1, "Spring Branch"), record(2, 2, "Spring Branch")],
            &[1, 2],
        );
        ctx.exclusions_mut()
            .exclude_region_match("spring branch", RegionId(2), RegionId(1))
            .unwrap();
        assert!(run(&mut ctx, 1).is_empty());
    }

    #[test]
    fn excluded_subset_pairs_are_reported_alongside_live_ones() {
        let mut ctx = context(
            vec![record(1, 1, "Mill Creek Park"), record(2, 1, "Mill Creek Park")],
            &[1, 2],
        );
        ctx.exclusions_mut()
            .exclude_word_series_match("mill creek park", "mill creek park")
            .unwrap();
        assert!(run(&mut ctx, 1).is_empty());

        let mut ctx = context(
            vec![record(1, 1, "Mill Creek"), record(2, 1, "Creek Mill")],
            &[1, 2],
        );
        ctx.exclusions_mut()
            .exclude_word_series_match("mill creek", "creek mill")
            .unwrap();
        let found = run(&mut ctx, 1);
        assert!(found.is_empty());
        assert_eq!(ctx.summary().matches_suppressed, 1);
    }

    #[test]
    fn partial_exclusion_keeps_the_pair() {
        let mut ctx = context(
            vec![
                record(1, 1, "Mill Creek Bull Run"),
                record(2, 1, "Bull Run Oak Mill Creek"),
            ],
            &[1, 2],
        );
        ctx.exclusions_mut()
            .exclude_word_series_match("mill creek", "mill creek")
            .unwrap();
        let found = run(&mut ctx, 1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].excluded_pairs.len(), 1);
        assert_eq!(found[0].phonetic_matches.len(), 1);
        let live = &found[0].phonetic_matches[0];
        assert_eq!(live.base_subsets[0].first_word_index, 2);
        assert_eq!(live.test_subsets[0].first_word_index, 0);
    }

    #[test]
    fn synonyms_bring_in_candidates() {
        let mut ctx = context(
            vec![record(1, 1, "Bee Cave"), record(2, 2, "Beecave Hollow")],
            &[1, 2],
        );
        let mut encoder = PhoneticEncoder::default();
        let a = StoredSynonym::from_text("bee cave", &mut encoder).unwrap();
        let b = StoredSynonym::from_text("beecave", &mut encoder).unwrap();
        ctx.add_synonym(&a, &b).unwrap();

        let found = run(&mut ctx, 1);
        assert_eq!(pairs(&found), vec![(1, 2)]);
        let synonym = &found[0].phonetic_matches[0];
        assert!(synonym.synonymous);
        assert_eq!(synonym.sorted_phonetic_series, a.phonetic_series);
        assert_eq!(synonym.base_subsets[0].first_char_index, Some(0));
        assert_eq!(synonym.base_subsets[0].last_char_index_plus_one, Some(8));
        assert_eq!(synonym.test_subsets[0].last_char_index_plus_one, Some(7));
    }

    #[test]
    fn unmatchable_bases_are_still_evicted() {
        let mut ctx = context(vec![record(1, 1, "at 12"), record(2, 1, "Mill")], &[1]);
        assert!(run(&mut ctx, 1).is_empty());
        assert!(ctx.cache().iterate_region(RegionId(1)).next().is_none());
    }
}
