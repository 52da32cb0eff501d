//! Cached localities and the phonetic subset algebra used to compare them.

mod normalize;
mod phonetic;
mod subset;

use std::collections::HashSet;
use std::hash::BuildHasher;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use normalize::{is_stop_word, tokenize, words, NameToken, MIN_WORD_LEN, STOP_WORDS};
pub use phonetic::{
    fuzzy_soundex, phonetic_code, PhoneticEncoder, DEFAULT_MEMO_CAPACITY, LITERAL_CODE_PREFIX,
};
pub use subset::{maximal_cover, sorted_phonetic_series, PhoneticMatch, PhoneticSubset};

use crate::types::{Coordinates, LocalityId, RegionId};

/// A locality as delivered by the locality source, before term derivation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalityRecord {
    /// Locality identifier.
    pub locality_id: LocalityId,
    /// Region whose geography is exactly this locality's geography.
    pub region_id: RegionId,
    /// Latitude in decimal degrees.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Locality name as entered.
    pub name: String,
    /// Free-form remarks.
    #[serde(default)]
    pub remarks: Option<String>,
    /// Last time the record was modified.
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
}

/// A locality held in the cache together with its derived matching terms.
///
/// `words` and `phonetic_codes` are either both `None` (the name has no
/// qualifying words) or both present with equal lengths, index `i` of each
/// describing the same word occurrence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedLocality {
    /// Locality identifier.
    pub locality_id: LocalityId,
    /// Region whose geography is exactly this locality's geography.
    pub region_id: RegionId,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Locality name as entered.
    pub name: String,
    /// Free-form remarks.
    pub remarks: Option<String>,
    /// Last time the record was modified.
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    /// Retained words of the name in occurrence order.
    pub words: Option<Vec<String>>,
    /// One phonetic code per retained word.
    pub phonetic_codes: Option<Vec<String>>,
}

impl CachedLocality {
    /// Derives matching terms for `record`.
    pub fn from_record(record: LocalityRecord, encoder: &mut PhoneticEncoder) -> Self {
        let (words, phonetic_codes) = match derive_terms(&record.name, encoder) {
            Some((words, codes)) => (Some(words), Some(codes)),
            None => (None, None),
        };
        Self {
            locality_id: record.locality_id,
            region_id: record.region_id,
            latitude: record.latitude,
            longitude: record.longitude,
            name: record.name,
            remarks: record.remarks,
            last_modified: record.last_modified,
            words,
            phonetic_codes,
        }
    }

    /// Returns the coordinates when both latitude and longitude are known.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Returns true when the name produced matching terms.
    pub fn is_matchable(&self) -> bool {
        self.phonetic_codes.is_some()
    }

    /// Space-joined words of the whole name.
    pub fn word_series(&self) -> Option<String> {
        self.words.as_ref().map(|words| words.join(" "))
    }

    /// Space-joined words of `subset`, rendered once per subset.
    pub fn subset_word_series<'a>(&self, subset: &'a PhoneticSubset) -> &'a str {
        match self.words.as_deref() {
            Some(words) => subset.word_series(words),
            None => "",
        }
    }

    /// Sorted phonetic series of every contiguous word run of this locality.
    pub fn all_phonetic_series(&self) -> FxHashSet<String> {
        let Some(codes) = self.phonetic_codes.as_deref() else {
            return FxHashSet::default();
        };
        contiguous_spans(codes, |_| true)
            .into_iter()
            .map(|(first, last)| sorted_phonetic_series(&codes[first..=last]))
            .collect()
    }

    /// Finds every contiguous run whose sorted phonetic series is in `search_series`.
    ///
    /// Only codes appearing in at least one searched series can take part in a
    /// run, which prunes the enumeration. A series may be found at several
    /// positions.
    pub fn find_phonetic_subsets<S: BuildHasher>(
        &self,
        search_series: &HashSet<String, S>,
    ) -> Vec<PhoneticSubset> {
        let Some(codes) = self.phonetic_codes.as_deref() else {
            return Vec::new();
        };
        let member_codes: FxHashSet<&str> = search_series
            .iter()
            .flat_map(|series| series.split(' '))
            .collect();
        contiguous_spans(codes, |code| member_codes.contains(code))
            .into_iter()
            .filter_map(|(first, last)| {
                let key = sorted_phonetic_series(&codes[first..=last]);
                search_series
                    .contains(&key)
                    .then(|| PhoneticSubset::new(first, last, key))
            })
            .collect()
    }

    /// Finds the phonetic matches between this (base) locality and `other` (test).
    ///
    /// Each side is reduced to a maximal non-overlapping cover so that the
    /// longest shared phrase is reported instead of its sub-phrases. Matches
    /// are ordered by their first base subset.
    pub fn find_phonetic_matches(&self, other: &CachedLocality) -> Vec<PhoneticMatch> {
        let (Some(base_codes), Some(test_codes)) = (
            self.phonetic_codes.as_deref(),
            other.phonetic_codes.as_deref(),
        ) else {
            return Vec::new();
        };
        let test_code_set: FxHashSet<&str> = test_codes.iter().map(String::as_str).collect();
        let common: FxHashSet<&str> = base_codes
            .iter()
            .map(String::as_str)
            .filter(|code| test_code_set.contains(code))
            .collect();
        if common.is_empty() {
            return Vec::new();
        }

        let base_subsets = subsets_within(base_codes, &common);
        let test_subsets = subsets_within(test_codes, &common);
        let test_keys: FxHashSet<&str> = test_subsets
            .iter()
            .map(|s| s.sorted_phonetic_series.as_str())
            .collect();
        let shared_keys: FxHashSet<String> = base_subsets
            .iter()
            .map(|s| s.sorted_phonetic_series.as_str())
            .filter(|key| test_keys.contains(key))
            .map(str::to_string)
            .collect();

        let base_cover = maximal_cover(
            base_subsets
                .into_iter()
                .filter(|s| shared_keys.contains(&s.sorted_phonetic_series))
                .collect(),
        );
        let test_cover = maximal_cover(
            test_subsets
                .into_iter()
                .filter(|s| shared_keys.contains(&s.sorted_phonetic_series))
                .collect(),
        );

        let mut matches: Vec<PhoneticMatch> = Vec::new();
        for subset in base_cover {
            let key = &subset.sorted_phonetic_series;
            if !test_cover.iter().any(|t| &t.sorted_phonetic_series == key) {
                continue;
            }
            match matches.iter_mut().find(|m| &m.sorted_phonetic_series == key) {
                Some(existing) => existing.base_subsets.push(subset),
                None => matches.push(PhoneticMatch {
                    sorted_phonetic_series: key.clone(),
                    base_subsets: vec![subset],
                    test_subsets: Vec::new(),
                    synonymous: false,
                }),
            }
        }
        for subset in test_cover {
            if let Some(existing) = matches
                .iter_mut()
                .find(|m| m.sorted_phonetic_series == subset.sorted_phonetic_series)
            {
                existing.test_subsets.push(subset);
            }
        }
        matches
    }

    /// Sorts `subsets` by first word and records where each lies in the name.
    ///
    /// Offsets are byte offsets into [`CachedLocality::name`], found by
    /// re-running the tokenizer that produced `words`.
    pub fn sort_and_mark_word_locations(&self, subsets: &mut [PhoneticSubset]) {
        subsets.sort_by_key(|s| s.first_word_index);
        let tokens = tokenize(&self.name);
        for subset in subsets.iter_mut() {
            let (Some(first), Some(last)) = (
                tokens.get(subset.first_word_index),
                tokens.get(subset.last_word_index),
            ) else {
                debug_assert!(false, "subset outside of locality {}", self.locality_id);
                continue;
            };
            subset.first_char_index = Some(first.start);
            subset.last_char_index_plus_one = Some(last.end);
        }
    }
}

/// Derives `(words, phonetic_codes)` for a name, or `None` when no word qualifies.
pub fn derive_terms(name: &str, encoder: &mut PhoneticEncoder) -> Option<(Vec<String>, Vec<String>)> {
    let words = words(name);
    if words.is_empty() {
        return None;
    }
    let codes = words.iter().map(|word| encoder.encode(word)).collect();
    Some((words, codes))
}

/// Sorted phonetic series of a whole word series, or `None` if it has no terms.
pub fn phonetic_series_of(word_series: &str, encoder: &mut PhoneticEncoder) -> Option<String> {
    derive_terms(word_series, encoder).map(|(_, codes)| sorted_phonetic_series(&codes))
}

/// All `(first, last)` spans lying entirely within runs of allowed codes,
/// ordered by first index then last index.
fn contiguous_spans<F>(codes: &[String], allowed: F) -> Vec<(usize, usize)>
where
    F: Fn(&str) -> bool,
{
    let mut spans = Vec::new();
    let mut run_start = None;
    for index in 0..=codes.len() {
        let inside = index < codes.len() && allowed(&codes[index]);
        match (inside, run_start) {
            (true, None) => run_start = Some(index),
            (false, Some(start)) => {
                for first in start..index {
                    for last in first..index {
                        spans.push((first, last));
                    }
                }
                run_start = None;
            }
            _ => {}
        }
    }
    spans
}

fn subsets_within(codes: &[String], common: &FxHashSet<&str>) -> Vec<PhoneticSubset> {
    contiguous_spans(codes, |code| common.contains(code))
        .into_iter()
        .map(|(first, last)| {
            PhoneticSubset::new(first, last, sorted_phonetic_series(&codes[first..=last]))
        })
        .collect()
}

/// A candidate duplicate pair reported to the curator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalityMatch {
    /// Snapshot of the locality being processed.
    pub base: CachedLocality,
    /// Snapshot of the locality it was compared against.
    pub test: CachedLocality,
    /// Subset matches that were not excluded.
    pub phonetic_matches: Vec<PhoneticMatch>,
    /// Subset pairs a curator previously declared non-matching.
    pub excluded_pairs: Vec<ExcludedSubsetPair>,
}

/// A base/test subset pair suppressed by a word-series exclusion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExcludedSubsetPair {
    /// Subset of the base locality.
    pub base_subset: PhoneticSubset,
    /// Subset of the test locality.
    pub test_subset: PhoneticSubset,
}
