use std::cell::OnceCell;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A contiguous run of a locality's words, keyed by its sorted phonetic series.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhoneticSubset {
    /// Index of the first word in the run.
    pub first_word_index: usize,
    /// Index of the last word in the run (inclusive).
    pub last_word_index: usize,
    /// Sorted, de-duplicated, space-joined phonetic codes of the run.
    pub sorted_phonetic_series: String,
    /// UTF-8 byte offset of the run in the locality name, once marked.
    ///
    /// This is not a character count: for non-ASCII names slice the name
    /// with it (`&name[first..last]`) rather than counting `chars()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_char_index: Option<usize>,
    /// UTF-8 byte offset just past the run in the locality name, once marked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_char_index_plus_one: Option<usize>,
    #[serde(skip)]
    word_series: OnceCell<String>,
}

impl PhoneticSubset {
    /// Creates an unmarked subset.
    pub fn new(first_word_index: usize, last_word_index: usize, sorted_phonetic_series: String) -> Self {
        debug_assert!(first_word_index <= last_word_index);
        Self {
            first_word_index,
            last_word_index,
            sorted_phonetic_series,
            first_char_index: None,
            last_char_index_plus_one: None,
            word_series: OnceCell::new(),
        }
    }

    /// Number of words covered.
    pub fn word_count(&self) -> usize {
        self.last_word_index - self.first_word_index + 1
    }

    /// Returns true when the two subsets share at least one word index.
    pub fn overlaps(&self, other: &PhoneticSubset) -> bool {
        self.first_word_index <= other.last_word_index
            && other.first_word_index <= self.last_word_index
    }

    /// Returns the space-joined words of this subset, rendering them once.
    pub fn word_series<'a>(&'a self, words: &[String]) -> &'a str {
        self.word_series
            .get_or_init(|| words[self.first_word_index..=self.last_word_index].join(" "))
    }

    /// Returns the already-rendered word series, if any.
    pub fn cached_word_series(&self) -> Option<&str> {
        self.word_series.get().map(String::as_str)
    }
}

impl PartialEq for PhoneticSubset {
    fn eq(&self, other: &Self) -> bool {
        self.first_word_index == other.first_word_index
            && self.last_word_index == other.last_word_index
            && self.sorted_phonetic_series == other.sorted_phonetic_series
    }
}

impl Eq for PhoneticSubset {}

/// Builds the match key for a run of phonetic codes.
pub fn sorted_phonetic_series<S: AsRef<str>>(codes: &[S]) -> String {
    let unique: BTreeSet<&str> = codes.iter().map(AsRef::as_ref).collect();
    let mut series = String::new();
    for code in unique {
        if !series.is_empty() {
            series.push(' ');
        }
        series.push_str(code);
    }
    series
}

/// Reduces possibly-overlapping subsets to a maximal non-overlapping cover.
///
/// Longer runs win over the runs they contain. Among runs of equal length the
/// one that comes first in `subsets` wins.
pub fn maximal_cover(mut subsets: Vec<PhoneticSubset>) -> Vec<PhoneticSubset> {
    subsets.sort_by(|a, b| b.word_count().cmp(&a.word_count()));
    let mut accepted: Vec<PhoneticSubset> = Vec::with_capacity(subsets.len());
    for subset in subsets {
        if accepted.iter().all(|kept| !kept.overlaps(&subset)) {
            accepted.push(subset);
        }
    }
    accepted.sort_by_key(|s| s.first_word_index);
    accepted
}

/// Phonetically equivalent subsets shared by a base and a test locality.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhoneticMatch {
    /// Match key of the base subsets.
    pub sorted_phonetic_series: String,
    /// Subsets of the base locality carrying the key.
    pub base_subsets: Vec<PhoneticSubset>,
    /// Subsets of the test locality carrying the key (or a synonym of it).
    pub test_subsets: Vec<PhoneticSubset>,
    /// True when the test subsets matched through a declared synonym.
    #[serde(default)]
    pub synonymous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subset(first: usize, last: usize) -> PhoneticSubset {
        PhoneticSubset::new(first, last, format!("S{first}{last}"))
    }

    #[test]
    fn series_is_sorted_and_collapsed() {
        assert_eq!(sorted_phonetic_series(&["F693", "F", "F"]), "F F693");
        assert_eq!(sorted_phonetic_series(&["Z476"]), "Z476");
        assert_eq!(sorted_phonetic_series::<&str>(&[]), "");
    }

    #[test]
    fn cover_prefers_longest_run() {
        let cover = maximal_cover(vec![subset(0, 0), subset(1, 1), subset(0, 1), subset(2, 2)]);
        let spans: Vec<_> = cover
            .iter()
            .map(|s| (s.first_word_index, s.last_word_index))
            .collect();
        assert_eq!(spans, vec![(0, 1), (2, 2)]);
    }

    #[test]
    fn cover_ties_go_to_first_listed() {
        let cover = maximal_cover(vec![subset(1, 2), subset(0, 1), subset(2, 3)]);
        let spans: Vec<_> = cover
            .iter()
            .map(|s| (s.first_word_index, s.last_word_index))
            .collect();
        assert_eq!(spans, vec![(1, 2)]);
    }

    #[test]
    fn word_series_is_memoized() {
        let words = vec!["foo".to_string(), "bar".to_string(), "baz".to_string()];
        let s = subset(1, 2);
        assert!(s.cached_word_series().is_none());
        assert_eq!(s.word_series(&words), "bar baz");
        assert_eq!(s.cached_word_series(), Some("bar baz"));
    }
}
