use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::locality::CachedLocality;
use crate::types::LocalityId;

#[derive(Debug, Default)]
struct CodeEntry {
    locality_ids: BTreeSet<LocalityId>,
    synonym_series: BTreeSet<String>,
}

impl CodeEntry {
    fn is_empty(&self) -> bool {
        self.locality_ids.is_empty() && self.synonym_series.is_empty()
    }
}

/// Inverted index from phonetic code to the cached localities and synonym
/// series containing it.
///
/// Entries disappear as soon as both of their lists are empty, so the index
/// only ever describes what is currently cached.
#[derive(Debug, Default)]
pub struct PhoneticCodeIndex {
    entries: FxHashMap<String, CodeEntry>,
    indexed_localities: FxHashSet<LocalityId>,
    indexed_series: FxHashSet<String>,
}

impl PhoneticCodeIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `locality` under each of its codes.
    ///
    /// Returns false when the locality has no codes or is already indexed.
    pub fn add_locality(&mut self, locality: &CachedLocality) -> bool {
        let Some(codes) = locality.phonetic_codes.as_deref() else {
            return false;
        };
        if !self.indexed_localities.insert(locality.locality_id) {
            return false;
        }
        for code in codes {
            self.entries
                .entry(code.clone())
                .or_default()
                .locality_ids
                .insert(locality.locality_id);
        }
        trace!(locality = %locality.locality_id, codes = codes.len(), "phonetic_index.add");
        true
    }

    /// Removes `locality` from the index.
    ///
    /// Returns false when the locality has no codes or was not indexed.
    pub fn remove_locality(&mut self, locality: &CachedLocality) -> bool {
        let Some(codes) = locality.phonetic_codes.as_deref() else {
            return false;
        };
        if !self.indexed_localities.remove(&locality.locality_id) {
            return false;
        }
        for code in codes {
            self.detach(code, |entry| {
                entry.locality_ids.remove(&locality.locality_id);
            });
        }
        trace!(locality = %locality.locality_id, "phonetic_index.remove");
        true
    }

    /// Indexes a synonym's sorted phonetic series under each code it contains.
    pub fn add_phonetic_series_synonym(&mut self, series: &str) -> bool {
        if series.is_empty() || !self.indexed_series.insert(series.to_string()) {
            return false;
        }
        for code in series.split(' ') {
            self.entries
                .entry(code.to_string())
                .or_default()
                .synonym_series
                .insert(series.to_string());
        }
        true
    }

    /// Removes a synonym series previously added with
    /// [`PhoneticCodeIndex::add_phonetic_series_synonym`].
    pub fn remove_phonetic_series_synonym(&mut self, series: &str) -> bool {
        if !self.indexed_series.remove(series) {
            return false;
        }
        for code in series.split(' ') {
            self.detach(code, |entry| {
                entry.synonym_series.remove(series);
            });
        }
        true
    }

    /// Localities containing `code`, in ascending id order.
    pub fn locality_ids(&self, code: &str) -> impl Iterator<Item = LocalityId> + '_ {
        self.entries
            .get(code)
            .into_iter()
            .flat_map(|entry| entry.locality_ids.iter().copied())
    }

    /// Synonym series containing `code`, in lexicographic order.
    pub fn synonym_series(&self, code: &str) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .get(code)
            .into_iter()
            .flat_map(|entry| entry.synonym_series.iter().map(String::as_str))
    }

    /// Returns true when `locality_id` is currently indexed.
    pub fn contains_locality(&self, locality_id: LocalityId) -> bool {
        self.indexed_localities.contains(&locality_id)
    }

    /// Returns true when an entry exists for `code`.
    pub fn contains_code(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// Number of indexed localities.
    pub fn locality_count(&self) -> usize {
        self.indexed_localities.len()
    }

    /// Number of distinct codes with a live entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no code has a live entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn detach<F>(&mut self, code: &str, remove: F)
    where
        F: FnOnce(&mut CodeEntry),
    {
        if let Some(entry) = self.entries.get_mut(code) {
            remove(entry);
            if entry.is_empty() {
                self.entries.remove(code);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locality::{LocalityRecord, PhoneticEncoder};
    use crate::types::RegionId;
    use time::macros::datetime;

    fn locality(id: u32, name: &str) -> CachedLocality {
        CachedLocality::from_record(
            LocalityRecord {
                locality_id: LocalityId(id),
                region_id: RegionId(7),
                latitude: None,
                longitude: None,
                name: name.to_string(),
                remarks: None,
                last_modified: datetime!(2021-06-01 0:00 UTC),
            },
            &mut PhoneticEncoder::default(),
        )
    }

    #[test]
    fn add_is_idempotent() {
        let mut index = PhoneticCodeIndex::new();
        let loc = locality(1, "Mill Creek");
        assert!(index.add_locality(&loc));
        assert!(!index.add_locality(&loc));
        assert_eq!(index.locality_count(), 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.locality_ids("M4").collect::<Vec<_>>(), vec![LocalityId(1)]);
    }

    #[test]
    fn localities_without_codes_are_ignored() {
        let mut index = PhoneticCodeIndex::new();
        let loc = locality(1, "at 12");
        assert!(!index.add_locality(&loc));
        assert!(!index.remove_locality(&loc));
        assert!(index.is_empty());
    }

    #[test]
    fn entries_vanish_when_lists_empty() {
        let mut index = PhoneticCodeIndex::new();
        let a = locality(1, "Mill Creek");
        let b = locality(2, "Mill Pond");
        index.add_locality(&a);
        index.add_locality(&b);
        index.add_phonetic_series_synonym("K67 M4");

        assert!(index.remove_locality(&a));
        assert!(!index.remove_locality(&a));
        assert!(index.contains_code("K67"));
        assert!(index.contains_code("M4"));

        assert!(index.remove_phonetic_series_synonym("K67 M4"));
        assert!(!index.contains_code("K67"));
        assert!(index.contains_code("M4"));

        index.remove_locality(&b);
        assert!(index.is_empty());
    }

    #[test]
    fn synonym_series_listed_under_each_code() {
        let mut index = PhoneticCodeIndex::new();
        assert!(index.add_phonetic_series_synonym("B6 K67"));
        assert!(!index.add_phonetic_series_synonym("B6 K67"));
        assert_eq!(index.synonym_series("B6").collect::<Vec<_>>(), vec!["B6 K67"]);
        assert_eq!(index.synonym_series("K67").collect::<Vec<_>>(), vec!["B6 K67"]);
        assert_eq!(index.synonym_series("M4").count(), 0);
    }
}
