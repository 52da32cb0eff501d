use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::locality::{derive_terms, sorted_phonetic_series, PhoneticEncoder};

use super::backend::{IndexBackend, MemoryBackend};

/// A word series declared equivalent to another, with its phonetic series.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredSynonym {
    /// Normalized words, space-joined, as the curator entered them.
    pub word_series: String,
    /// Sorted phonetic series of `word_series`.
    pub phonetic_series: String,
}

impl StoredSynonym {
    /// Pairs an already-normalized word series with its phonetic series.
    pub fn new(word_series: impl Into<String>, phonetic_series: impl Into<String>) -> Self {
        Self {
            word_series: word_series.into(),
            phonetic_series: phonetic_series.into(),
        }
    }

    /// Normalizes free text into a synonym; `None` when no word qualifies.
    pub fn from_text(text: &str, encoder: &mut PhoneticEncoder) -> Option<Self> {
        let (words, codes) = derive_terms(text, encoder)?;
        Some(Self::new(words.join(" "), sorted_phonetic_series(&codes)))
    }
}

/// Synonym graph over phonetic series.
///
/// Each phonetic series maps to the synonyms reachable from it in one hop;
/// lists are de-duplicated by word series since distinct spellings may share
/// a phonetic series. Reachability is transitive; removal is not.
pub struct PotentialSynonymsStore<B = MemoryBackend<Vec<StoredSynonym>>> {
    backend: B,
}

impl Default for PotentialSynonymsStore {
    fn default() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B> PotentialSynonymsStore<B>
where
    B: IndexBackend<Vec<StoredSynonym>>,
{
    /// Wraps `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Records `a` and `b` as synonyms of each other.
    pub fn add_synonym(&mut self, a: &StoredSynonym, b: &StoredSynonym) -> Result<()> {
        let forward = self.link(a, b)?;
        let backward = self.link(b, a)?;
        debug!(
            a = %a.word_series,
            b = %b.word_series,
            new = forward || backward,
            "synonyms.add"
        );
        Ok(())
    }

    /// Removes only the direct edge between `a` and `b`.
    pub fn remove_synonym(&mut self, a: &StoredSynonym, b: &StoredSynonym) -> Result<()> {
        self.unlink(a, b)?;
        self.unlink(b, a)?;
        debug!(a = %a.word_series, b = %b.word_series, "synonyms.remove");
        Ok(())
    }

    /// Synonyms one hop away from `phonetic_series`.
    pub fn get_synonyms(&self, phonetic_series: &str) -> Result<Vec<StoredSynonym>> {
        Ok(self.backend.get_entry(phonetic_series)?.unwrap_or_default())
    }

    /// Returns true when `phonetic_series` has at least one direct synonym.
    pub fn has_synonyms(&self, phonetic_series: &str) -> Result<bool> {
        Ok(self.backend.get_entry(phonetic_series)?.is_some())
    }

    /// Every phonetic series reachable from `phonetic_series` in one or more
    /// hops, excluding itself, in discovery order.
    pub fn get_synonymous_series(&self, phonetic_series: &str) -> Result<Vec<String>> {
        let mut visited: FxHashSet<String> = FxHashSet::default();
        visited.insert(phonetic_series.to_string());
        let mut stack = vec![phonetic_series.to_string()];
        let mut found = Vec::new();
        while let Some(current) = stack.pop() {
            for synonym in self.get_synonyms(&current)? {
                if visited.insert(synonym.phonetic_series.clone()) {
                    found.push(synonym.phonetic_series.clone());
                    stack.push(synonym.phonetic_series);
                }
            }
        }
        Ok(found)
    }

    fn link(&mut self, from: &StoredSynonym, to: &StoredSynonym) -> Result<bool> {
        let mut list = self.get_synonyms(&from.phonetic_series)?;
        if list.iter().any(|s| s.word_series == to.word_series) {
            return Ok(false);
        }
        list.push(to.clone());
        self.backend.set_entry(&from.phonetic_series, Some(list))?;
        Ok(true)
    }

    fn unlink(&mut self, from: &StoredSynonym, to: &StoredSynonym) -> Result<()> {
        let Some(mut list) = self.backend.get_entry(&from.phonetic_series)? else {
            return Ok(());
        };
        let before = list.len();
        list.retain(|s| s.word_series != to.word_series);
        if list.len() == before {
            return Ok(());
        }
        let entry = if list.is_empty() { None } else { Some(list) };
        self.backend.set_entry(&from.phonetic_series, entry)
    }
}
