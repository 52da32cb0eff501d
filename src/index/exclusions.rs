use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::types::{Coordinates, RegionId};

use super::backend::{IndexBackend, MemoryBackend};

/// Curator decisions that a word series is not a duplicate in some context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludedMatchEntry {
    /// Region pairs across which same-named localities are distinct.
    #[serde(default)]
    pub region_pairs: Vec<(RegionId, RegionId)>,
    /// Coordinate pairs at which same-named localities are distinct.
    #[serde(default)]
    pub coordinate_pairs: Vec<(Coordinates, Coordinates)>,
    /// Other word series that never match this one.
    #[serde(default)]
    pub word_series: Vec<String>,
}

impl ExcludedMatchEntry {
    /// Returns true when the unordered region pair is excluded.
    pub fn excludes_regions(&self, a: RegionId, b: RegionId) -> bool {
        self.region_pairs
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// Returns true when the unordered coordinate pair is excluded.
    pub fn excludes_coordinates(&self, a: Coordinates, b: Coordinates) -> bool {
        self.coordinate_pairs
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// Returns true when `word_series` is declared non-matching.
    pub fn excludes_word_series(&self, word_series: &str) -> bool {
        self.word_series.iter().any(|s| s == word_series)
    }
}

/// Symmetric store of declared non-matches, keyed by word series.
pub struct ExcludedMatchesStore<B = MemoryBackend<ExcludedMatchEntry>> {
    backend: B,
}

impl Default for ExcludedMatchesStore {
    fn default() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B> ExcludedMatchesStore<B>
where
    B: IndexBackend<ExcludedMatchEntry>,
{
    /// Wraps `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Declares that localities named `word_series` in regions `a` and `b` differ.
    pub fn exclude_region_match(&mut self, word_series: &str, a: RegionId, b: RegionId) -> Result<bool> {
        self.update(word_series, |entry| {
            if entry.excludes_regions(a, b) {
                return false;
            }
            entry.region_pairs.push((a, b));
            true
        })
    }

    /// Declares that localities named `word_series` at `a` and `b` differ.
    pub fn exclude_coordinate_match(
        &mut self,
        word_series: &str,
        a: Coordinates,
        b: Coordinates,
    ) -> Result<bool> {
        self.update(word_series, |entry| {
            if entry.excludes_coordinates(a, b) {
                return false;
            }
            entry.coordinate_pairs.push((a, b));
            true
        })
    }

    /// Declares that word series `x` and `y` never match, in both directions.
    pub fn exclude_word_series_match(&mut self, x: &str, y: &str) -> Result<bool> {
        let forward = self.add_word_series(x, y)?;
        let backward = if x == y {
            false
        } else {
            self.add_word_series(y, x)?
        };
        debug!(x, y, "exclusions.word_series");
        Ok(forward || backward)
    }

    /// The exclusions recorded for `word_series`, if any.
    pub fn get_excluded_matches(&self, word_series: &str) -> Result<Option<ExcludedMatchEntry>> {
        self.backend.get_entry(word_series)
    }

    fn add_word_series(&mut self, key: &str, other: &str) -> Result<bool> {
        self.update(key, |entry| {
            if entry.excludes_word_series(other) {
                return false;
            }
            entry.word_series.push(other.to_string());
            true
        })
    }

    fn update<F>(&mut self, key: &str, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut ExcludedMatchEntry) -> bool,
    {
        let mut entry = self.backend.get_entry(key)?.unwrap_or_default();
        if !apply(&mut entry) {
            return Ok(false);
        }
        self.backend.set_entry(key, Some(entry))?;
        Ok(true)
    }
}
