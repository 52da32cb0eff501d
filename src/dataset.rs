//! JSON datasets describing a geography, its localities and curator
//! decisions, used by the CLI and by fixtures.
//!
//! ```json
//! {
//!   "regions": [
//!     { "id": 10, "rank": "state", "name": "Texas" },
//!     { "id": 1, "rank": "county", "name": "Travis", "parent": 10 }
//!   ],
//!   "adjacency": [[1, 2]],
//!   "localities": [
//!     { "locality_id": 1, "region_id": 1, "name": "Zilker Park",
//!       "last_modified": "2021-04-01T00:00:00Z" }
//!   ],
//!   "synonyms": [["bee cave", "beecave"]],
//!   "exclusions": [
//!     { "kind": "word_series", "base": "mill creek", "test": "creek mill" }
//!   ],
//!   "domain": [10]
//! }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::MemoryLocalityCache;
use crate::error::{ConsolidationError, Result};
use crate::geography::{MemoryGeography, Region, RegionDomain};
use crate::index::StoredSynonym;
use crate::locality::{words, LocalityRecord, PhoneticEncoder};
use crate::options::ConsolidationOptions;
use crate::region::ConsolidationContext;
use crate::types::{Coordinates, RegionId};

/// A curator decision that two things are not the same place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionRecord {
    /// The two word series never match each other.
    WordSeries {
        /// First word series.
        base: String,
        /// Second word series.
        test: String,
    },
    /// Localities named `word_series` in these two regions are distinct.
    Regions {
        /// Full word series of the locality name.
        word_series: String,
        /// The two regions.
        regions: (RegionId, RegionId),
    },
    /// Localities named `word_series` at these two points are distinct.
    Coordinates {
        /// Full word series of the locality name.
        word_series: String,
        /// The two points.
        coordinates: (Coordinates, Coordinates),
    },
}

/// Everything needed to run a consolidation without external storage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Every region, roots included.
    pub regions: Vec<Region>,
    /// Shared borders.
    #[serde(default)]
    pub adjacency: Vec<(RegionId, RegionId)>,
    /// Locality records.
    #[serde(default)]
    pub localities: Vec<LocalityRecord>,
    /// Pairs of names declared to sound alike.
    #[serde(default)]
    pub synonyms: Vec<(String, String)>,
    /// Curator exclusions.
    #[serde(default)]
    pub exclusions: Vec<ExclusionRecord>,
    /// Regions selected for deduplication; every root when empty.
    #[serde(default)]
    pub domain: Vec<RegionId>,
}

impl Dataset {
    /// Reads a dataset from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let dataset = Self::from_json(&text)?;
        debug!(
            path = %path.display(),
            regions = dataset.regions.len(),
            localities = dataset.localities.len(),
            "dataset.loaded"
        );
        Ok(dataset)
    }

    /// Parses a dataset from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Renders the dataset as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the dataset to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Builds and validates the in-memory geography.
    pub fn geography(&self) -> Result<MemoryGeography> {
        let mut builder = MemoryGeography::builder();
        for region in &self.regions {
            builder = builder.region(region.clone());
        }
        for &(a, b) in &self.adjacency {
            builder = builder.adjacent(a, b);
        }
        builder.localities(self.localities.iter().cloned()).build()
    }

    /// Regions selected when `requested` is empty: the dataset's own domain,
    /// or failing that every root region.
    pub fn selection(&self, requested: &[RegionId]) -> Vec<RegionId> {
        if !requested.is_empty() {
            return requested.to_vec();
        }
        if !self.domain.is_empty() {
            return self.domain.clone();
        }
        self.regions
            .iter()
            .filter(|region| region.parent.is_none())
            .map(|region| region.id)
            .collect()
    }

    /// Builds a ready-to-run context, recording the dataset's synonyms and
    /// exclusions in its stores.
    pub fn into_context(
        self,
        options: ConsolidationOptions,
        requested: &[RegionId],
    ) -> Result<ConsolidationContext> {
        let geography = Arc::new(self.geography()?);
        let selection = self.selection(requested);
        if selection.is_empty() {
            return Err(ConsolidationError::InvalidArgument(
                "dataset selects no regions".to_string(),
            ));
        }
        let domain = RegionDomain::expand(geography.as_ref(), selection)?;
        let cache = MemoryLocalityCache::new(geography.clone(), options.phonetic_memo_capacity);
        let mut encoder = PhoneticEncoder::new(options.phonetic_memo_capacity);
        let mut ctx = ConsolidationContext::new(Box::new(geography), Box::new(cache), domain, options);

        for (a, b) in &self.synonyms {
            let a = synonym(a, &mut encoder)?;
            let b = synonym(b, &mut encoder)?;
            ctx.add_synonym(&a, &b)?;
        }
        for exclusion in &self.exclusions {
            let store = ctx.exclusions_mut();
            match exclusion {
                ExclusionRecord::WordSeries { base, test } => {
                    store.exclude_word_series_match(&word_series(base)?, &word_series(test)?)?;
                }
                ExclusionRecord::Regions {
                    word_series: name,
                    regions: (a, b),
                } => {
                    store.exclude_region_match(&word_series(name)?, *a, *b)?;
                }
                ExclusionRecord::Coordinates {
                    word_series: name,
                    coordinates: (a, b),
                } => {
                    store.exclude_coordinate_match(&word_series(name)?, *a, *b)?;
                }
            }
        }
        info!(
            domain = ctx.domain().len(),
            synonyms = self.synonyms.len(),
            exclusions = self.exclusions.len(),
            "dataset.context"
        );
        Ok(ctx)
    }
}

fn synonym(text: &str, encoder: &mut PhoneticEncoder) -> Result<StoredSynonym> {
    StoredSynonym::from_text(text, encoder).ok_or_else(|| {
        ConsolidationError::InvalidArgument(format!("synonym {text:?} has no matchable words"))
    })
}

/// Normalizes curator text the way locality names are normalized.
fn word_series(text: &str) -> Result<String> {
    let words = words(text);
    if words.is_empty() {
        return Err(ConsolidationError::InvalidArgument(format!(
            "exclusion {text:?} has no matchable words"
        )));
    }
    Ok(words.join(" "))
}
