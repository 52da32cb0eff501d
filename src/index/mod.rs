//! Lookup structures shared by the processor: the in-memory phonetic code
//! index and the two curator-decision stores layered over an [`IndexBackend`].

mod backend;
mod exclusions;
mod phonetic_codes;
mod synonyms;

pub use backend::{IndexBackend, MemoryBackend};
pub use exclusions::{ExcludedMatchEntry, ExcludedMatchesStore};
pub use phonetic_codes::PhoneticCodeIndex;
pub use synonyms::{PotentialSynonymsStore, StoredSynonym};
