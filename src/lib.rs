//! Locality duplicate detection for natural history collection databases.
//!
//! Localities are compared region by region. An [`AdjoiningRegionDriver`]
//! decides which region to process next and keeps the localities of its
//! neighbors cached so that duplicates spanning a border are found; a
//! [`RegionProcessor`] compares each locality of the region against every
//! cached locality sharing a phonetic code and reports candidate pairs as
//! [`LocalityMatch`]es. [`Consolidation`] hosts the two as a pull-based run.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod consolidate;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod geography;
pub mod index;
pub mod locality;
pub mod options;
pub mod region;
pub mod types;

pub use cache::{LocalityCache, LocalitySource, MemoryLocalityCache};
pub use consolidate::{Consolidation, ConsolidationEvent, ConsolidationSummary};
pub use dataset::{Dataset, ExclusionRecord};
pub use diagnostics::{ConsolidationDiagnostics, CounterDiagnostics, NoopDiagnostics};
pub use error::{ConsolidationError, Result};
pub use geography::{MemoryGeography, Region, RegionDomain, RegionGraph, RegionRank};
pub use index::{
    ExcludedMatchEntry, ExcludedMatchesStore, IndexBackend, MemoryBackend, PhoneticCodeIndex,
    PotentialSynonymsStore, StoredSynonym,
};
pub use locality::{
    CachedLocality, ExcludedSubsetPair, LocalityMatch, LocalityRecord, PhoneticEncoder,
    PhoneticMatch, PhoneticSubset,
};
pub use options::ConsolidationOptions;
pub use region::{
    AdjoiningRegionDriver, ConsolidationContext, DriverStep, RegionProcessor, RegionStatus,
    TrackedRegion,
};
pub use types::{Coordinates, LocalityId, RegionId};
