//! Region traversal: the roster of tracked regions, the context the run
//! mutates, the scheduler choosing which region to process next, and the
//! processor comparing a region's localities.

mod context;
mod driver;
mod processor;
mod tracked;

pub use context::{ConsolidationContext, ExclusionBackend, SynonymBackend};
pub use driver::{AdjoiningRegionDriver, DriverRun, DriverStep};
pub use processor::{ProcessorMatches, RegionProcessor};
pub use tracked::{RegionRoster, RegionStatus, TrackedRegion};
