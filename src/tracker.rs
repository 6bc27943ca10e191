mod bounds;
mod cost;
mod detection;
mod end_state;
mod frame_linker;
mod lap;
mod lineage;
mod lineage_tracker;
mod overlap;
mod segment;
mod segment_linker;

pub use bounds::BoundingBox;
pub use cost::{DistanceMode, MIN_LINK_COST, OverlapMode};
pub use detection::{Detection, DetectionId, ParentTrack};
pub use end_state::EndState;
pub use lap::{AssignmentResult, CostEdge, SparseCostMatrix, linear_assignment};
pub use lineage::{Lineage, LineageLink, LinkKind, TrackHeadPolicy};
pub use lineage_tracker::{LineageTracker, TrackerConfig, TrackingResult};
pub use overlap::{BoundsOverlap, OverlapSource};
pub use segment::{SegmentGraph, SegmentId, TrackSegment};
