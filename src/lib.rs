//! Lineage tracking of segmented objects across a sequence of frames.
//!
//! Detections are first linked frame-to-frame by solving one linear assignment
//! problem per pair of consecutive frames. The resulting track segments are
//! then joined by segment-level passes (split, merge, gap-closing) and the
//! accepted edges are materialized into previous/next/track-head relations.

pub mod error;
pub mod integration;
pub mod tracker;

pub use error::{Result, TrackingError};
pub use integration::{
    BatchTracker, DetectionBuilder, DetectionSource, IntoParentTrack, PipelineError, TrackerPipeline,
};
pub use tracker::{
    BoundingBox, BoundsOverlap, Detection, DetectionId, DistanceMode, Lineage, LineageLink,
    LineageTracker, LinkKind, OverlapSource, ParentTrack, TrackHeadPolicy, TrackerConfig,
    TrackingResult,
};
