//! Main lineage tracking entry point.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::tracker::cost::{CenterSettings, CostModel, DistanceMode, OverlapMode};
use crate::tracker::detection::ParentTrack;
use crate::tracker::frame_linker;
use crate::tracker::lineage::{self, Lineage, LineageLink, LinkEdge, LinkKind, TrackHeadPolicy};
use crate::tracker::overlap::{BoundsOverlap, OverlapCache, OverlapSource};
use crate::tracker::segment::SegmentGraph;
use crate::tracker::segment_linker::{SegmentLinkSettings, SegmentLinker};

/// Configuration for the [`LineageTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frame-to-frame, split and merge threshold: `1 - normalized overlap` for
    /// overlap mode. Center modes compare the squared distance in calibrated
    /// units, `scale_xy² (dx² + dy²) + scale_z² dz²`, which equals
    /// `scale_xy²` times the pixel distance with Z weighted by
    /// `(scale_z / scale_xy)²`.
    pub max_link_cost: f64,
    pub distance_mode: DistanceMode,
    pub allow_split: bool,
    pub allow_merge: bool,
    pub allow_gaps: bool,
    /// Maximum number of missing frames a gap-closing link may bridge
    pub max_frame_gap: u32,
    /// Gap-closing threshold, in the same units as `max_link_cost`
    pub max_link_cost_gap_closing: f64,
    /// Measure center positions relative to each frame's landmark
    pub use_parent_relative_landmark: bool,
    pub scale_xy: f64,
    pub scale_z: f64,
    pub two_dimensional: bool,
    /// Cost of leaving an object unlinked, relative to the largest candidate cost
    pub alternative_cost_factor: f64,
    pub track_head_policy: TrackHeadPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_link_cost: 0.7,
            distance_mode: DistanceMode::Overlap,
            allow_split: false,
            allow_merge: false,
            allow_gaps: false,
            max_frame_gap: 0,
            max_link_cost_gap_closing: 0.7,
            use_parent_relative_landmark: false,
            scale_xy: 1.0,
            scale_z: 1.0,
            two_dimensional: true,
            alternative_cost_factor: 1.05,
            track_head_policy: TrackHeadPolicy::InheritFromParent,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("max_link_cost", self.max_link_cost),
            ("max_link_cost_gap_closing", self.max_link_cost_gap_closing),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackingError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        for (name, value) in [("scale_xy", self.scale_xy), ("scale_z", self.scale_z)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackingError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !self.alternative_cost_factor.is_finite() || self.alternative_cost_factor <= 1.0 {
            return Err(TrackingError::InvalidConfig(format!(
                "alternative_cost_factor must be greater than 1, got {}",
                self.alternative_cost_factor
            )));
        }
        Ok(())
    }

    /// Gap-closing runs only when gaps are allowed and at least one frame may be missing.
    pub fn gap_closing_enabled(&self) -> bool {
        self.allow_gaps && self.max_frame_gap > 0
    }

    fn center_settings(&self, use_mass_center: bool) -> CenterSettings {
        CenterSettings {
            scale_xy: self.scale_xy,
            scale_z: self.scale_z,
            two_dimensional: self.two_dimensional,
            use_mass_center,
            relative_to_landmark: self.use_parent_relative_landmark,
        }
    }
}

/// Output of one tracking call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingResult {
    /// Records to persist, ordered by (next frame, next, previous)
    pub links: Vec<LineageLink>,
    pub lineage: Lineage,
    /// Number of segments built by frame-to-frame linking
    pub segment_count: usize,
}

impl TrackingResult {
    /// Number of records of the given kind.
    pub fn count(&self, kind: LinkKind) -> usize {
        self.links.iter().filter(|l| l.kind == kind).count()
    }
}

/// Links the detections of a [`ParentTrack`] into lineages.
///
/// Each call is independent; one tracker may serve many threads.
#[derive(Clone)]
pub struct LineageTracker {
    config: TrackerConfig,
    overlap: Arc<dyn OverlapSource>,
}

impl std::fmt::Debug for LineageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageTracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LineageTracker {
    /// Create a tracker using bounding-box overlap for the overlap mode.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            overlap: Arc::new(BoundsOverlap),
        })
    }

    /// Replace the function used to compute pairwise overlaps.
    pub fn with_overlap_source(mut self, source: impl OverlapSource + 'static) -> Self {
        self.overlap = Arc::new(source);
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Link all detections of `track`.
    ///
    /// Fails as a whole: on error no partial lineage is returned.
    pub fn track(&self, track: &ParentTrack) -> Result<TrackingResult> {
        if track.is_empty() {
            return Ok(TrackingResult::default());
        }
        let config = &self.config;

        let cache = OverlapCache::new(track, self.overlap.as_ref());
        let costs = match config.distance_mode {
            DistanceMode::Center => CostModel::Center(track, config.center_settings(false)),
            DistanceMode::MassCenter => CostModel::Center(track, config.center_settings(true)),
            DistanceMode::Overlap => CostModel::Overlap(track, &cache),
        };

        // Step 1: frame-to-frame links
        let ftf = frame_linker::link_frames(
            track,
            costs.for_mode(OverlapMode::Normal).as_ref(),
            config.max_link_cost,
            config.alternative_cost_factor,
        )?;

        // Step 2: segments and segment-level passes
        let mut graph = SegmentGraph::build(track, &ftf)?;
        let segment_count = graph.len();
        let settings = SegmentLinkSettings {
            allow_split: config.allow_split,
            allow_merge: config.allow_merge,
            max_frame_gap: if config.gap_closing_enabled() {
                config.max_frame_gap
            } else {
                0
            },
            max_link_cost: config.max_link_cost,
            max_link_cost_gap_closing: config.max_link_cost_gap_closing,
            alternative_cost_factor: config.alternative_cost_factor,
        };
        let segment_edges = SegmentLinker::new(track, &mut graph, &costs, settings).run()?;

        // Step 3: lineage
        let edges: Vec<LinkEdge> = ftf
            .iter()
            .map(|&(previous, next)| LinkEdge {
                previous,
                next,
                kind: LinkKind::FrameToFrame,
            })
            .chain(segment_edges)
            .collect();
        let (lineage, links) = lineage::materialize(track, &edges, config.track_head_policy)?;

        debug!(
            "tracked {} detections: {} segments, {} links, {} overlaps computed",
            track.len(),
            segment_count,
            edges.len(),
            cache.computed_count()
        );

        Ok(TrackingResult {
            links,
            lineage,
            segment_count,
        })
    }
}
