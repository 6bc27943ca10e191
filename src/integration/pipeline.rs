//! Pipelines combining detection sources with the lineage tracker.

use log::debug;
use rayon::prelude::*;

use crate::error::TrackingError;
use crate::tracker::{LineageTracker, ParentTrack, TrackerConfig, TrackingResult};

use super::DetectionSource;

/// Failure of a [`TrackerPipeline`] run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError<E: std::fmt::Debug> {
    #[error("detection source failed: {0:?}")]
    Source(E),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

/// Bundles a [`DetectionSource`] with a [`LineageTracker`].
pub struct TrackerPipeline<D: DetectionSource> {
    source: D,
    tracker: LineageTracker,
}

impl<D: DetectionSource> TrackerPipeline<D>
where
    D::Error: std::fmt::Debug,
{
    /// Create a new pipeline with the given source and tracker config.
    pub fn new(source: D, config: TrackerConfig) -> Result<Self, TrackingError> {
        Ok(Self {
            source,
            tracker: LineageTracker::new(config)?,
        })
    }

    /// Create a new pipeline with default tracker configuration.
    pub fn with_default_config(source: D) -> Result<Self, TrackingError> {
        Self::new(source, TrackerConfig::default())
    }

    /// Read every frame of the source and track them.
    pub fn run(&mut self) -> Result<TrackingResult, PipelineError<D::Error>> {
        let track = self.source.collect_track().map_err(PipelineError::Source)?;
        Ok(self.tracker.track(&track)?)
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut D {
        &mut self.source
    }

    pub fn tracker(&self) -> &LineageTracker {
        &self.tracker
    }
}

/// Tracks many independent parent tracks in parallel.
#[derive(Debug, Clone)]
pub struct BatchTracker {
    tracker: LineageTracker,
}

impl BatchTracker {
    pub fn new(tracker: LineageTracker) -> Self {
        Self { tracker }
    }

    /// One result per parent track, in input order. A failing track does not
    /// affect the others.
    pub fn track_all(&self, tracks: &[ParentTrack]) -> Vec<Result<TrackingResult, TrackingError>> {
        let results: Vec<_> = tracks.par_iter().map(|t| self.tracker.track(t)).collect();
        debug!(
            "batch: {} parent tracks, {} failed",
            results.len(),
            results.iter().filter(|r| r.is_err()).count()
        );
        results
    }
}
