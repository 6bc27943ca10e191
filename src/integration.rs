//! Integration module for connecting segmentation stages with the tracker.
//!
//! This module provides a detection builder, traits for detection sources,
//! and pipelines running the tracker over one or many parent tracks.

mod builder;
mod pipeline;
mod source;

pub use builder::DetectionBuilder;
pub use pipeline::{BatchTracker, PipelineError, TrackerPipeline};
pub use source::{DetectionSource, IntoParentTrack};
