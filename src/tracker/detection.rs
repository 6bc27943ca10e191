//! Detections and the per-parent-track arena that owns them.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};

use crate::tracker::bounds::BoundingBox;

/// Stable index of a detection inside its [`ParentTrack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DetectionId(pub u32);

impl DetectionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for DetectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One segmented object at one frame. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Frame index
    pub frame: u32,
    /// Geometric centroid
    pub center: Point3<f64>,
    /// Intensity-weighted centroid, if measured
    pub mass_center: Option<Point3<f64>>,
    /// Pixel/voxel count
    pub size: f64,
    /// Bounding box used by [`BoundsOverlap`](crate::tracker::BoundsOverlap)
    pub bounds: Option<BoundingBox>,
    /// Opaque key for caller-supplied overlap functions
    pub shape_ref: Option<u64>,
}

impl Detection {
    pub fn new(frame: u32, center: Point3<f64>, size: f64) -> Self {
        Self {
            frame,
            center,
            mass_center: None,
            size,
            bounds: None,
            shape_ref: None,
        }
    }

    /// Mass center, falling back to the geometric center.
    #[inline]
    pub fn mass_center_or_center(&self) -> Point3<f64> {
        self.mass_center.unwrap_or(self.center)
    }
}

/// All detections of one spatial context across frames.
///
/// Detection ids are assigned in insertion order and never change.
#[derive(Debug, Clone, Default)]
pub struct ParentTrack {
    detections: Vec<Detection>,
    frames: BTreeMap<u32, Vec<DetectionId>>,
    landmarks: BTreeMap<u32, Vector3<f64>>,
}

impl ParentTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detection and return its id.
    pub fn push(&mut self, detection: Detection) -> DetectionId {
        let id = DetectionId(self.detections.len() as u32);
        self.frames.entry(detection.frame).or_default().push(id);
        self.detections.push(detection);
        id
    }

    /// Set the origin of the parent bounding box at `frame`.
    pub fn set_landmark(&mut self, frame: u32, origin: Vector3<f64>) {
        self.landmarks.insert(frame, origin);
    }

    pub fn landmark(&self, frame: u32) -> Option<&Vector3<f64>> {
        self.landmarks.get(&frame)
    }

    #[inline]
    pub fn get(&self, id: DetectionId) -> Option<&Detection> {
        self.detections.get(id.index())
    }

    /// Panics if `id` does not belong to this track.
    #[inline]
    pub fn detection(&self, id: DetectionId) -> &Detection {
        &self.detections[id.index()]
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DetectionId, &Detection)> {
        self.detections
            .iter()
            .enumerate()
            .map(|(i, d)| (DetectionId(i as u32), d))
    }

    /// Frames that hold at least one detection, ascending.
    pub fn frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.frames.keys().copied()
    }

    /// Ids of the detections at `frame`, ascending.
    pub fn at_frame(&self, frame: u32) -> &[DetectionId] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pairs of literally consecutive frames `(t, t + 1)` present in the track.
    pub fn consecutive_frame_pairs(&self) -> Vec<(u32, u32)> {
        let frames: Vec<u32> = self.frames().collect();
        frames
            .windows(2)
            .filter(|w| w[0] + 1 == w[1])
            .map(|w| (w[0], w[1]))
            .collect()
    }
}
