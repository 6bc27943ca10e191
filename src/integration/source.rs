//! Traits for feeding detections from a segmentation stage.

use nalgebra::Vector3;

use crate::tracker::{Detection, ParentTrack};

/// Trait for segmentation stages that produce detections frame by frame.
///
/// # Example
///
/// ```ignore
/// use celltrack_rs::{Detection, DetectionSource};
///
/// struct MySegmenter {
///     // Your segmentation state here
/// }
///
/// impl DetectionSource for MySegmenter {
///     type Error = std::io::Error;
///
///     fn frames(&self) -> std::ops::Range<u32> {
///         0..10
///     }
///
///     fn detect(&mut self, frame: u32) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for segmentation failures.
    type Error;

    /// Frames to read, in order.
    fn frames(&self) -> std::ops::Range<u32>;

    /// Detections of one frame. Their `frame` field must equal `frame`.
    fn detect(&mut self, frame: u32) -> Result<Vec<Detection>, Self::Error>;

    /// Origin of the parent bounding box at `frame`, if known.
    fn landmark(&mut self, _frame: u32) -> Result<Option<Vector3<f64>>, Self::Error> {
        Ok(None)
    }

    /// Read every frame into a [`ParentTrack`].
    fn collect_track(&mut self) -> Result<ParentTrack, Self::Error> {
        let mut track = ParentTrack::new();
        for frame in self.frames() {
            for detection in self.detect(frame)? {
                track.push(detection);
            }
            if let Some(origin) = self.landmark(frame)? {
                track.set_landmark(frame, origin);
            }
        }
        Ok(track)
    }
}

/// Conversion of caller-side collections into a [`ParentTrack`].
pub trait IntoParentTrack {
    fn into_parent_track(self) -> ParentTrack;
}

impl IntoParentTrack for ParentTrack {
    fn into_parent_track(self) -> ParentTrack {
        self
    }
}

impl IntoParentTrack for Vec<Detection> {
    fn into_parent_track(self) -> ParentTrack {
        let mut track = ParentTrack::new();
        for detection in self {
            track.push(detection);
        }
        track
    }
}

/// One detection list per frame; ids follow frame order, then list order.
impl IntoParentTrack for Vec<Vec<Detection>> {
    fn into_parent_track(self) -> ParentTrack {
        self.into_iter().flatten().collect::<Vec<_>>().into_parent_track()
    }
}
