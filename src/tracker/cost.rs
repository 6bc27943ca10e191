//! Distance metrics between two detections.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::tracker::detection::{Detection, DetectionId, ParentTrack};
use crate::tracker::overlap::OverlapCache;

/// Smallest cost handed to the solver. A true distance of zero is promoted to
/// this value so it stays distinguishable from an absent edge.
pub const MIN_LINK_COST: f64 = f64::MIN_POSITIVE;

/// How the distance between two detections is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMode {
    /// Squared distance between geometric centers
    Center,
    /// Squared distance between mass centers
    MassCenter,
    /// One minus a normalized overlap
    #[default]
    Overlap,
}

/// Normalization of the overlap distance, switched per linking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapMode {
    /// 1 - IoU
    Normal,
    /// Normalized by the smaller object when the earlier one is larger
    Split,
    /// Normalized by the smaller object when the later one is larger
    Merge,
}

/// Cost of linking two detections. `None` means there is no edge.
///
/// Implementations are symmetric under time order: the arguments are
/// canonicalized by frame before any mode-specific branching.
pub trait PairCost: Send + Sync {
    fn cost(&self, a: DetectionId, b: DetectionId) -> Option<f64>;
}

#[inline]
fn promote(distance: f64) -> f64 {
    if distance > MIN_LINK_COST {
        distance
    } else {
        MIN_LINK_COST
    }
}

/// Order two detections by (frame, id).
#[inline]
fn by_time<'t>(
    track: &'t ParentTrack,
    a: DetectionId,
    b: DetectionId,
) -> Option<((DetectionId, &'t Detection), (DetectionId, &'t Detection))> {
    let (da, db) = (track.get(a)?, track.get(b)?);
    if (da.frame, a) <= (db.frame, b) {
        Some(((a, da), (b, db)))
    } else {
        Some(((b, db), (a, da)))
    }
}

/// Ratio of the first object's size to the second's.
#[inline]
pub fn size_ratio(a: &Detection, b: &Detection) -> f64 {
    if b.size > 0.0 { a.size / b.size } else { f64::INFINITY }
}

/// Squared Euclidean center distance in calibrated units.
pub struct CenterDistance<'a> {
    track: &'a ParentTrack,
    scale_xy_sq: f64,
    scale_z_sq: f64,
    use_mass_center: bool,
    relative_to_landmark: bool,
}

impl<'a> CenterDistance<'a> {
    pub fn new(
        track: &'a ParentTrack,
        scale_xy: f64,
        scale_z: f64,
        two_dimensional: bool,
        use_mass_center: bool,
        relative_to_landmark: bool,
    ) -> Self {
        Self {
            track,
            scale_xy_sq: scale_xy * scale_xy,
            scale_z_sq: if two_dimensional { 0.0 } else { scale_z * scale_z },
            use_mass_center,
            relative_to_landmark,
        }
    }

    fn position(&self, detection: &Detection) -> Point3<f64> {
        let p = if self.use_mass_center {
            detection.mass_center_or_center()
        } else {
            detection.center
        };
        match self.track.landmark(detection.frame) {
            Some(origin) if self.relative_to_landmark => p - origin,
            _ => p,
        }
    }
}

impl PairCost for CenterDistance<'_> {
    fn cost(&self, a: DetectionId, b: DetectionId) -> Option<f64> {
        let ((_, first), (_, second)) = by_time(self.track, a, b)?;
        let d = self.position(second) - self.position(first);
        let distance = self.scale_xy_sq * (d.x * d.x + d.y * d.y) + self.scale_z_sq * d.z * d.z;
        distance.is_finite().then(|| promote(distance))
    }
}

/// One minus the overlap normalized according to an [`OverlapMode`].
pub struct OverlapDistance<'a> {
    track: &'a ParentTrack,
    cache: &'a OverlapCache<'a>,
    mode: OverlapMode,
}

impl<'a> OverlapDistance<'a> {
    pub fn new(track: &'a ParentTrack, cache: &'a OverlapCache<'a>, mode: OverlapMode) -> Self {
        Self { track, cache, mode }
    }
}

impl PairCost for OverlapDistance<'_> {
    fn cost(&self, a: DetectionId, b: DetectionId) -> Option<f64> {
        let ((ia, earlier), (ib, later)) = by_time(self.track, a, b)?;
        let overlap = self.cache.get(ia, ib)?;
        if overlap <= 0.0 {
            return None;
        }

        let union = earlier.size + later.size - overlap;
        if union <= 0.0 {
            return None;
        }
        let iou_distance = 1.0 - overlap / union;
        let smaller = earlier.size.min(later.size);

        let distance = match self.mode {
            OverlapMode::Split if size_ratio(earlier, later) > 1.0 => 1.0 - overlap / smaller,
            OverlapMode::Merge if size_ratio(later, earlier) > 1.0 => 1.0 - overlap / smaller,
            _ => iou_distance,
        };
        Some(promote(distance.max(0.0)))
    }
}

/// Distance metric selected once per tracking call.
pub enum CostModel<'a> {
    Center(&'a ParentTrack, CenterSettings),
    Overlap(&'a ParentTrack, &'a OverlapCache<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct CenterSettings {
    pub scale_xy: f64,
    pub scale_z: f64,
    pub two_dimensional: bool,
    pub use_mass_center: bool,
    pub relative_to_landmark: bool,
}

impl<'a> CostModel<'a> {
    /// Pair cost for one linking pass. Center metrics ignore `mode`.
    pub fn for_mode(&self, mode: OverlapMode) -> Box<dyn PairCost + 'a> {
        match *self {
            CostModel::Center(track, s) => Box::new(CenterDistance::new(
                track,
                s.scale_xy,
                s.scale_z,
                s.two_dimensional,
                s.use_mass_center,
                s.relative_to_landmark,
            )),
            CostModel::Overlap(track, cache) => Box::new(OverlapDistance::new(track, cache, mode)),
        }
    }
}
