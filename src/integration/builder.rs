//! Builder for creating Detection objects from segmentation outputs.

use nalgebra::Point3;

use crate::tracker::{BoundingBox, Detection};

/// Builder for creating [`Detection`] objects.
///
/// When no center is given the bounding box center is used, and when no size
/// is given the bounding box volume is used.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    frame: u32,
    center: Option<Point3<f64>>,
    mass_center: Option<Point3<f64>>,
    size: Option<f64>,
    bounds: Option<BoundingBox>,
    shape_ref: Option<u64>,
}

impl DetectionBuilder {
    /// Create a new detection builder for `frame`.
    pub fn new(frame: u32) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }

    /// Set the geometric center.
    pub fn center(mut self, x: f64, y: f64, z: f64) -> Self {
        self.center = Some(Point3::new(x, y, z));
        self
    }

    /// Set the geometric center of a 2-D object.
    pub fn center_2d(self, x: f64, y: f64) -> Self {
        self.center(x, y, 0.0)
    }

    /// Set the intensity-weighted center.
    pub fn mass_center(mut self, x: f64, y: f64, z: f64) -> Self {
        self.mass_center = Some(Point3::new(x, y, z));
        self
    }

    /// Set the pixel/voxel count.
    pub fn size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Set the key used by caller-supplied overlap functions.
    pub fn shape_ref(mut self, key: u64) -> Self {
        self.shape_ref = Some(key);
        self
    }

    /// Build the final `Detection`.
    pub fn build(self) -> Detection {
        let center = self
            .center
            .or_else(|| self.bounds.map(|b| Point3::from(b.center())))
            .unwrap_or_else(Point3::origin);
        let size = self
            .size
            .or_else(|| self.bounds.map(|b| b.volume()))
            .unwrap_or(0.0);

        Detection {
            frame: self.frame,
            center,
            mass_center: self.mass_center,
            size,
            bounds: self.bounds,
            shape_ref: self.shape_ref,
        }
    }
}
