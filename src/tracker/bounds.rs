/// Axis-aligned bounding box of a segmented object.
///
/// Coordinates are in pixel/voxel units. A 2-D object uses `z = 0` and
/// `depth = 1`, so its volume equals its area.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    /// Lower x coordinate
    pub x: f64,
    /// Lower y coordinate
    pub y: f64,
    /// Lower z coordinate
    pub z: f64,
    /// Extent along x
    pub width: f64,
    /// Extent along y
    pub height: f64,
    /// Extent along z
    pub depth: f64,
}

impl BoundingBox {
    /// Create a 2-D box from its lower corner and dimensions.
    #[inline]
    pub fn new_2d(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            width,
            height,
            depth: 1.0,
        }
    }

    /// Create a 3-D box from its lower corner and dimensions.
    #[inline]
    pub fn new_3d(x: f64, y: f64, z: f64, width: f64, height: f64, depth: f64) -> Self {
        Self {
            x,
            y,
            z,
            width,
            height,
            depth,
        }
    }

    /// Create a box from its two corners (x1, y1, z1, x2, y2, z2).
    #[inline]
    pub fn from_corners(lower: [f64; 3], upper: [f64; 3]) -> Self {
        Self {
            x: lower[0],
            y: lower[1],
            z: lower[2],
            width: upper[0] - lower[0],
            height: upper[1] - lower[1],
            depth: upper[2] - lower[2],
        }
    }

    #[inline]
    pub fn upper(&self) -> [f64; 3] {
        [self.x + self.width, self.y + self.height, self.z + self.depth]
    }

    /// Center point of the box.
    #[inline]
    pub fn center(&self) -> [f64; 3] {
        [
            self.x + self.width / 2.0,
            self.y + self.height / 2.0,
            self.z + self.depth / 2.0,
        ]
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0) * self.depth.max(0.0)
    }

    /// Shift the box by the given offset.
    #[inline]
    pub fn translate(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
            ..*self
        }
    }

    /// Volume shared by both boxes, zero when they are disjoint.
    pub fn intersection(&self, other: &BoundingBox) -> f64 {
        let [ux, uy, uz] = self.upper();
        let [ox, oy, oz] = other.upper();

        let inter_width = (ux.min(ox) - self.x.max(other.x)).max(0.0);
        let inter_height = (uy.min(oy) - self.y.max(other.y)).max(0.0);
        let inter_depth = (uz.min(oz) - self.z.max(other.z)).max(0.0);

        inter_width * inter_height * inter_depth
    }

    /// Intersection over union, zero when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let inter = self.intersection(other);
        let union = self.volume() + other.volume() - inter;

        if union > 0.0 { inter / union } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners() {
        let b = BoundingBox::from_corners([10.0, 20.0, 0.0], [40.0, 60.0, 1.0]);
        assert_eq!(b, BoundingBox::new_2d(10.0, 20.0, 30.0, 40.0));
        assert_eq!(b.upper(), [40.0, 60.0, 1.0]);
    }

    #[test]
    fn test_center_and_volume() {
        let b = BoundingBox::new_3d(0.0, 0.0, 0.0, 4.0, 2.0, 3.0);
        assert_eq!(b.center(), [2.0, 1.0, 1.5]);
        assert_eq!(b.volume(), 24.0);
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new_2d(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new_2d(5.0, 5.0, 10.0, 10.0);

        // Intersection: 5x5 = 25
        // Union: 100 + 100 - 25 = 175
        assert_eq!(a.intersection(&b), 25.0);
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-12);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = BoundingBox::new_2d(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new_2d(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), 0.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_touching_boxes_do_not_overlap() {
        let a = BoundingBox::new_2d(0.0, 0.0, 10.0, 10.0);
        let b = a.translate(10.0, 0.0, 0.0);
        assert_eq!(a.intersection(&b), 0.0);
    }

    #[test]
    fn test_iou_same_box() {
        let a = BoundingBox::new_3d(1.0, 1.0, 1.0, 3.0, 3.0, 3.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-12);
    }
}
