use serde::{Deserialize, Serialize};

/// Boxes produced by one detection pass, unordered.
pub type DetectionSet = Vec<BoundingBox>;

/// Axis-aligned face box in pixel coordinates, origin top-left.
///
/// Geometry helpers never clamp implicitly: a padded or mirrored box may
/// extend past the image until [`BoundingBox::clamped`] is called.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> i64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());
        (ix2 - ix1).max(0) as i64 * (iy2 - iy1).max(0) as i64
    }

    /// Fraction of `self` covered by `other`.
    pub fn overlap_ratio(&self, other: &BoundingBox) -> f64 {
        let area = self.area();
        if area == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f64 / area as f64
    }

    /// Reflects the box across the vertical axis of an image `image_width` wide.
    pub fn mirrored(&self, image_width: i32) -> Self {
        Self {
            x: image_width - self.x - self.width,
            ..*self
        }
    }

    /// Multiplies every coordinate by `factor`, rounding to the nearest pixel.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x: (self.x as f64 * factor).round() as i32,
            y: (self.y as f64 * factor).round() as i32,
            width: (self.width as f64 * factor).round() as i32,
            height: (self.height as f64 * factor).round() as i32,
        }
    }

    /// Grows the box by `fraction` of its size on every side.
    pub fn padded(&self, fraction: f64) -> Self {
        let pad_x = (self.width as f64 * fraction) as i32;
        let pad_y = (self.height as f64 * fraction) as i32;
        Self {
            x: self.x - pad_x,
            y: self.y - pad_y,
            width: self.width + 2 * pad_x,
            height: self.height + 2 * pad_y,
        }
    }

    /// Intersection with a `width`x`height` image, or `None` if nothing remains.
    pub fn clamped(&self, width: u32, height: u32) -> Option<Self> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Self::new(x1, y1, x2 - x1, y2 - y1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn bbox(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
        BoundingBox::new(x, y, w, h)
    }

    // ── Overlap ──────────────────────────────────────────────────────

    #[test]
    fn test_intersection_of_disjoint_boxes_is_zero() {
        assert_eq!(bbox(0, 0, 10, 10).intersection_area(&bbox(20, 20, 5, 5)), 0);
    }

    #[test]
    fn test_touching_edges_do_not_intersect() {
        assert_eq!(bbox(0, 0, 50, 50).intersection_area(&bbox(50, 0, 50, 50)), 0);
    }

    #[test]
    fn test_overlap_ratio_uses_own_area() {
        // big covers small completely; small covers a quarter of big
        let big = bbox(0, 0, 100, 100);
        let small = bbox(25, 25, 50, 50);
        assert_relative_eq!(small.overlap_ratio(&big), 1.0);
        assert_relative_eq!(big.overlap_ratio(&small), 0.25);
    }

    #[test]
    fn test_overlap_ratio_of_degenerate_box_is_zero() {
        assert_relative_eq!(bbox(0, 0, 0, 10).overlap_ratio(&bbox(0, 0, 10, 10)), 0.0);
    }

    // ── Transforms ───────────────────────────────────────────────────

    #[rstest]
    #[case::left_edge(bbox(0, 5, 10, 10), 100, 90)]
    #[case::middle(bbox(40, 5, 20, 10), 100, 40)]
    #[case::right_edge(bbox(90, 0, 10, 10), 100, 0)]
    fn test_mirrored_reflects_x(#[case] input: BoundingBox, #[case] width: i32, #[case] x: i32) {
        let m = input.mirrored(width);
        assert_eq!(m.x, x);
        assert_eq!(m.width, input.width);
        assert_eq!(m.y, input.y);
        assert_eq!(m.mirrored(width), input);
    }

    #[test]
    fn test_scaled_rounds_to_nearest() {
        assert_eq!(bbox(10, 11, 21, 30).scaled(2.0), bbox(20, 22, 42, 60));
        assert_eq!(bbox(5, 5, 15, 15).scaled(0.5), bbox(3, 3, 8, 8));
    }

    #[test]
    fn test_padded_grows_each_side() {
        assert_eq!(bbox(100, 100, 50, 40).padded(0.2), bbox(90, 92, 70, 56));
    }

    #[test]
    fn test_clamped_to_image() {
        assert_eq!(
            bbox(-10, -5, 30, 30).clamped(100, 100),
            Some(bbox(0, 0, 20, 25))
        );
        assert_eq!(bbox(90, 90, 30, 30).clamped(100, 100), Some(bbox(90, 90, 10, 10)));
    }

    #[test]
    fn test_clamped_outside_image_is_none() {
        assert_eq!(bbox(120, 0, 10, 10).clamped(100, 100), None);
        assert_eq!(bbox(-20, 0, 10, 10).clamped(100, 100), None);
    }
}
