//! Geographic bounding boxes in degrees.

/// Axis-aligned extent in degrees.
///
/// A fresh box is "empty": min fields hold `+inf` and max fields `-inf`, so its
/// area is never positive until the first update. Boxes never wrap across the
/// antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lonmin: f32,
    pub lonmax: f32,
    pub latmin: f32,
    pub latmax: f32,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            lonmin: f32::INFINITY,
            lonmax: f32::NEG_INFINITY,
            latmin: f32::INFINITY,
            latmax: f32::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lonmin > self.lonmax || self.latmin > self.latmax
    }

    /// Extend the box to include a point.
    pub fn update(&mut self, lon: f32, lat: f32) {
        self.lonmin = self.lonmin.min(lon);
        self.lonmax = self.lonmax.max(lon);
        self.latmin = self.latmin.min(lat);
        self.latmax = self.latmax.max(lat);
    }

    /// Union with another box.
    pub fn merge(&mut self, other: &BoundingBox) {
        self.lonmin = self.lonmin.min(other.lonmin);
        self.lonmax = self.lonmax.max(other.lonmax);
        self.latmin = self.latmin.min(other.latmin);
        self.latmax = self.latmax.max(other.latmax);
    }

    pub fn width(&self) -> f32 {
        self.lonmax - self.lonmin
    }

    pub fn height(&self) -> f32 {
        self.latmax - self.latmin
    }

    /// Unprojected area in square degrees; negative or zero while empty.
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return f64::NEG_INFINITY;
        }
        f64::from(self.width()) * f64::from(self.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_box() {
        let bb = BoundingBox::empty();
        assert!(bb.is_empty());
        assert!(bb.area() <= 0.0);
    }

    #[test]
    fn test_update_and_merge() {
        let mut a = BoundingBox::empty();
        a.update(0.0, 0.0);
        a.update(10.0, 5.0);
        assert_eq!(a.area(), 50.0);

        let mut b = BoundingBox::empty();
        b.update(-2.0, 3.0);
        b.update(1.0, 8.0);

        a.merge(&b);
        assert_eq!(a.lonmin, -2.0);
        assert_eq!(a.lonmax, 10.0);
        assert_eq!(a.latmin, 0.0);
        assert_eq!(a.latmax, 8.0);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let mut a = BoundingBox::empty();
        a.update(1.0, 2.0);
        a.update(3.0, 4.0);
        let before = a;
        a.merge(&BoundingBox::empty());
        assert_eq!(a, before);
    }
}
