//! Administrative entities accumulated from intermediate records.

use geo_types::{Coord, LineString};

use super::BoundingBox;

/// A single polygon ring in degrees. The closing edge is implicit.
pub type Ring = LineString<f32>;

/// A region to be rasterized.
///
/// Identity is the metadata `key`: records sharing a key are the same entity
/// and are merged into one entity with several rings.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Leading tab-delimited metadata of the record, level included.
    pub key: String,
    pub level: u8,
    pub bbox: BoundingBox,
    pub polygons: Vec<Ring>,
}

impl Entity {
    pub fn new(key: String, level: u8, ring: Ring, bbox: BoundingBox) -> Self {
        Self {
            key,
            level,
            bbox,
            polygons: vec![ring],
        }
    }

    /// Add another ring of the same entity.
    pub fn merge_ring(&mut self, ring: Ring, bbox: &BoundingBox) {
        self.bbox.merge(bbox);
        self.polygons.push(ring);
    }

    pub fn point_count(&self) -> usize {
        self.polygons.iter().map(|r| r.0.len()).sum()
    }
}

/// Compute the bounding box of a ring.
pub fn ring_bbox(ring: &[Coord<f32>]) -> BoundingBox {
    let mut bb = BoundingBox::empty();
    for c in ring {
        bb.update(c.x, c.y);
    }
    bb
}
