//! Rasterization of administrative levels into pixel-owner grids.
//!
//! Entities of one level are drawn largest first into a [`LevelGrid`] using
//! anti-aliased coverage as the priority signal, then merged into the
//! cumulative [`OwnerGrid`] while voting for parents.

mod coverage;
mod flatten;
mod grid;

pub use coverage::{PixelRect, Rasterizer, SUBSAMPLES};
pub use flatten::ParentVotes;
pub use grid::{LevelGrid, OwnerGrid, FULL_COVERAGE, MIN_COVERAGE};

use crate::models::Entity;
use crate::viewport::Viewport;

/// An entity with its build-wide id.
#[derive(Debug)]
pub struct RenderEntity {
    pub id: u32,
    pub entity: Entity,
}

/// Sort a level by bounding box area, descending, ties by key.
pub fn order_level(entities: &mut [Entity]) {
    entities.sort_by(|a, b| {
        b.bbox
            .area()
            .total_cmp(&a.bbox.area())
            .then_with(|| a.key.cmp(&b.key))
    });
}

/// Render one level into `grid`. Returns the number of entities whose
/// bounding box intersected the viewport.
pub fn render_level(
    rasterizer: &mut Rasterizer,
    viewport: &Viewport,
    entities: &[RenderEntity],
    grid: &mut LevelGrid,
) -> usize {
    let mut drawn = 0;
    for e in entities {
        if e.entity.polygons.is_empty() {
            continue;
        }
        let id = e.id;
        let hit = rasterizer.render(&e.entity.polygons, &e.entity.bbox, viewport, |x, y, c| {
            grid.offer(x, y, c, id);
        });
        if hit {
            drawn += 1;
        }
    }
    drawn
}
