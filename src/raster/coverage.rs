//! Anti-aliased scanline polygon fill.
//!
//! All rings of an entity are filled together with the even-odd rule. Each
//! pixel row is sampled with `SUBSAMPLES` horizontal scanlines; along a
//! scanline the horizontal coverage of every span is exact, so the result is
//! the fractional area of the pixel inside the polygon, up to the vertical
//! sampling error.

use crate::models::{BoundingBox, Ring};
use crate::viewport::Viewport;

/// Number of sub-scanlines per pixel row.
pub const SUBSAMPLES: usize = 16;

/// A non-horizontal polygon edge in pixel space, oriented top to bottom.
#[derive(Debug, Clone, Copy)]
struct Edge {
    ytop: f64,
    ybot: f64,
    xtop: f64,
    dxdy: f64,
}

impl Edge {
    fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Option<Self> {
        if y0 == y1 || !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
            return None;
        }
        let (xa, ya, xb, yb) = if y0 < y1 {
            (x0, y0, x1, y1)
        } else {
            (x1, y1, x0, y0)
        };
        Some(Self {
            ytop: ya,
            ybot: yb,
            xtop: xa,
            dxdy: (xb - xa) / (yb - ya),
        })
    }

    #[inline]
    fn x_at(&self, y: f64) -> f64 {
        self.xtop + (y - self.ytop) * self.dxdy
    }
}

/// Pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl PixelRect {
    /// Project a bounding box into the viewport, with one pixel of margin,
    /// clipped to the raster. `None` if it misses the viewport entirely.
    pub fn project(bbox: &BoundingBox, viewport: &Viewport) -> Option<Self> {
        if bbox.is_empty() {
            return None;
        }
        let pxmin = viewport.proj_lon(bbox.lonmin).floor();
        let pxmax = viewport.proj_lon(bbox.lonmax).ceil();
        let pymin = viewport.proj_lat(bbox.latmin).floor();
        let pymax = viewport.proj_lat(bbox.latmax).ceil();
        let (w, h) = (viewport.width as f64, viewport.height as f64);
        if pxmax < 0.0 || pxmin > w || pymax < 0.0 || pymin > h {
            return None;
        }
        let rect = Self {
            x0: (pxmin - 1.0).max(0.0) as usize,
            x1: (pxmax + 1.0).min(w) as usize,
            y0: (pymin - 1.0).max(0.0) as usize,
            y1: (pymax + 1.0).min(h) as usize,
        };
        if rect.x0 >= rect.x1 || rect.y0 >= rect.y1 {
            return None;
        }
        Some(rect)
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }
}

/// Reusable scanline rasterizer. Buffers are kept between entities.
#[derive(Default)]
pub struct Rasterizer {
    edges: Vec<Edge>,
    active: Vec<Edge>,
    crossings: Vec<f64>,
    partial: Vec<f32>,
    full: Vec<i32>,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill `rings` inside `viewport`, reporting the 8-bit coverage of every
    /// pixel in the entity's clipped bounding rectangle to `sink(x, y, coverage)`.
    ///
    /// Returns `false` if the bounding box misses the viewport.
    pub fn render<F>(
        &mut self,
        rings: &[Ring],
        bbox: &BoundingBox,
        viewport: &Viewport,
        mut sink: F,
    ) -> bool
    where
        F: FnMut(usize, usize, u8),
    {
        let rect = match PixelRect::project(bbox, viewport) {
            Some(r) => r,
            None => return false,
        };
        self.build_edges(rings, viewport);

        let width = rect.width();
        self.partial.clear();
        self.partial.resize(width + 1, 0.0);
        self.full.clear();
        self.full.resize(width + 1, 0);
        self.active.clear();

        let step = 1.0 / SUBSAMPLES as f64;
        let norm = 255.0 / SUBSAMPLES as f32;
        let mut next = 0;

        for y in rect.y0..rect.y1 {
            for s in 0..SUBSAMPLES {
                let sy = y as f64 + (s as f64 + 0.5) * step;
                while next < self.edges.len() && self.edges[next].ytop <= sy {
                    self.active.push(self.edges[next]);
                    next += 1;
                }
                self.active.retain(|e| e.ybot > sy);
                if self.active.is_empty() {
                    continue;
                }

                self.crossings.clear();
                self.crossings.extend(self.active.iter().map(|e| e.x_at(sy)));
                self.crossings.sort_by(|a, b| a.total_cmp(b));

                for pair in self.crossings.chunks_exact(2) {
                    accumulate_span(
                        pair[0] - rect.x0 as f64,
                        pair[1] - rect.x0 as f64,
                        width,
                        &mut self.partial,
                        &mut self.full,
                    );
                }
            }

            let mut run = 0i32;
            for i in 0..width {
                run += self.full[i];
                let samples = self.partial[i] + run as f32;
                let coverage = (samples * norm).round().clamp(0.0, 255.0) as u8;
                if coverage > 0 {
                    sink(rect.x0 + i, y, coverage);
                }
            }
            self.partial.iter_mut().for_each(|v| *v = 0.0);
            self.full.iter_mut().for_each(|v| *v = 0);
        }
        true
    }

    fn build_edges(&mut self, rings: &[Ring], viewport: &Viewport) {
        self.edges.clear();
        for ring in rings {
            let pts = &ring.0;
            if pts.len() < 2 {
                continue;
            }
            // Closing edge is implicit; a repeated first point yields a
            // zero-length edge that is skipped.
            for i in 0..pts.len() {
                let a = pts[i];
                let b = pts[(i + 1) % pts.len()];
                if let Some(edge) = Edge::new(
                    viewport.proj_lon(a.x),
                    viewport.proj_lat(a.y),
                    viewport.proj_lon(b.x),
                    viewport.proj_lat(b.y),
                ) {
                    self.edges.push(edge);
                }
            }
        }
        self.edges.sort_by(|a, b| a.ytop.total_cmp(&b.ytop));
    }
}

/// Add the span `[a, b)` (relative pixel coordinates) of one sub-scanline.
///
/// Fully covered pixels go into `full` as a difference array, the two
/// boundary pixels into `partial`.
fn accumulate_span(a: f64, b: f64, width: usize, partial: &mut [f32], full: &mut [i32]) {
    let w = width as f64;
    let a = a.clamp(0.0, w);
    let b = b.clamp(0.0, w);
    if b <= a {
        return;
    }
    let ia = a.floor() as usize;
    let ib = b.floor() as usize;
    if ia == ib {
        if ia < width {
            partial[ia] += (b - a) as f32;
        }
        return;
    }
    partial[ia] += ((ia + 1) as f64 - a) as f32;
    if ia + 1 < ib {
        full[ia + 1] += 1;
        full[ib] -= 1;
    }
    if ib < width {
        partial[ib] += (b - ib as f64) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ring_bbox;
    use geo_types::{Coord, LineString};

    fn ring(points: &[(f32, f32)]) -> Ring {
        LineString::new(points.iter().map(|&(x, y)| Coord { x, y }).collect())
    }

    fn viewport() -> Viewport {
        // 1 pixel per degree, lon/lat 0..20 map to pixels 0..20.
        Viewport::new(20.0, 20.0, 0.0, 0.0, 1.0)
    }

    fn rasterize(rings: &[Ring]) -> Vec<Vec<u8>> {
        let vp = viewport();
        let mut bbox = BoundingBox::empty();
        for r in rings {
            bbox.merge(&ring_bbox(&r.0));
        }
        let mut out = vec![vec![0u8; vp.width]; vp.height];
        Rasterizer::new().render(rings, &bbox, &vp, |x, y, c| out[y][x] = c);
        out
    }

    #[test]
    fn test_axis_aligned_square() {
        let out = rasterize(&[ring(&[(2.0, 2.0), (2.0, 6.0), (6.0, 6.0), (6.0, 2.0)])]);
        for y in 0..20 {
            for x in 0..20 {
                let inside = (2..6).contains(&x) && (2..6).contains(&y);
                assert_eq!(out[y][x], if inside { 255 } else { 0 }, "pixel {},{}", x, y);
            }
        }
    }

    #[test]
    fn test_half_pixel_edge() {
        // Left edge at x = 2.5 covers half of column 2.
        let out = rasterize(&[ring(&[(2.5, 2.0), (6.0, 2.0), (6.0, 6.0), (2.5, 6.0)])]);
        assert_eq!(out[3][2], 128);
        assert_eq!(out[3][3], 255);
        assert_eq!(out[3][1], 0);
    }

    #[test]
    fn test_diagonal_edge_is_fractional() {
        let out = rasterize(&[ring(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)])]);
        // Pixels on the diagonal are roughly half covered.
        let c = out[4][5];
        assert!(c > 100 && c < 155, "coverage {}", c);
        assert_eq!(out[2][2], 255);
        assert_eq!(out[8][8], 0);
    }

    #[test]
    fn test_even_odd_hole() {
        let outer = ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let hole = ring(&[(3.0, 3.0), (7.0, 3.0), (7.0, 7.0), (3.0, 7.0)]);
        let out = rasterize(&[outer, hole]);
        assert_eq!(out[1][1], 255);
        assert_eq!(out[5][5], 0);
        assert_eq!(out[5][8], 255);
    }

    #[test]
    fn test_explicitly_closed_ring() {
        let open = rasterize(&[ring(&[(2.0, 2.0), (6.0, 2.0), (6.0, 6.0), (2.0, 6.0)])]);
        let closed = rasterize(&[ring(&[
            (2.0, 2.0),
            (6.0, 2.0),
            (6.0, 6.0),
            (2.0, 6.0),
            (2.0, 2.0),
        ])]);
        assert_eq!(open, closed);
    }

    #[test]
    fn test_outside_viewport() {
        let vp = viewport();
        let r = ring(&[(30.0, 30.0), (40.0, 30.0), (40.0, 40.0)]);
        let bbox = ring_bbox(&r.0);
        let mut hits = 0;
        assert!(!Rasterizer::new().render(&[r], &bbox, &vp, |_, _, _| hits += 1));
        assert_eq!(hits, 0);
    }
}
