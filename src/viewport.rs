//! Affine mapping between geographic degrees and raster pixels.
//!
//! The builder and the query engine must project with the same formula and the
//! same parameters, otherwise lookups silently misalign. Both sides therefore
//! construct their viewport from the values stored in the container header.

/// Viewport of the raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width of viewport in degrees.
    pub xcover: f64,
    /// Height of viewport in degrees.
    pub ycover: f64,
    /// Longitude offset (usually +180).
    pub xshift: f64,
    /// Latitude offset.
    pub yshift: f64,
    /// Raster size in pixels.
    pub width: usize,
    pub height: usize,
    /// Pixels per degree.
    pub xscale: f64,
    pub yscale: f64,
}

impl Viewport {
    /// Create a viewport with the given resolution in degrees per pixel.
    ///
    /// Cover and shift are rounded to `f32` up front, since that is the
    /// precision the container stores them in.
    pub fn new(xcover: f64, ycover: f64, xshift: f64, yshift: f64, resolution: f64) -> Self {
        let xcover = f64::from(xcover as f32);
        let ycover = f64::from(ycover as f32);
        let width = (xcover / resolution).ceil() as usize;
        let height = (ycover / resolution).ceil() as usize;
        Self::from_header(
            width,
            height,
            xcover as f32,
            ycover as f32,
            xshift as f32,
            yshift as f32,
        )
    }

    /// Rebuild the viewport from the header fields of a container file.
    pub fn from_header(
        width: usize,
        height: usize,
        xcover: f32,
        ycover: f32,
        xshift: f32,
        yshift: f32,
    ) -> Self {
        let xcover = f64::from(xcover);
        let ycover = f64::from(ycover);
        Self {
            xcover,
            ycover,
            xshift: f64::from(xshift),
            yshift: f64::from(yshift),
            width,
            height,
            xscale: width as f64 / xcover,
            yscale: height as f64 / ycover,
        }
    }

    /// Restrict to a pixel rectangle, clipped to this viewport.
    ///
    /// Scales are kept and shifts recomputed so that pixel `(x, y)` of the
    /// parent becomes pixel `(0, 0)` of the slice.
    pub fn slice(&self, x: usize, y: usize, w: usize, h: usize) -> Self {
        let width = self.width.saturating_sub(x).min(w);
        let height = self.height.saturating_sub(y).min(h);
        Self {
            xcover: self.xcover * width as f64 / self.width as f64,
            ycover: self.ycover * height as f64 / self.height as f64,
            xshift: self.xshift - x as f64 / self.xscale,
            yshift: self.yshift - y as f64 / self.yscale,
            width,
            height,
            xscale: self.xscale,
            yscale: self.yscale,
        }
    }

    /// Project longitude to a fractional pixel column.
    #[inline]
    pub fn proj_lon(&self, lon: f32) -> f64 {
        (f64::from(lon) + self.xshift) * self.xscale
    }

    /// Project latitude to a fractional pixel row.
    #[inline]
    pub fn proj_lat(&self, lat: f32) -> f64 {
        (f64::from(lat) + self.yshift) * self.yscale
    }

    /// Longitude of the center of pixel column `x`.
    pub fn unproject_lon(&self, x: usize) -> f64 {
        (x as f64 + 0.5) / self.xscale - self.xshift
    }

    /// Latitude of the center of pixel row `y`.
    pub fn unproject_lat(&self, y: usize) -> f64 {
        (y as f64 + 0.5) / self.yscale - self.yshift
    }

    /// Pixel containing a coordinate, or `None` if it falls outside the raster.
    pub fn pixel(&self, lon: f32, lat: f32) -> Option<(usize, usize)> {
        let px = self.proj_lon(lon).floor();
        let py = self.proj_lat(lat).floor();
        // Negated comparisons also reject NaN.
        if !(px >= 0.0 && px < self.width as f64 && py >= 0.0 && py < self.height as f64) {
            return None;
        }
        Some((px as usize, py as usize))
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} px, lon {} to {}, lat {} to {}",
            self.width,
            self.height,
            -self.xshift,
            self.xcover - self.xshift,
            -self.yshift,
            self.ycover - self.yshift
        )
    }
}
