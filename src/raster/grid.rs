//! Pixel-owner grids.

/// Coverage below this value (about 10%) never claims a pixel.
pub const MIN_COVERAGE: u8 = 0x19;

/// Coverage at this ceiling always wins, even against an equal value.
/// Rendered coverage is clamped to it.
pub const FULL_COVERAGE: u8 = 0xFF;

/// Per-level scratch grid: the winning entity id and its coverage per pixel.
pub struct LevelGrid {
    width: usize,
    height: usize,
    ids: Vec<u32>,
    coverage: Vec<u8>,
}

impl LevelGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ids: vec![0; width * height],
            coverage: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Reset to unclaimed, keeping the allocation. `height` may shrink for
    /// the last slice of a raster.
    pub fn clear(&mut self, height: usize) {
        self.height = height;
        self.ids.clear();
        self.ids.resize(self.width * height, 0);
        self.coverage.clear();
        self.coverage.resize(self.width * height, 0);
    }

    /// Offer a pixel to entity `id` with the given coverage.
    ///
    /// The entity takes the pixel if its coverage is strictly higher than the
    /// current owner's, or if it is at the full-coverage ceiling. Returns
    /// whether the pixel was taken.
    #[inline]
    pub fn offer(&mut self, x: usize, y: usize, coverage: u8, id: u32) -> bool {
        if coverage < MIN_COVERAGE {
            return false;
        }
        let i = y * self.width + x;
        if coverage == FULL_COVERAGE || coverage > self.coverage[i] {
            self.coverage[i] = coverage;
            self.ids[i] = id;
            return true;
        }
        false
    }

    pub fn row(&self, y: usize) -> &[u32] {
        &self.ids[y * self.width..(y + 1) * self.width]
    }
}

/// Cumulative owner grid: finer levels overwrite coarser ones.
pub struct OwnerGrid {
    width: usize,
    height: usize,
    ids: Vec<u32>,
}

impl OwnerGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ids: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self, height: usize) {
        self.height = height;
        self.ids.clear();
        self.ids.resize(self.width * height, 0);
    }

    pub fn row(&self, y: usize) -> &[u32] {
        &self.ids[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        &mut self.ids[y * self.width..(y + 1) * self.width]
    }
}
