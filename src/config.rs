//! Build configuration, loaded from TOML.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::viewport::Viewport;

/// Largest raster width or height.
pub const MAX_DIMENSION: usize = i32::MAX as usize;

/// Parameters of an index build.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BuildConfig {
    /// Degrees per pixel.
    pub resolution: f64,
    pub viewport: ViewportConfig,
    /// Lowest admin level kept (coarsest).
    pub min_level: u8,
    /// Highest admin level kept (finest).
    pub max_level: u8,
    /// Minimum bounding box size, in pixels. Rings with a smaller box area
    /// than `min_pixels * resolution` are dropped.
    pub min_pixels: f64,
    /// Number of raster rows rendered per slice.
    pub slice_height: usize,
}

/// Extent of the raster in degrees.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ViewportConfig {
    pub xcover: f64,
    pub ycover: f64,
    pub xshift: f64,
    pub yshift: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        // Longitude -180..180, latitude -60..80.
        Self {
            xcover: 360.0,
            ycover: 140.0,
            xshift: 180.0,
            yshift: 60.0,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            resolution: 0.001,
            viewport: ViewportConfig::default(),
            min_level: 2,
            max_level: 10,
            min_pixels: 4.0,
            slice_height: 2048,
        }
    }
}

impl BuildConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: BuildConfig =
            toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.resolution > 0.0) {
            anyhow::bail!("resolution must be positive, got {}", self.resolution);
        }
        if self.min_level > self.max_level {
            anyhow::bail!(
                "min_level {} is above max_level {}",
                self.min_level,
                self.max_level
            );
        }
        if self.slice_height == 0 {
            anyhow::bail!("slice_height must be at least 1");
        }
        let vp = &self.viewport;
        if !(vp.xcover > 0.0 && vp.ycover > 0.0) {
            anyhow::bail!("viewport cover must be positive");
        }
        if vp.xcover - vp.xshift > 180.0 || vp.xshift > 180.0 {
            anyhow::bail!("viewport must not cross the antimeridian");
        }
        // Dimensions are stored as signed 32-bit integers in the index header.
        let raster = self.viewport();
        if raster.width > MAX_DIMENSION || raster.height > MAX_DIMENSION {
            anyhow::bail!(
                "raster of {}x{} pixels exceeds {} per side, increase resolution",
                raster.width,
                raster.height,
                MAX_DIMENSION
            );
        }
        Ok(())
    }

    /// Minimum bounding box area of a ring.
    pub fn min_size(&self) -> f64 {
        self.min_pixels * self.resolution
    }

    pub fn viewport(&self) -> Viewport {
        let vp = &self.viewport;
        Viewport::new(vp.xcover, vp.ycover, vp.xshift, vp.yshift, self.resolution)
    }
}
