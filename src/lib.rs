//! Regiongrid - reverse geocoding from a precomputed region raster
//!
//! This library provides the index builder and the query engine shared by the
//! build and query binaries.

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod geocoder;
pub mod ingest;
pub mod models;
pub mod raster;
pub mod viewport;

pub use builder::{CompiledIndex, IndexBuilder};
pub use config::BuildConfig;
pub use error::GridError;
pub use geocoder::ReverseGeocoder;
pub use models::{AdminLevel, AdminRecord, BoundingBox, Entity};
