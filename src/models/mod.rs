//! Core data models for the region index.

pub mod admin;
pub mod bbox;
pub mod entity;

pub use admin::{AdminLevel, AdminRecord, RECORD_FIELDS};
pub use bbox::BoundingBox;
pub use entity::{ring_bbox, Entity, Ring};
