//! Loading of intermediate polygon records into per-level entity catalogs.

mod catalog;
mod records;

pub use catalog::{CatalogStats, EntityCatalog};
pub use records::{parse_fields, ParsedLine, PolygonRecord, RecordReader};
