//! Entity catalog: merges ring records into entities, partitioned by level.

use anyhow::Result;
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::records::{ParsedLine, PolygonRecord, RecordReader};
use crate::config::BuildConfig;
use crate::models::Entity;

/// Counters collected while loading records.
#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogStats {
    pub lines: usize,
    pub polygons: usize,
    pub malformed: usize,
    pub outside_levels: usize,
    pub degenerate: usize,
    pub too_small: usize,
}

/// Entities keyed by metadata, one collection per admin level.
pub struct EntityCatalog {
    min_level: u8,
    max_level: u8,
    min_size: f64,
    levels: BTreeMap<u8, HashMap<String, Entity>>,
    stats: CatalogStats,
}

impl EntityCatalog {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            min_level: config.min_level,
            max_level: config.max_level,
            min_size: config.min_size(),
            levels: BTreeMap::new(),
            stats: CatalogStats::default(),
        }
    }

    /// Load a whole record file.
    pub fn load(path: &Path, config: &BuildConfig) -> Result<Self> {
        info!("Reading polygons from {}", path.display());
        let mut catalog = Self::new(config);
        for line in RecordReader::open(path)? {
            catalog.add_line(line?);
        }
        catalog.log_summary();
        Ok(catalog)
    }

    /// Account for one parsed line.
    pub fn add_line(&mut self, line: ParsedLine) -> bool {
        self.stats.lines += 1;
        match line {
            ParsedLine::Polygon(record) => self.insert(record),
            ParsedLine::Malformed(reason) => {
                warn!("Skipping line {}: {}", self.stats.lines, reason);
                self.stats.malformed += 1;
                false
            }
        }
    }

    /// Insert a ring, merging it into an existing entity with the same key.
    ///
    /// Returns `false` if the ring was dropped.
    pub fn insert(&mut self, record: PolygonRecord) -> bool {
        if record.level < self.min_level || record.level > self.max_level {
            self.stats.outside_levels += 1;
            return false;
        }
        if record.ring.0.len() < 3 || record.bbox.area() <= 0.0 {
            debug!("Dropping degenerate ring of {}", record.key);
            self.stats.degenerate += 1;
            return false;
        }
        if record.bbox.area() < self.min_size {
            self.stats.too_small += 1;
            return false;
        }

        self.stats.polygons += 1;
        let level = self.levels.entry(record.level).or_default();
        match level.get_mut(&record.key) {
            Some(entity) => entity.merge_ring(record.ring, &record.bbox),
            None => {
                let entity =
                    Entity::new(record.key.clone(), record.level, record.ring, record.bbox);
                level.insert(record.key, entity);
            }
        }
        true
    }

    pub fn stats(&self) -> CatalogStats {
        self.stats
    }

    pub fn entity_count(&self) -> usize {
        self.levels.values().map(|l| l.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    pub fn log_summary(&self) {
        let s = &self.stats;
        info!(
            "Read {} lines, kept {} entities, {} polygons",
            s.lines,
            self.entity_count(),
            s.polygons
        );
        info!(
            "Skipped {} malformed, {} outside levels {}-{}, {} degenerate, {} too small",
            s.malformed, s.outside_levels, self.min_level, self.max_level, s.degenerate, s.too_small
        );
        for (level, entities) in &self.levels {
            let points: usize = entities.values().map(Entity::point_count).sum();
            info!("  level {}: {} entities, {} points", level, entities.len(), points);
        }
    }

    /// Consume the catalog, yielding each level's entities in ascending level order.
    pub fn into_levels(self) -> Vec<(u8, Vec<Entity>)> {
        self.levels
            .into_iter()
            .map(|(level, entities)| (level, entities.into_values().collect()))
            .collect()
    }
}
