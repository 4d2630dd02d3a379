//! Index construction: rasterize every level slice by slice, infer the
//! hierarchy, and assemble the container contents.

use anyhow::{bail, Context, Result};
use hashbrown::HashMap;
use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::codec::{encode_row, recode_row, write_container, Header, Runs};
use crate::config::BuildConfig;
use crate::error::GridError;
use crate::ingest::EntityCatalog;
use crate::raster::{
    order_level, render_level, LevelGrid, OwnerGrid, ParentVotes, Rasterizer, RenderEntity,
};
use crate::viewport::Viewport;

/// Everything needed to write a container, in final code order.
#[derive(Debug)]
pub struct CompiledIndex {
    pub header: Header,
    pub rows: Vec<Vec<u8>>,
    /// Metadata blob per code; index 0 is the empty background blob.
    pub metadata: Vec<Vec<u8>>,
}

impl CompiledIndex {
    pub fn entry_count(&self) -> usize {
        self.metadata.len()
    }

    /// Serialize into memory.
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, GridError> {
        let mut buf = Vec::new();
        write_container(&mut buf, &self.header, &self.rows, &self.metadata)?;
        Ok(buf)
    }

    /// Write the container to `path`, replacing it atomically.
    pub fn write(&self, path: &Path) -> Result<usize> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

        let written = write_container(
            BufWriter::new(tmp.as_file_mut()),
            &self.header,
            &self.rows,
            &self.metadata,
        )
        .with_context(|| format!("Failed to write index to {}", path.display()))?;
        tmp.as_file()
            .sync_all()
            .context("Failed to sync index file")?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move index into place at {}", path.display()))?;

        info!("Wrote {} bytes to {}", written, path.display());
        Ok(written)
    }
}

/// Builds a [`CompiledIndex`] from an entity catalog.
pub struct IndexBuilder {
    viewport: Viewport,
    slice_height: usize,
}

impl IndexBuilder {
    pub fn new(config: &BuildConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            viewport: config.viewport(),
            slice_height: config.slice_height,
        })
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn build(&self, catalog: EntityCatalog) -> Result<CompiledIndex> {
        if catalog.is_empty() {
            bail!("No entities survived filtering, refusing to build an empty index");
        }
        info!("Building index for {}", self.viewport);

        // Dense ids, ascending by level, largest first within a level.
        // `keys[id]` is the metadata record of entity `id`; 0 is the background.
        let mut keys: Vec<String> = vec![String::new()];
        let mut levels: Vec<(u8, Vec<RenderEntity>)> = Vec::new();
        for (level, mut entities) in catalog.into_levels() {
            order_level(&mut entities);
            let mut ordered = Vec::with_capacity(entities.len());
            for entity in entities {
                let id = u32::try_from(keys.len()).context("Too many entities")?;
                keys.push(entity.key.clone());
                ordered.push(RenderEntity { id, entity });
            }
            levels.push((level, ordered));
        }

        let (rows, votes) = self.render_slices(&levels);
        drop(levels);

        let chains = resolve_chains(&keys, &votes);
        let (codes, used) = renumber(&rows, keys.len());
        info!("{} of {} entities own pixels in the final raster", used.len(), keys.len() - 1);

        let mut recoded = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut out = Vec::with_capacity(row.len());
            recode_row(row, |id| codes[id as usize], &mut out)?;
            recoded.push(out);
        }

        let mut metadata = Vec::with_capacity(used.len() + 1);
        metadata.push(Vec::new());
        metadata.extend(used.iter().map(|&id| chains[id as usize].clone().into_bytes()));

        let numentries = u32::try_from(metadata.len()).context("Too many entries")?;
        let header = Header::for_viewport(&self.viewport, numentries);
        let row_bytes: usize = recoded.iter().map(Vec::len).sum();
        let meta_bytes: usize = metadata.iter().map(Vec::len).sum();
        info!(
            "Compressed {} rows to {} bytes, {} bytes of metadata for {} entries",
            recoded.len(),
            row_bytes,
            meta_bytes,
            numentries
        );

        Ok(CompiledIndex {
            header,
            rows: recoded,
            metadata,
        })
    }

    /// Render, flatten and compress one horizontal band at a time.
    ///
    /// Rows are encoded with build ids.
    fn render_slices(&self, levels: &[(u8, Vec<RenderEntity>)]) -> (Vec<Vec<u8>>, ParentVotes) {
        let vp = &self.viewport;
        let band = self.slice_height.min(vp.height).max(1);

        let mut rasterizer = Rasterizer::new();
        let mut scratch = LevelGrid::new(vp.width, band);
        let mut cumulative = OwnerGrid::new(vp.width, band);
        let mut votes = ParentVotes::new();
        let mut rows = Vec::with_capacity(vp.height);
        let mut compressed = 0;

        for y0 in (0..vp.height).step_by(band) {
            let slice = vp.slice(0, y0, vp.width, band);
            let start = Instant::now();
            cumulative.clear(slice.height);

            for (level, entities) in levels {
                let level_start = Instant::now();
                scratch.clear(slice.height);
                let drawn = render_level(&mut rasterizer, &slice, entities, &mut scratch);
                let claimed = votes.flatten(&scratch, &mut cumulative);
                debug!(
                    "  rows {}: level {} drew {} of {} entities, {} pixels in {:?}",
                    y0,
                    level,
                    drawn,
                    entities.len(),
                    claimed,
                    level_start.elapsed()
                );
            }

            let before = compressed;
            for y in 0..slice.height {
                let mut out = Vec::new();
                encode_row(cumulative.row(y), &mut out);
                compressed += out.len();
                rows.push(out);
            }
            info!(
                "Rows {}-{} of {}: {} bytes compressed in {:?}",
                y0,
                y0 + slice.height,
                vp.height,
                compressed - before,
                start.elapsed()
            );
        }
        (rows, votes)
    }
}

/// Metadata chain per build id: the entity's own record followed by its
/// parent's chain, each record NUL terminated.
///
/// Parents always come from coarser levels and thus carry lower ids, so a
/// single ascending pass sees every parent chain before it is needed.
fn resolve_chains(keys: &[String], votes: &ParentVotes) -> Vec<String> {
    let mut chains: Vec<String> = Vec::with_capacity(keys.len());
    chains.push(String::new());
    for (id, key) in keys.iter().enumerate().skip(1) {
        let parent = votes.parent_of(id as u32) as usize;
        let mut chain = String::with_capacity(key.len() + 1);
        chain.push_str(key);
        chain.push('\0');
        if parent != 0 && parent < id {
            chain.push_str(&chains[parent]);
        }
        chains.push(chain);
    }
    chains
}

/// Assign final codes by descending pixel count, ties by build id.
///
/// Returns the build id to code map and the build ids in code order,
/// excluding the background. Entities without pixels map to 0.
fn renumber(rows: &[Vec<u8>], ids: usize) -> (Vec<u32>, Vec<u32>) {
    let mut counts: HashMap<u32, u64> = HashMap::new();
    for row in rows {
        // Rows were produced by `encode_row` and are well formed.
        for (id, len) in Runs::new(row, 0, row.len()).flatten() {
            if id != 0 {
                *counts.entry(id).or_insert(0) += len as u64;
            }
        }
    }

    let mut used: Vec<(u32, u64)> = counts.into_iter().collect();
    used.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut codes = vec![0u32; ids];
    for (code, (id, _)) in used.iter().enumerate() {
        codes[*id as usize] = code as u32 + 1;
    }
    (codes, used.into_iter().map(|(id, _)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_row, Container};
    use crate::ingest::{parse_fields, ParsedLine};

    fn config() -> BuildConfig {
        BuildConfig {
            resolution: 0.5,
            viewport: crate::config::ViewportConfig {
                xcover: 40.0,
                ycover: 40.0,
                xshift: 20.0,
                yshift: 20.0,
            },
            min_pixels: 1.0,
            slice_height: 7,
            ..Default::default()
        }
    }

    fn catalog(lines: &[&str]) -> EntityCatalog {
        let mut catalog = EntityCatalog::new(&config());
        for line in lines {
            let fields: Vec<&str> = line.split('\t').collect();
            match parse_fields(&fields) {
                ParsedLine::Polygon(r) => assert!(catalog.insert(r)),
                other => panic!("unexpected {:?}", other),
            }
        }
        catalog
    }

    const COUNTRY: &str = "Land\tLand\tcountry\t\tQ1\tr1\t2\t-10,-10\t10,-10\t10,10\t-10,10";
    const STATE: &str = "North\tNorth\tstate\t\t\tr2\t4\t-5,0\t5,0\t5,5\t-5,5";

    #[test]
    fn test_empty_catalog_fails() {
        let builder = IndexBuilder::new(&config()).unwrap();
        assert!(builder.build(EntityCatalog::new(&config())).is_err());
    }

    #[test]
    fn test_chains_and_codes() {
        let builder = IndexBuilder::new(&config()).unwrap();
        let index = builder.build(catalog(&[STATE, COUNTRY])).unwrap();

        // The country keeps more pixels than the state, so it gets code 1.
        assert_eq!(index.entry_count(), 3);
        assert!(index.metadata[0].is_empty());
        assert_eq!(index.metadata[1], b"Land\tLand\tcountry\t\tQ1\tr1\t2\0".to_vec());
        assert_eq!(
            index.metadata[2],
            b"North\tNorth\tstate\t\t\tr2\t4\0Land\tLand\tcountry\t\tQ1\tr1\t2\0".to_vec()
        );

        let vp = builder.viewport();
        let width = vp.width;
        for (y, row) in index.rows.iter().enumerate() {
            let codes = decode_row(row, width).unwrap();
            assert_eq!(codes.len(), width);
            let lat = vp.unproject_lat(y) as f32;
            for (x, code) in codes.into_iter().enumerate() {
                let lon = vp.unproject_lon(x) as f32;
                if lon.abs() < 4.0 && lat > 1.0 && lat < 4.0 {
                    assert_eq!(code, 2, "({}, {})", lon, lat);
                } else if lon.abs() < 9.0 && lat.abs() < 9.0 && !(lat > -1.0 && lat < 6.0) {
                    assert_eq!(code, 1, "({}, {})", lon, lat);
                } else if lon.abs() > 11.0 || lat.abs() > 11.0 {
                    assert_eq!(code, 0, "({}, {})", lon, lat);
                }
            }
        }
    }

    #[test]
    fn test_slicing_does_not_change_output() {
        let lines = [STATE, COUNTRY];
        let sliced = IndexBuilder::new(&config())
            .unwrap()
            .build(catalog(&lines))
            .unwrap();
        let whole_config = BuildConfig {
            slice_height: 1000,
            ..config()
        };
        let whole = IndexBuilder::new(&whole_config)
            .unwrap()
            .build(catalog(&lines))
            .unwrap();
        assert_eq!(sliced.to_bytes().unwrap(), whole.to_bytes().unwrap());
    }

    #[test]
    fn test_hidden_entity_is_dropped() {
        // Same geometry at the same level; one of them is never visible.
        let a = "A\t\t\t\t\tr1\t4\t-5,-5\t5,-5\t5,5\t-5,5";
        let b = "B\t\t\t\t\tr2\t4\t-5,-5\t5,-5\t5,5\t-5,5";
        let index = IndexBuilder::new(&config())
            .unwrap()
            .build(catalog(&[a, b]))
            .unwrap();
        // Every pixel is fully covered by both; the later one wins at the ceiling.
        assert_eq!(index.entry_count(), 2);
        assert!(index.metadata[1].starts_with(b"B\t"));
    }

    #[test]
    fn test_write_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("grid.bin");
        let index = IndexBuilder::new(&config())
            .unwrap()
            .build(catalog(&[COUNTRY]))
            .unwrap();
        let written = index.write(&path).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), written);
        let container = Container::new(bytes).unwrap();
        assert_eq!(container.header().numentries, 2);
        // Only the index itself is left in the directory.
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
