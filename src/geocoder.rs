//! Point lookups against a compiled index.
//!
//! A [`ReverseGeocoder`] owns a decode cache and is meant for one thread at a
//! time. The mapped file itself is immutable and shared; use
//! [`ReverseGeocoder::reader`] to get another reader over the same bytes.

use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::codec::{code_at, Container, Header};
use crate::error::{GridError, Result};
use crate::models::AdminRecord;
use crate::viewport::Viewport;

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

/// Reference-counted, read-only index bytes.
#[derive(Clone)]
pub struct SharedBytes(Arc<Backing>);

impl Deref for SharedBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &*self.0 {
            Backing::Mapped(m) => &m[..],
            Backing::Owned(v) => v.as_slice(),
        }
    }
}

/// Decoded metadata chain: one record per level, finest first.
pub type Chain = Arc<[String]>;

pub struct ReverseGeocoder {
    index: Container<SharedBytes>,
    viewport: Viewport,
    cache: Vec<Option<Chain>>,
}

impl ReverseGeocoder {
    /// Map an index file and validate its structure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // The index is written once and never modified in place.
        let map = unsafe { Mmap::map(&file)? };
        let geocoder = Self::from_bytes(SharedBytes(Arc::new(Backing::Mapped(map))))?;
        info!(
            "Opened {} ({} entries, {}x{} pixels)",
            path.display(),
            geocoder.entry_count(),
            geocoder.viewport.width,
            geocoder.viewport.height
        );
        Ok(geocoder)
    }

    /// Use an index already held in memory.
    pub fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes(SharedBytes(Arc::new(Backing::Owned(bytes))))
    }

    fn from_bytes(bytes: SharedBytes) -> Result<Self> {
        Ok(Self::from_container(Container::new(bytes)?))
    }

    fn from_container(index: Container<SharedBytes>) -> Self {
        let header = *index.header();
        Self {
            viewport: header.viewport(),
            cache: vec![None; header.numentries as usize],
            index,
        }
    }

    /// Another reader over the same bytes, with an empty cache of its own.
    pub fn reader(&self) -> Self {
        Self::from_container(self.index.clone())
    }

    pub fn header(&self) -> &Header {
        self.index.header()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Number of entity codes, including the background.
    pub fn entry_count(&self) -> usize {
        self.index.header().numentries as usize
    }

    /// Entity code at a coordinate; 0 outside the raster.
    pub fn lookup_code(&self, lon: f32, lat: f32) -> Result<u32> {
        let Some((x, y)) = self.viewport.pixel(lon, lat) else {
            return Ok(0);
        };
        let (start, end) = self.index.row_range(y)?;
        code_at(self.index.bytes(), start, end, x, y)
    }

    /// Metadata chain of an entity code; empty for unknown codes.
    pub fn lookup_metadata(&mut self, code: u32) -> Result<Chain> {
        let i = code as usize;
        let Some(slot) = self.cache.get(i) else {
            return Ok(Arc::from(Vec::new()));
        };
        if let Some(chain) = slot {
            return Ok(Arc::clone(chain));
        }

        let blob = self.index.metadata(i)?;
        let text = std::str::from_utf8(blob).map_err(|_| GridError::InvalidUtf8 { code: i })?;
        let chain: Chain = text.split_terminator('\0').map(str::to_owned).collect();
        debug!("Decoded {} records for code {}", chain.len(), code);
        self.cache[i] = Some(Arc::clone(&chain));
        Ok(chain)
    }

    /// Records of every region containing a coordinate, finest first.
    pub fn lookup(&mut self, lon: f32, lat: f32) -> Result<Chain> {
        let code = self.lookup_code(lon, lat)?;
        self.lookup_metadata(code)
    }

    /// Like [`lookup`](Self::lookup), with each record split into its fields.
    pub fn lookup_records(&mut self, lon: f32, lat: f32) -> Result<Vec<AdminRecord>> {
        let chain = self.lookup(lon, lat)?;
        Ok(AdminRecord::parse_chain(&chain[..]))
    }

    /// Release the mapping, once no other reader shares it.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_row, write_container};

    const PARK: &str = "Park\t\tpark\t\t\tr9\t8";
    const TOWN: &str = "Town\tTown\tcity\t\tQ5\tr3\t6";

    fn index_bytes() -> Vec<u8> {
        let vp = Viewport::new(4.0, 2.0, 0.0, 0.0, 1.0);
        let rows: Vec<Vec<u8>> = [[0u32, 1, 1, 2], [2, 2, 2, 2]]
            .iter()
            .map(|r| {
                let mut out = Vec::new();
                encode_row(r, &mut out);
                out
            })
            .collect();
        let metadata = vec![
            Vec::new(),
            format!("{}\0", TOWN).into_bytes(),
            // Final record without terminator.
            format!("{}\0{}", PARK, TOWN).into_bytes(),
        ];
        let mut buf = Vec::new();
        write_container(&mut buf, &Header::for_viewport(&vp, 3), &rows, &metadata).unwrap();
        buf
    }

    #[test]
    fn test_lookup_code() {
        let geocoder = ReverseGeocoder::from_vec(index_bytes()).unwrap();
        assert_eq!(geocoder.entry_count(), 3);
        assert_eq!(geocoder.lookup_code(0.5, 0.5).unwrap(), 0);
        assert_eq!(geocoder.lookup_code(1.5, 0.5).unwrap(), 1);
        assert_eq!(geocoder.lookup_code(3.99, 0.0).unwrap(), 2);
        assert_eq!(geocoder.lookup_code(0.0, 1.5).unwrap(), 2);
    }

    #[test]
    fn test_out_of_bounds_is_background() {
        let mut geocoder = ReverseGeocoder::from_vec(index_bytes()).unwrap();
        assert_eq!(geocoder.lookup_code(-0.5, 0.5).unwrap(), 0);
        assert_eq!(geocoder.lookup_code(4.0, 0.5).unwrap(), 0);
        assert_eq!(geocoder.lookup_code(1.0, 2.0).unwrap(), 0);
        assert_eq!(geocoder.lookup_code(f32::NAN, 0.5).unwrap(), 0);
        assert!(geocoder.lookup(100.0, 100.0).unwrap().is_empty());
    }

    #[test]
    fn test_metadata_chain() {
        let mut geocoder = ReverseGeocoder::from_vec(index_bytes()).unwrap();
        assert_eq!(&*geocoder.lookup(1.5, 0.5).unwrap(), &[TOWN.to_string()]);
        assert_eq!(
            &*geocoder.lookup(2.5, 1.5).unwrap(),
            &[PARK.to_string(), TOWN.to_string()]
        );
        assert!(geocoder.lookup_metadata(0).unwrap().is_empty());
        assert!(geocoder.lookup_metadata(3).unwrap().is_empty());
        assert!(geocoder.lookup_metadata(u32::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_cache_is_shared_per_reader() {
        let mut geocoder = ReverseGeocoder::from_vec(index_bytes()).unwrap();
        let first = geocoder.lookup_metadata(2).unwrap();
        let second = geocoder.lookup_metadata(2).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let mut other = geocoder.reader();
        let third = other.lookup_metadata(2).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(first, third);
    }

    #[test]
    fn test_records() {
        let mut geocoder = ReverseGeocoder::from_vec(index_bytes()).unwrap();
        let records = geocoder.lookup_records(2.5, 1.5).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Park");
        assert_eq!(records[0].admin_level, 8);
        assert_eq!(records[1].wikidata, "Q5");
    }

    #[test]
    fn test_invalid_utf8() {
        let mut bytes = index_bytes();
        let len = bytes.len();
        bytes[len - 1] = 0xFF;
        let mut geocoder = ReverseGeocoder::from_vec(bytes).unwrap();
        assert!(matches!(
            geocoder.lookup_metadata(2),
            Err(GridError::InvalidUtf8 { code: 2 })
        ));
    }

    #[test]
    fn test_corrupt_row_is_an_error() {
        let mut bytes = index_bytes();
        let header = Header::parse(&bytes).unwrap();
        // The first row blob starts right after the tables and is 6 bytes long.
        let start = header.data_start();
        bytes[start..start + 6].fill(0x80);
        let geocoder = ReverseGeocoder::from_vec(bytes).unwrap();
        assert!(geocoder.lookup_code(0.5, 0.5).is_err());
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.bin");
        std::fs::write(&path, index_bytes()).unwrap();
        let mut geocoder = ReverseGeocoder::open(&path).unwrap();
        assert_eq!(geocoder.header().width, 4);
        assert_eq!(geocoder.lookup(1.5, 0.5).unwrap().len(), 1);
        geocoder.close();
        assert!(ReverseGeocoder::open(dir.path().join("missing.bin")).is_err());
    }
}
