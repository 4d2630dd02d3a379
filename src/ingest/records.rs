//! Reader for the intermediate polygon record format.
//!
//! One line per polygon ring, tab separated:
//! `name, international_name, place_type, wikipedia, wikidata, source_id,
//! admin_level, lon,lat, lon,lat, ...`
//! Files are usually gzip compressed.

use anyhow::{Context, Result};
use csv::{ByteRecord, ByteRecordsIntoIter, ReaderBuilder};
use flate2::read::GzDecoder;
use geo_types::{Coord, LineString};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::models::{ring_bbox, BoundingBox, Ring, RECORD_FIELDS};

/// One parsed ring with the metadata key it belongs to.
#[derive(Debug, Clone)]
pub struct PolygonRecord {
    /// The leading metadata fields, tab joined.
    pub key: String,
    pub level: u8,
    pub ring: Ring,
    pub bbox: BoundingBox,
}

/// Result of parsing a single line.
#[derive(Debug, Clone)]
pub enum ParsedLine {
    Polygon(PolygonRecord),
    /// The line was skipped; carries the reason.
    Malformed(&'static str),
}

/// Streaming reader over an intermediate record file.
///
/// Fields are decoded as lossy UTF-8, so stray bytes in a name never
/// abort a build.
pub struct RecordReader<R: Read> {
    records: ByteRecordsIntoIter<R>,
}

impl RecordReader<Box<dyn Read>> {
    /// Open a record file, transparently decompressing `.gz` input.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open record file {}", path.display()))?;
        let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
            Box::new(GzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        let records = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .from_reader(reader)
            .into_byte_records();
        Self { records }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<ParsedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            record
                .context("Failed to read intermediate record")
                .map(|r| parse_record(&r)),
        )
    }
}

fn parse_record(record: &ByteRecord) -> ParsedLine {
    let decoded: Vec<Cow<str>> = record.iter().map(String::from_utf8_lossy).collect();
    let fields: Vec<&str> = decoded.iter().map(|f| f.as_ref()).collect();
    parse_fields(&fields)
}

/// Parse the tab-split fields of one line.
pub fn parse_fields(fields: &[&str]) -> ParsedLine {
    if fields.len() < RECORD_FIELDS {
        return ParsedLine::Malformed("too few fields");
    }
    let level: u8 = match fields[RECORD_FIELDS - 1].trim().parse() {
        Ok(l) => l,
        Err(_) => return ParsedLine::Malformed("no admin level"),
    };

    let mut coords = Vec::with_capacity(fields.len() - RECORD_FIELDS);
    for field in &fields[RECORD_FIELDS..] {
        match parse_coord(field) {
            Some(c) => coords.push(c),
            None => return ParsedLine::Malformed("bad coordinate"),
        }
    }
    if coords.is_empty() {
        return ParsedLine::Malformed("empty polygon");
    }

    let bbox = ring_bbox(&coords);
    ParsedLine::Polygon(PolygonRecord {
        key: fields[..RECORD_FIELDS].join("\t"),
        level,
        ring: LineString::new(coords),
        bbox,
    })
}

fn parse_coord(field: &str) -> Option<Coord<f32>> {
    let (lon, lat) = field.split_once(',')?;
    let x: f32 = lon.trim().parse().ok()?;
    let y: f32 = lat.trim().parse().ok()?;
    if !(x.is_finite() && y.is_finite()) {
        return None;
    }
    Some(Coord { x, y })
}
