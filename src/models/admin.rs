//! Administrative level records as stored in the index metadata.

use serde::Serialize;

/// Number of tab-delimited metadata fields leading every intermediate record.
pub const RECORD_FIELDS: usize = 7;

/// OSM admin_level mapping to semantic level names.
/// See: https://wiki.openstreetmap.org/wiki/Tag:boundary%3Dadministrative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    /// Country (admin_level=2)
    Country,
    /// Macro region / federal district (admin_level=3)
    MacroRegion,
    /// Region / state / province (admin_level=4)
    Region,
    /// Macro county (admin_level=5)
    MacroCounty,
    /// County / district (admin_level=6)
    County,
    /// Local admin / municipality (admin_level=7)
    LocalAdmin,
    /// Locality / city / town / village (admin_level=8)
    Locality,
    /// Borough / city district (admin_level=9)
    Borough,
    /// Neighbourhood / suburb (admin_level=10 and 11)
    Neighbourhood,
}

impl AdminLevel {
    /// Convert OSM admin_level number to AdminLevel
    pub fn from_osm_level(level: u8) -> Option<Self> {
        match level {
            2 => Some(AdminLevel::Country),
            3 => Some(AdminLevel::MacroRegion),
            4 => Some(AdminLevel::Region),
            5 => Some(AdminLevel::MacroCounty),
            6 => Some(AdminLevel::County),
            7 => Some(AdminLevel::LocalAdmin),
            8 => Some(AdminLevel::Locality),
            9 => Some(AdminLevel::Borough),
            10 | 11 => Some(AdminLevel::Neighbourhood),
            _ => None,
        }
    }
}

/// One decoded level of a metadata chain.
///
/// Field order matches the intermediate record format:
/// `name, international_name, place_type, wikipedia, wikidata, source_id, admin_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminRecord {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub international_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub place_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub wikipedia: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub wikidata: String,
    pub source_id: String,
    pub admin_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<AdminLevel>,
}

impl AdminRecord {
    /// Parse a single level-record (tab-delimited, without its NUL terminator).
    ///
    /// Returns `None` if the field count or the admin level is malformed.
    pub fn parse(record: &str) -> Option<Self> {
        let fields: Vec<&str> = record.split('\t').collect();
        if fields.len() != RECORD_FIELDS {
            return None;
        }
        let admin_level: u8 = fields[6].trim().parse().ok()?;
        Some(Self {
            name: fields[0].to_string(),
            international_name: fields[1].to_string(),
            place_type: fields[2].to_string(),
            wikipedia: fields[3].to_string(),
            wikidata: fields[4].to_string(),
            source_id: fields[5].to_string(),
            admin_level,
            kind: AdminLevel::from_osm_level(admin_level),
        })
    }

    /// Parse a whole chain, skipping records that are not well-formed.
    pub fn parse_chain<S: AsRef<str>>(chain: &[S]) -> Vec<Self> {
        chain
            .iter()
            .filter_map(|r| Self::parse(r.as_ref()))
            .collect()
    }
}
