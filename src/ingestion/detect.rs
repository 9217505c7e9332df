//! Format detector.
//!
//! Inspects header bytes (and, for embedded databases, vendor table names)
//! to select an adapter. Detection never fails on unknown content: it
//! returns `None`, which the caller may override with an explicit format or
//! a field mapping (delimited text has no self-describing signature, so it
//! is only ever parsed when a mapping is supplied).

use std::io::Read;
use std::path::Path;

use crate::error::ImportResult;
use crate::ingestion::db;
use crate::ingestion::dl7::DL7_MAGIC;

/// Every adapter the engine can dispatch to.
///
/// The detector only ever produces the self-describing subset; `Seabear`,
/// `ManualCsv` and `ProfileCsv` exist as caller-asserted hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// Compressed multi-member container (DLD); members are re-detected.
    Container,
    /// Native divelog XML.
    Native,
    /// Suunto DiveManager 4 SQLite store.
    Dm4,
    /// Suunto DiveManager 5 SQLite store.
    Dm5,
    /// DivingLog 5.x SQLite store.
    DivingLog,
    /// DAN DL7 transfer file.
    Dl7,
    /// Seabear logger CSV (header-autodetected).
    Seabear,
    /// Generic delimited text, one row per dive.
    ManualCsv,
    /// Generic delimited text, one row per sample.
    ProfileCsv,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

fn looks_like_native_xml(data: &[u8]) -> bool {
    let text = String::from_utf8_lossy(&data[..data.len().min(512)]);
    // The root signature may follow an XML declaration and whitespace.
    text.contains("<divelog")
}

/// Classify an in-memory buffer by signature alone.
///
/// SQLite stores cannot be disambiguated from a buffer (vendor table names
/// require opening the store), so they come back as `None` here; use
/// [`detect_path`] for files.
pub fn detect_buffer(data: &[u8]) -> Option<ImportFormat> {
    if data.starts_with(ZIP_MAGIC) {
        Some(ImportFormat::Container)
    } else if data.starts_with(DL7_MAGIC) {
        Some(ImportFormat::Dl7)
    } else if looks_like_native_xml(data) {
        Some(ImportFormat::Native)
    } else {
        None
    }
}

/// Classify a file, opening embedded databases to disambiguate vendors by
/// their table names. Unknown content is `Ok(None)`, never an error.
pub fn detect_path(path: impl AsRef<Path>) -> ImportResult<Option<ImportFormat>> {
    let path = path.as_ref();
    let mut header = [0u8; 512];
    let n = {
        let mut file = std::fs::File::open(path)?;
        read_up_to(&mut file, &mut header)?
    };
    let header = &header[..n];

    if header.starts_with(SQLITE_MAGIC) {
        return Ok(detect_db_flavor(path));
    }
    Ok(detect_buffer(header))
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        let read = reader.read(&mut buf[n..])?;
        if read == 0 {
            break;
        }
        n += read;
    }
    Ok(n)
}

/// Tell the supported vendor schemas apart by which tables exist. DM4 and
/// DM5 share a `Dive` table; only DM5 has the `DiveSamples` relation.
/// Anything that cannot be confirmed stays unrecognized.
fn detect_db_flavor(path: &Path) -> Option<ImportFormat> {
    let conn = db::open_store(path).ok()?;
    let has = |table: &str| db::table_exists(&conn, table).unwrap_or(false);
    if has("Dive") {
        if has("DiveSamples") {
            Some(ImportFormat::Dm5)
        } else {
            Some(ImportFormat::Dm4)
        }
    } else if has("Logbook") {
        Some(ImportFormat::DivingLog)
    } else {
        None
    }
}
