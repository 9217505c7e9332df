//! Embedded-database adapters, one per vendor schema.
//!
//! Three proprietary SQLite schemas are supported: Suunto DiveManager 4
//! ([`dm4`]), Suunto DiveManager 5 ([`dm5`]) and DivingLog 5.x
//! ([`divinglog`]). Each adapter runs a fixed set of schema-specific queries,
//! normalizes rows through the model builder, and appends to the session.
//!
//! Shared contract:
//!
//! - the required-table check runs first; a missing table is a
//!   [`ImportError::SchemaMismatch`], distinct from an unreadable store, so
//!   the detector can try a different vendor adapter on ambiguity;
//! - dives are staged and committed only after the scan succeeds, so a
//!   file-level failure leaves the destination table untouched;
//! - row-level malformed data degrades individual fields to absent;
//! - an optional cancel flag is checked between rows; cancellation commits
//!   whatever has been staged so far and returns normally (callers wanting
//!   atomicity import into a private session and merge on success).

pub mod divinglog;
pub mod dm4;
pub mod dm5;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::{Connection, OpenFlags};

use crate::error::{ImportError, ImportResult};

/// Optional device filter / progress sink / cancel flag triple accepted by
/// every database adapter. Absence means no filtering and no reporting.
#[derive(Default)]
pub struct DbImportOptions<'a> {
    /// Only import dives whose device label contains this string.
    pub device_filter: Option<&'a str>,
    /// Called with the number of rows processed so far.
    pub progress: Option<&'a dyn Fn(usize)>,
    /// Checked between rows; set to abort a long-running scan.
    pub cancel: Option<&'a AtomicBool>,
}

impl DbImportOptions<'_> {
    pub(crate) fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }

    pub(crate) fn report(&self, rows: usize) {
        if let Some(progress) = self.progress {
            progress(rows);
        }
    }

    pub(crate) fn device_matches(&self, label: Option<&str>) -> bool {
        match self.device_filter {
            None => true,
            Some(filter) => label.is_some_and(|l| l.contains(filter)),
        }
    }
}

/// Open an embedded store read-only. An unopenable file is
/// [`ImportError::StoreUnreadable`], never a partial import.
pub fn open_store(path: impl AsRef<Path>) -> ImportResult<Connection> {
    let path = path.as_ref();
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|e| {
        ImportError::StoreUnreadable {
            message: format!("{}: {e}", path.display()),
        }
    })
}

/// Verify the vendor schema's required tables before touching any rows.
pub(crate) fn require_tables(conn: &Connection, tables: &[&str]) -> ImportResult<()> {
    for table in tables {
        if !table_exists(conn, table)? {
            return Err(ImportError::SchemaMismatch {
                message: format!("required table '{table}' is missing"),
            });
        }
    }
    Ok(())
}

/// True when the store contains a table of the given name. An error here
/// means the store itself is unreadable (e.g. not a SQLite file at all).
pub fn table_exists(conn: &Connection, table: &str) -> ImportResult<bool> {
    let mut stmt = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
        .map_err(store_unreadable)?;
    stmt.exists([table]).map_err(store_unreadable)
}

fn store_unreadable(e: rusqlite::Error) -> ImportError {
    ImportError::StoreUnreadable {
        message: e.to_string(),
    }
}

/// Map a prepare failure on a fixed vendor query to a schema mismatch; the
/// table exists but does not have the columns this adapter expects.
pub(crate) fn schema_mismatch(e: rusqlite::Error) -> ImportError {
    ImportError::SchemaMismatch {
        message: e.to_string(),
    }
}
