//! `divelog-ingest` is a library for importing dive-computer and logbook
//! exports into an in-memory [`model::DiveLog`] session, merging overlapping
//! downloads, and persisting the session as a native XML document.
//!
//! The primary entrypoint is [`ingestion::import_from_path`], which
//! auto-detects the format from the file's content signature (or you can
//! force a format via [`ingestion::ImportOptions`]).
//!
//! ## What you can import
//!
//! **Formats (auto-detected by content signature):**
//!
//! - **Native XML**: documents written by [`native::write_native`]
//! - **Suunto DM4 / DM5**: sqlite stores (`.sde` exports), distinguished by
//!   their table layout
//! - **DivingLog**: sqlite logbooks
//! - **DAN DL7**: record-oriented transfer files (`FSH` header)
//! - **Containers**: zip archives whose members are themselves importable
//!
//! **Formats needing an explicit [`ingestion::ImportFormat`]:**
//!
//! - **Delimited text** (manual logs and depth profiles), decoded through a
//!   caller-supplied [`ingestion::FieldMapping`]
//! - **Seabear CSV logs** (self-describing header comments)
//!
//! All quantities are held in integer milli-units (depth in mm, pressure in
//! mbar, temperature in milli-degrees C, gas fractions in permille), so a
//! session survives a save/load cycle bit-exactly.
//!
//! ## Quick example: import and save
//!
//! ```no_run
//! use divelog_ingest::ingestion::{import_from_path, ImportOptions};
//! use divelog_ingest::model::DiveLog;
//! use divelog_ingest::native;
//!
//! # fn main() -> Result<(), divelog_ingest::ImportError> {
//! let mut log = DiveLog::new();
//! import_from_path("trip.sde", &mut log, &ImportOptions::default())?;
//! import_from_path("trip.zxu", &mut log, &ImportOptions::default())?;
//! native::save_native(&log, "divelog.xml")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Merging overlapping downloads
//!
//! Two downloads of the same dive (from different computers, or the same
//! computer fetched twice) collapse into one entry:
//!
//! ```
//! use divelog_ingest::model::DiveLog;
//!
//! let mut session = DiveLog::new();
//! let other = DiveLog::new();
//! session.merge_in(other);
//! ```

pub mod builder;
pub mod error;
pub mod ingestion;
pub mod merge;
pub mod model;
pub mod native;

pub use error::{ImportError, ImportResult};
