//! Compressed multi-file container extractor (divelogs.de DLD).
//!
//! A DLD file is a ZIP archive whose members are themselves importable
//! payloads (typically one native-format document per dive, with the DC
//! nickname the service attaches). The extractor walks members in archive
//! order, re-runs signature detection on each payload, and dispatches the
//! recognized ones; unrecognized members are skipped, not errors.
//!
//! The whole archive is staged into a private session first and committed
//! only if every recognized member parses, so a corrupt member never leaves
//! a half-imported container behind.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::error::{ImportError, ImportResult};
use crate::ingestion::detect::{detect_buffer, ImportFormat};
use crate::ingestion::dl7;
use crate::model::DiveLog;
use crate::native;

/// Extract and import every recognized member of a container buffer.
/// Returns the number of dives added to the session.
pub fn parse_container(data: &[u8], log: &mut DiveLog) -> ImportResult<usize> {
    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| ImportError::StoreUnreadable {
            message: format!("not a valid container: {e}"),
        })?;

    let mut staged = DiveLog::new();
    let mut added = 0usize;
    for index in 0..archive.len() {
        let mut member = archive.by_index(index)?;
        if member.is_dir() {
            continue;
        }
        // The claimed uncompressed size is untrusted archive metadata;
        // bound the pre-allocation and let the read grow the rest.
        let mut payload = Vec::with_capacity(member.size().min(64 * 1024) as usize);
        member.read_to_end(&mut payload)?;
        added += import_member(&payload, &mut staged)?;
    }

    log.absorb(staged);
    Ok(added)
}

fn import_member(payload: &[u8], staged: &mut DiveLog) -> ImportResult<usize> {
    match detect_buffer(payload) {
        Some(ImportFormat::Native) => {
            let text = String::from_utf8_lossy(payload);
            native::parse_native_into(&text, staged)
        }
        Some(ImportFormat::Dl7) => dl7::parse_dl7(payload, &dl7::default_mapping(), staged),
        // Nested containers and anything unrecognized are skipped; member
        // payloads carry no schema assertion a caller could override.
        _ => Ok(0),
    }
}
