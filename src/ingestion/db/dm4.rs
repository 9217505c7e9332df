//! Suunto DiveManager 4 adapter.
//!
//! DM4 keeps one `Dive` row per dive with the profile embedded as blobs:
//! depths as consecutive little-endian `f32` metres spaced `SampleInterval`
//! seconds apart, temperatures likewise. There is no sample relation; its
//! presence is what distinguishes DM5 from DM4 in the detector.

use std::path::Path;

use rusqlite::Connection;

use crate::builder;
use crate::error::ImportResult;
use crate::model::{Dive, DiveComputer, DiveLog, Sample};

use super::{require_tables, schema_mismatch, DbImportOptions};

const DIVE_QUERY: &str = "SELECT DiveNumber, StartTime, Duration, MaxDepth, AvgDepth, \
     SampleInterval, Note, Source, SourceSerialNumber, ProfileBlob, TemperatureBlob \
     FROM Dive ORDER BY StartTime";

/// Decode a blob of consecutive little-endian `f32` values. A trailing
/// partial value is ignored rather than treated as an error.
fn decode_f32_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn blob_samples(
    profile: Option<&[u8]>,
    temperature: Option<&[u8]>,
    interval_s: i32,
) -> Vec<Sample> {
    let depths = profile.map(decode_f32_blob).unwrap_or_default();
    let temps = temperature.map(decode_f32_blob).unwrap_or_default();
    depths
        .iter()
        .enumerate()
        .map(|(i, &depth_m)| Sample {
            time_s: i as i32 * interval_s,
            depth_mm: builder::m_to_mm(f64::from(depth_m)).unwrap_or(0),
            temperature_mc: temps.get(i).and_then(|&t| builder::c_to_mc(f64::from(t))),
            ..Default::default()
        })
        .collect()
}

/// Import every dive from an open DM4 store into the session.
pub fn parse_dm4(
    conn: &Connection,
    opts: &DbImportOptions<'_>,
    log: &mut DiveLog,
) -> ImportResult<usize> {
    require_tables(conn, &["Dive"])?;

    let mut stmt = conn.prepare(DIVE_QUERY).map_err(schema_mismatch)?;
    let mut rows = stmt.query([])?;

    let mut staged: Vec<Dive> = Vec::new();
    let mut seen = 0usize;
    while let Some(row) = rows.next()? {
        if opts.cancelled() {
            break;
        }
        seen += 1;
        opts.report(seen);

        let model: Option<String> = row.get(7).ok().flatten();
        if !opts.device_matches(model.as_deref()) {
            continue;
        }

        let when: i64 = row.get::<_, Option<i64>>(1).ok().flatten().unwrap_or(0);
        let interval_s = row
            .get::<_, Option<i64>>(5)
            .ok()
            .flatten()
            .map(|v| v as i32)
            .filter(|&v| v > 0)
            .unwrap_or(1);
        let profile: Option<Vec<u8>> = row.get(9).ok().flatten();
        let temperature: Option<Vec<u8>> = row.get(10).ok().flatten();

        staged.push(Dive {
            number: row
                .get::<_, Option<i64>>(0)
                .ok()
                .flatten()
                .map(|n| n as i32),
            when,
            duration_s: row
                .get::<_, Option<i64>>(2)
                .ok()
                .flatten()
                .map(|v| v as i32)
                .unwrap_or(0),
            max_depth_mm: row
                .get::<_, Option<f64>>(3)
                .ok()
                .flatten()
                .and_then(builder::m_to_mm),
            mean_depth_mm: row
                .get::<_, Option<f64>>(4)
                .ok()
                .flatten()
                .and_then(builder::m_to_mm),
            notes: row.get::<_, Option<String>>(6).ok().flatten(),
            computers: vec![DiveComputer {
                model,
                serial: row.get::<_, Option<String>>(8).ok().flatten(),
                when,
                samples: blob_samples(
                    profile.as_deref(),
                    temperature.as_deref(),
                    interval_s,
                ),
                ..Default::default()
            }],
            ..Default::default()
        });
    }

    let added = staged.len();
    for dive in staged {
        log.table.push(dive);
    }
    Ok(added)
}

/// Open a DM4 store at `path` and import it.
pub fn parse_dm4_file(
    path: impl AsRef<Path>,
    opts: &DbImportOptions<'_>,
    log: &mut DiveLog,
) -> ImportResult<usize> {
    let conn = super::open_store(path)?;
    parse_dm4(&conn, opts, log)
}
