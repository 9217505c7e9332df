//! Suunto DiveManager 5 adapter.
//!
//! DM5 moved the profile out of blobs into a `DiveSamples` relation keyed by
//! `DiveId`. The presence of that table is what the detector uses to pick
//! this adapter over DM4.

use std::path::Path;

use rusqlite::Connection;

use crate::builder;
use crate::error::ImportResult;
use crate::model::{Dive, DiveComputer, DiveLog, Sample};

use super::{require_tables, schema_mismatch, DbImportOptions};

const DIVE_QUERY: &str = "SELECT DiveId, DiveNumber, StartTime, Duration, MaxDepth, AvgDepth, \
     Note, Source, SourceSerialNumber FROM Dive ORDER BY StartTime";

const SAMPLE_QUERY: &str =
    "SELECT Time, Depth, Temperature, Pressure FROM DiveSamples WHERE DiveId = ?1 ORDER BY Time";

fn load_samples(conn: &Connection, dive_id: i64) -> ImportResult<Vec<Sample>> {
    let mut stmt = conn.prepare(SAMPLE_QUERY).map_err(schema_mismatch)?;
    let mut rows = stmt.query([dive_id])?;

    let mut samples = Vec::new();
    while let Some(row) = rows.next()? {
        samples.push(Sample {
            time_s: row
                .get::<_, Option<i64>>(0)
                .ok()
                .flatten()
                .map(|v| v as i32)
                .unwrap_or(0),
            depth_mm: row
                .get::<_, Option<f64>>(1)
                .ok()
                .flatten()
                .and_then(builder::m_to_mm)
                .unwrap_or(0),
            temperature_mc: row
                .get::<_, Option<f64>>(2)
                .ok()
                .flatten()
                .and_then(builder::c_to_mc),
            pressure_mbar: row
                .get::<_, Option<f64>>(3)
                .ok()
                .flatten()
                .and_then(builder::bar_to_mbar),
            ..Default::default()
        });
    }
    Ok(samples)
}

/// Import every dive from an open DM5 store into the session.
pub fn parse_dm5(
    conn: &Connection,
    opts: &DbImportOptions<'_>,
    log: &mut DiveLog,
) -> ImportResult<usize> {
    require_tables(conn, &["Dive", "DiveSamples"])?;

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

        let dive_id: Option<i64> = row.get(0).ok().flatten();
        let when: i64 = row.get::<_, Option<i64>>(2).ok().flatten().unwrap_or(0);
        let samples = match dive_id {
            Some(id) => load_samples(conn, id)?,
            None => Vec::new(),
        };

        staged.push(Dive {
            number: row
                .get::<_, Option<i64>>(1)
                .ok()
                .flatten()
                .map(|n| n as i32),
            when,
            duration_s: row
                .get::<_, Option<i64>>(3)
                .ok()
                .flatten()
                .map(|v| v as i32)
                .unwrap_or(0),
            max_depth_mm: row
                .get::<_, Option<f64>>(4)
                .ok()
                .flatten()
                .and_then(builder::m_to_mm),
            mean_depth_mm: row
                .get::<_, Option<f64>>(5)
                .ok()
                .flatten()
                .and_then(builder::m_to_mm),
            notes: row.get::<_, Option<String>>(6).ok().flatten(),
            computers: vec![DiveComputer {
                model,
                serial: row.get::<_, Option<String>>(8).ok().flatten(),
                when,
                samples,
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

/// Open a DM5 store at `path` and import it.
pub fn parse_dm5_file(
    path: impl AsRef<Path>,
    opts: &DbImportOptions<'_>,
    log: &mut DiveLog,
) -> ImportResult<usize> {
    let conn = super::open_store(path)?;
    parse_dm5(&conn, opts, log)
}
