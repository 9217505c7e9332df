//! DAN DL7 transfer-format adapter.
//!
//! DL7 is record-oriented: a `FSH` file header, one `ZDH` header per dive
//! (dive number plus a compact `YYYYMMDDHHMMSS` timestamp), and profile
//! blocks bracketed by `ZDP{` / `ZDP}` whose pipe-separated columns follow a
//! caller-supplied [`FieldMapping`] (the same field-index vocabulary as the
//! delimited-text engine, with time expressed in decimal minutes).
//!
//! Truncated records (a short `ZDH`, or a profile block still open at end
//! of input) are a file-level parse failure; nothing is appended.

use crate::builder;
use crate::error::{ImportError, ImportResult};
use crate::model::{Dive, DiveComputer, DiveLog, Sample};

use super::tabular::FieldMapping;

/// File-header magic for DL7 transfer files.
pub const DL7_MAGIC: &[u8] = b"FSH|";

/// The standard DAN profile column layout: time in column 1, depth in
/// column 2, pipe-separated.
pub fn default_mapping() -> FieldMapping {
    FieldMapping {
        time: Some(1),
        depth: Some(2),
        separator: super::tabular::Separator::Pipe,
        hw: Some("DL7".to_string()),
        ..Default::default()
    }
}

fn field<'a>(fields: &[&'a str], idx: Option<usize>) -> Option<&'a str> {
    let raw = fields.get(idx?)?.trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw)
    }
}

/// Profile time columns are decimal minutes.
fn minutes_to_s(raw: &str) -> Option<i32> {
    let v: f64 = raw.trim().parse().ok()?;
    Some((v * 60.0).round() as i32)
}

fn profile_sample(fields: &[&str], mapping: &FieldMapping) -> Option<Sample> {
    let time_s = field(fields, mapping.time).and_then(minutes_to_s)?;
    Some(Sample {
        time_s,
        depth_mm: field(fields, mapping.depth)
            .and_then(|d| builder::depth_to_mm(d, mapping.units))
            .unwrap_or(0),
        temperature_mc: field(fields, mapping.temp)
            .and_then(|t| builder::temperature_to_mc(t, mapping.units)),
        pressure_mbar: field(fields, mapping.pressure)
            .and_then(|p| builder::pressure_to_mbar(p, mapping.units)),
        setpoint_mbar: field(fields, mapping.setpoint)
            .and_then(|p| builder::pressure_to_mbar(p, mapping.units)),
        ..Default::default()
    })
}

fn finish(mut dive: Dive) -> Dive {
    if let Some(dc) = dive.computers.first() {
        if let Some(last) = dc.samples.last() {
            dive.duration_s = last.time_s;
        }
        dive.max_depth_mm = dc.samples.iter().map(|s| s.depth_mm).max();
    }
    dive
}

/// Decode a DL7 buffer into the session. Returns the number of dives added.
pub fn parse_dl7(data: &[u8], mapping: &FieldMapping, log: &mut DiveLog) -> ImportResult<usize> {
    if !data.starts_with(DL7_MAGIC) {
        return Err(ImportError::NotRecognized(
            "missing DL7 file header".to_string(),
        ));
    }
    let text = std::str::from_utf8(data).map_err(|_| ImportError::MalformedRecord {
        line: 0,
        message: "DL7 payload is not valid UTF-8".to_string(),
    })?;

    let mut staged: Vec<Dive> = Vec::new();
    let mut current: Option<Dive> = None;
    let mut in_profile = false;
    let mut record = 0usize;

    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        record += 1;

        if let Some(header) = line.strip_prefix("ZDH") {
            if in_profile {
                return Err(ImportError::Truncated { record });
            }
            let fields: Vec<&str> = header.split('|').collect();
            // ZDH|seq|number|kind|YYYYMMDDHHMMSS
            if fields.len() < 5 {
                return Err(ImportError::Truncated { record });
            }
            let when = builder::parse_compact_timestamp(fields[4]).ok_or(
                ImportError::MalformedRecord {
                    line: record,
                    message: format!("bad ZDH timestamp '{}'", fields[4]),
                },
            )?;
            if let Some(dive) = current.take() {
                staged.push(finish(dive));
            }
            current = Some(Dive {
                number: builder::parse_int(fields[2]),
                when,
                computers: vec![DiveComputer {
                    model: mapping.hw.clone().or_else(|| Some("DL7".to_string())),
                    when,
                    ..Default::default()
                }],
                ..Default::default()
            });
        } else if line.starts_with("ZDP{") {
            in_profile = true;
        } else if line.starts_with("ZDP}") {
            in_profile = false;
        } else if in_profile {
            let dive = current.as_mut().ok_or(ImportError::MalformedRecord {
                line: record,
                message: "profile data before any ZDH record".to_string(),
            })?;
            let fields: Vec<&str> = line.split('|').collect();
            if let Some(sample) = profile_sample(&fields, mapping) {
                dive.computers[0].samples.push(sample);
            }
        }
        // FSH/ZRH/ZAR/ZDT and any other records carry no dive data.
    }

    if in_profile {
        return Err(ImportError::Truncated { record });
    }
    if let Some(dive) = current.take() {
        staged.push(finish(dive));
    }

    let added = staged.len();
    for dive in staged {
        log.table.push(dive);
    }
    Ok(added)
}
