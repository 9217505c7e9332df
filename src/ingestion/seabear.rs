//! Seabear logger CSV import.
//!
//! Unlike the generic engine, this adapter autodetects its columns from the
//! fixed vendor header instead of a caller-supplied mapping. Files carry
//! `//`-prefixed metadata lines (product, serial, start time, log interval)
//! followed by a semicolon-separated column header and one sample per line.
//! A header naming a column outside the supported vocabulary is a parse
//! failure; this is the one tabular mode that is allowed to reject input on
//! layout grounds.

use crate::builder::{self, UnitSystem};
use crate::error::{ImportError, ImportResult};
use crate::model::{Dive, DiveComputer, DiveLog, Sample};

#[derive(Debug, Default)]
struct Columns {
    time: Option<usize>,
    depth: Option<usize>,
    temp: Option<usize>,
    ndl: Option<usize>,
    tts: Option<usize>,
    po2: Option<usize>,
    pressure: Option<usize>,
    cns: Option<usize>,
    setpoint: Option<usize>,
}

fn detect_columns(header: &str, line: usize) -> ImportResult<Columns> {
    let mut cols = Columns::default();
    for (idx, name) in header.split(';').enumerate() {
        let slot = match name.trim() {
            "Time" => &mut cols.time,
            "Depth" => &mut cols.depth,
            "Temp" | "Temperature" => &mut cols.temp,
            "NDT" | "NDL" => &mut cols.ndl,
            "TTS" => &mut cols.tts,
            "pO2" | "pO2-1" => &mut cols.po2,
            "Pressure" => &mut cols.pressure,
            "CNS" => &mut cols.cns,
            "Setpoint" => &mut cols.setpoint,
            other => {
                return Err(ImportError::MalformedRecord {
                    line,
                    message: format!("unsupported Seabear column '{other}'"),
                })
            }
        };
        *slot = Some(idx);
    }
    if cols.depth.is_none() {
        return Err(ImportError::MalformedRecord {
            line,
            message: "Seabear header has no Depth column".to_string(),
        });
    }
    Ok(cols)
}

fn metadata_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix("//")?
        .trim()
        .strip_prefix(key)?
        .trim_start_matches(':')
        .trim()
        .into()
}

fn field(fields: &[&str], idx: Option<usize>) -> Option<String> {
    let raw = fields.get(idx?)?.trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Parse one Seabear log file into the session. Produces exactly one dive.
pub fn parse_log(text: &str, log: &mut DiveLog) -> ImportResult<usize> {
    let units = UnitSystem::Metric;
    let mut product: Option<String> = None;
    let mut serial: Option<String> = None;
    let mut when: i64 = 0;
    let mut interval_s: i32 = 1;
    let mut cols: Option<Columns> = None;
    let mut samples: Vec<Sample> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("//") {
            if let Some(v) = metadata_value(line, "Product") {
                product = Some(v.to_string());
            } else if let Some(v) = metadata_value(line, "Serial number") {
                serial = Some(v.to_string());
            } else if let Some(v) = metadata_value(line, "Log interval") {
                if let Some(n) = builder::parse_int(v.trim_end_matches('s').trim()) {
                    interval_s = n.max(1);
                }
            } else if let Some(v) = metadata_value(line, "Start time") {
                // ISO timestamp, e.g. 2014-08-21T10:00:00
                if let Some((date, time)) = v.split_once('T') {
                    when = builder::parse_date_time(
                        date,
                        Some(time),
                        builder::DateFormat::YyyyMmDd,
                    )
                    .unwrap_or(0);
                }
            }
            continue;
        }

        let cols = match &cols {
            Some(c) => c,
            None => {
                cols = Some(detect_columns(line, idx + 1)?);
                continue;
            }
        };

        let fields: Vec<&str> = line.split(';').collect();
        let time_s = field(&fields, cols.time)
            .and_then(|t| builder::sample_time_to_s(&t))
            .unwrap_or(samples.len() as i32 * interval_s);
        samples.push(Sample {
            time_s,
            depth_mm: field(&fields, cols.depth)
                .and_then(|d| builder::depth_to_mm(&d, units))
                .unwrap_or(0),
            temperature_mc: field(&fields, cols.temp)
                .and_then(|t| builder::temperature_to_mc(&t, units)),
            pressure_mbar: field(&fields, cols.pressure)
                .and_then(|p| builder::pressure_to_mbar(&p, units)),
            ndl_s: field(&fields, cols.ndl).and_then(|t| builder::sample_time_to_s(&t)),
            tts_s: field(&fields, cols.tts).and_then(|t| builder::sample_time_to_s(&t)),
            po2_mbar: field(&fields, cols.po2)
                .and_then(|p| builder::pressure_to_mbar(&p, units)),
            cns_permille: field(&fields, cols.cns).and_then(|c| builder::percent_to_permille(&c)),
            setpoint_mbar: field(&fields, cols.setpoint)
                .and_then(|p| builder::pressure_to_mbar(&p, units)),
            ..Default::default()
        });
    }

    if cols.is_none() || samples.is_empty() {
        return Err(ImportError::MalformedRecord {
            line: text.lines().count(),
            message: "Seabear log has no sample data".to_string(),
        });
    }

    let duration_s = samples.last().map(|s| s.time_s).unwrap_or(0);
    let max_depth_mm = samples.iter().map(|s| s.depth_mm).max();
    log.table.push(Dive {
        when,
        duration_s,
        max_depth_mm,
        computers: vec![DiveComputer {
            model: product,
            serial,
            when,
            samples,
            ..Default::default()
        }],
        ..Default::default()
    });
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const H3_LOG: &str = "\
//Product: H3\n\
//Serial number: 01234\n\
//Log interval: 5 s\n\
//Start time: 2014-08-21T10:00:00\n\
Depth;Temp\n\
1.0;22\n\
5.0;21\n\
3.0;21\n";

    #[test]
    fn header_autodetection_produces_one_dive() {
        let mut log = DiveLog::new();
        assert_eq!(parse_log(H3_LOG, &mut log).unwrap(), 1);
        let dive = log.table.get(0).unwrap();
        let dc = &dive.computers[0];
        assert_eq!(dc.model.as_deref(), Some("H3"));
        assert_eq!(dc.serial.as_deref(), Some("01234"));
        assert_eq!(dc.samples.len(), 3);
        // No Time column: offsets come from the log interval.
        assert_eq!(dc.samples[2].time_s, 10);
        assert_eq!(dive.max_depth_mm, Some(5000));
    }

    #[test]
    fn unknown_header_column_is_a_parse_failure() {
        let mut log = DiveLog::new();
        let err = parse_log("Bogus;Depth\n1;2\n", &mut log).unwrap_err();
        assert!(matches!(err, ImportError::MalformedRecord { .. }));
        assert!(log.table.is_empty());
    }
}
