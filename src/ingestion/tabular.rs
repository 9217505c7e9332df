//! Generic field-mapped delimited-text engine.
//!
//! The engine itself encodes no file-specific assumptions: a [`FieldMapping`]
//! names, per logical field, the zero-based column it lives in (`None` means
//! the field is absent from this file, which is always legal), plus
//! the delimiter and the unit/date/duration layout selectors.
//!
//! Two operating modes:
//!
//! - [`parse_manual`]: one row = one whole dive, summary fields only.
//! - [`parse_profile`]: one row = one profile sample; contiguous rows sharing
//!   the same dive-identifying columns group into one dive's sample stream.
//!
//! Both consume the input in a single pass, append produced dives in file
//! order, and report the count of dives added. Malformed numeric cells
//! degrade to field-absent rather than aborting the row.

use serde::{Deserialize, Serialize};

use crate::builder::{self, DateFormat, DurationFormat, UnitSystem};
use crate::error::{ImportError, ImportResult};
use crate::model::{Cylinder, Dive, DiveComputer, DiveLog, Sample};

/// Column delimiter selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    Tab,
    #[default]
    Comma,
    Semicolon,
    Pipe,
}

impl Separator {
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            Separator::Tab => b'\t',
            Separator::Comma => b',',
            Separator::Semicolon => b';',
            Separator::Pipe => b'|',
        }
    }
}

/// Column mapping for the delimited-text engine.
///
/// Every index field is `Option<usize>`: `None` leaves the corresponding
/// canonical attribute unset. Mappings are plain data and serde-derived so
/// callers can persist presets as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    // Dive-level summary columns.
    pub number: Option<usize>,
    pub date: Option<usize>,
    pub time: Option<usize>,
    pub starttime: Option<usize>,
    pub duration: Option<usize>,
    pub location: Option<usize>,
    pub gps: Option<usize>,
    pub maxdepth: Option<usize>,
    pub meandepth: Option<usize>,
    pub divemaster: Option<usize>,
    pub buddy: Option<usize>,
    pub suit: Option<usize>,
    pub notes: Option<usize>,
    pub weight: Option<usize>,
    pub tags: Option<usize>,
    pub cylindersize: Option<usize>,
    pub startpressure: Option<usize>,
    pub endpressure: Option<usize>,
    pub o2: Option<usize>,
    pub he: Option<usize>,
    pub airtemp: Option<usize>,
    pub watertemp: Option<usize>,
    // Sample-level columns (profile mode).
    pub depth: Option<usize>,
    pub temp: Option<usize>,
    pub pressure: Option<usize>,
    pub po2: Option<usize>,
    pub o2sensor1: Option<usize>,
    pub o2sensor2: Option<usize>,
    pub o2sensor3: Option<usize>,
    pub cns: Option<usize>,
    pub ndl: Option<usize>,
    pub tts: Option<usize>,
    pub stopdepth: Option<usize>,
    pub setpoint: Option<usize>,
    // Format selectors.
    pub separator: Separator,
    pub units: UnitSystem,
    pub datefmt: DateFormat,
    pub durationfmt: DurationFormat,
    /// Free-text device label attached to produced dive-computer records.
    pub hw: Option<String>,
}

impl FieldMapping {
    /// All index fields with their names, for validation and diagnostics.
    fn indexed_fields(&self) -> [(&'static str, Option<usize>); 34] {
        [
            ("number", self.number),
            ("date", self.date),
            ("time", self.time),
            ("starttime", self.starttime),
            ("duration", self.duration),
            ("location", self.location),
            ("gps", self.gps),
            ("maxdepth", self.maxdepth),
            ("meandepth", self.meandepth),
            ("divemaster", self.divemaster),
            ("buddy", self.buddy),
            ("suit", self.suit),
            ("notes", self.notes),
            ("weight", self.weight),
            ("tags", self.tags),
            ("cylindersize", self.cylindersize),
            ("startpressure", self.startpressure),
            ("endpressure", self.endpressure),
            ("o2", self.o2),
            ("he", self.he),
            ("airtemp", self.airtemp),
            ("watertemp", self.watertemp),
            ("depth", self.depth),
            ("temp", self.temp),
            ("pressure", self.pressure),
            ("po2", self.po2),
            ("o2sensor1", self.o2sensor1),
            ("o2sensor2", self.o2sensor2),
            ("o2sensor3", self.o2sensor3),
            ("cns", self.cns),
            ("ndl", self.ndl),
            ("tts", self.tts),
            ("stopdepth", self.stopdepth),
            ("setpoint", self.setpoint),
        ]
    }

    /// Check every mapped index against the input's column count.
    ///
    /// Validation happens once, up front, so an out-of-range mapping fails
    /// before anything is appended to the table.
    pub fn validate_against(&self, columns: usize) -> ImportResult<()> {
        for (field, idx) in self.indexed_fields() {
            if let Some(index) = idx {
                if index >= columns {
                    return Err(ImportError::FieldMappingInvalid {
                        field,
                        index,
                        columns,
                    });
                }
            }
        }
        Ok(())
    }

    /// Load a mapping preset from JSON.
    pub fn from_json(json: &str) -> ImportResult<FieldMapping> {
        serde_json::from_str(json).map_err(|e| ImportError::MalformedRecord {
            line: e.line(),
            message: format!("field mapping preset: {e}"),
        })
    }
}

fn cell<'r>(record: &'r csv::StringRecord, idx: Option<usize>) -> Option<&'r str> {
    let raw = record.get(idx?)?.trim().trim_matches('"').trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw)
    }
}

fn text_field(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    cell(record, idx).map(str::to_string)
}

fn reader_for(text: &str, sep: Separator) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(sep.as_byte())
        .flexible(true)
        .from_reader(text.as_bytes())
}

fn build_cylinder(record: &csv::StringRecord, mapping: &FieldMapping) -> Option<Cylinder> {
    let size = cell(record, mapping.cylindersize);
    let start = cell(record, mapping.startpressure);
    let end = cell(record, mapping.endpressure);
    let o2 = cell(record, mapping.o2);
    let he = cell(record, mapping.he);
    if size.is_none() && start.is_none() && end.is_none() && o2.is_none() && he.is_none() {
        return None;
    }
    Some(Cylinder {
        size_ml: size.and_then(|s| builder::volume_to_ml(s, mapping.units)),
        gas: builder::gas_mix(o2, he),
        start_mbar: start.and_then(|s| builder::pressure_to_mbar(s, mapping.units)),
        end_mbar: end.and_then(|s| builder::pressure_to_mbar(s, mapping.units)),
    })
}

fn dive_summary(record: &csv::StringRecord, mapping: &FieldMapping, log: &mut DiveLog) -> Dive {
    let mut dive = Dive {
        number: cell(record, mapping.number).and_then(builder::parse_int),
        when: cell(record, mapping.date)
            .and_then(|d| {
                builder::parse_date_time(
                    d,
                    cell(record, mapping.time).or_else(|| cell(record, mapping.starttime)),
                    mapping.datefmt,
                )
            })
            .unwrap_or(0),
        duration_s: cell(record, mapping.duration)
            .and_then(|d| builder::duration_to_s(d, mapping.durationfmt))
            .unwrap_or(0),
        max_depth_mm: cell(record, mapping.maxdepth)
            .and_then(|d| builder::depth_to_mm(d, mapping.units)),
        mean_depth_mm: cell(record, mapping.meandepth)
            .and_then(|d| builder::depth_to_mm(d, mapping.units)),
        air_temp_mc: cell(record, mapping.airtemp)
            .and_then(|t| builder::temperature_to_mc(t, mapping.units)),
        water_temp_mc: cell(record, mapping.watertemp)
            .and_then(|t| builder::temperature_to_mc(t, mapping.units)),
        buddy: text_field(record, mapping.buddy),
        divemaster: text_field(record, mapping.divemaster),
        suit: text_field(record, mapping.suit),
        notes: text_field(record, mapping.notes),
        weight: text_field(record, mapping.weight),
        tags: text_field(record, mapping.tags),
        ..Default::default()
    };

    let gps = cell(record, mapping.gps).and_then(builder::parse_gps);
    let location = cell(record, mapping.location).unwrap_or("");
    dive.site = builder::resolve_site(log, location, gps);

    if let Some(cylinder) = build_cylinder(record, mapping) {
        dive.cylinders.push(cylinder);
    }
    dive
}

/// Parse a manual-entry log: one row = one dive, summary fields only.
///
/// The first line is a header row and is skipped. Returns the number of
/// dives added to the session.
pub fn parse_manual(text: &str, mapping: &FieldMapping, log: &mut DiveLog) -> ImportResult<usize> {
    let mut rdr = reader_for(text, mapping.separator);
    mapping.validate_against(rdr.headers()?.len())?;

    let mut staged = DiveLog::new();
    for result in rdr.records() {
        let record = result?;
        let dive = dive_summary(&record, mapping, &mut staged);
        staged.table.push(dive);
    }

    let added = staged.table.nr();
    log.absorb(staged);
    Ok(added)
}

fn build_sample(record: &csv::StringRecord, mapping: &FieldMapping) -> Option<Sample> {
    let time_s = cell(record, mapping.time).and_then(builder::sample_time_to_s)?;
    Some(Sample {
        time_s,
        depth_mm: cell(record, mapping.depth)
            .and_then(|d| builder::depth_to_mm(d, mapping.units))
            .unwrap_or(0),
        temperature_mc: cell(record, mapping.temp)
            .and_then(|t| builder::temperature_to_mc(t, mapping.units)),
        pressure_mbar: cell(record, mapping.pressure)
            .and_then(|p| builder::pressure_to_mbar(p, mapping.units)),
        sensor: None,
        cns_permille: cell(record, mapping.cns).and_then(builder::percent_to_permille),
        ndl_s: cell(record, mapping.ndl).and_then(builder::sample_time_to_s),
        tts_s: cell(record, mapping.tts).and_then(builder::sample_time_to_s),
        stopdepth_mm: cell(record, mapping.stopdepth)
            .and_then(|d| builder::depth_to_mm(d, mapping.units)),
        setpoint_mbar: cell(record, mapping.setpoint)
            .and_then(|p| builder::pressure_to_mbar(p, mapping.units)),
        po2_mbar: cell(record, mapping.po2)
            .and_then(|p| builder::pressure_to_mbar(p, mapping.units)),
        o2sensor_mbar: [
            cell(record, mapping.o2sensor1)
                .and_then(|p| builder::pressure_to_mbar(p, mapping.units)),
            cell(record, mapping.o2sensor2)
                .and_then(|p| builder::pressure_to_mbar(p, mapping.units)),
            cell(record, mapping.o2sensor3)
                .and_then(|p| builder::pressure_to_mbar(p, mapping.units)),
        ],
    })
}

/// Identity of the dive a profile row belongs to: the raw text of the
/// dive-identifying columns. Contiguous rows with the same key are one dive.
fn profile_key(record: &csv::StringRecord, mapping: &FieldMapping) -> (String, String, String) {
    (
        cell(record, mapping.number).unwrap_or("").to_string(),
        cell(record, mapping.date).unwrap_or("").to_string(),
        cell(record, mapping.starttime).unwrap_or("").to_string(),
    )
}

fn finish_profile_dive(mut dive: Dive) -> Dive {
    if let Some(dc) = dive.computers.first() {
        if let Some(last) = dc.samples.last() {
            dive.duration_s = last.time_s;
        }
        dive.max_depth_mm = dc.samples.iter().map(|s| s.depth_mm).max();
    }
    dive
}

/// Parse a profile log: one row = one sample.
///
/// Rows sharing the same dive-identifying columns (number/date/starttime)
/// form one dive; the dive's duration and maximum depth are derived from its
/// sample stream. Returns the number of dives added to the session.
pub fn parse_profile(text: &str, mapping: &FieldMapping, log: &mut DiveLog) -> ImportResult<usize> {
    let mut rdr = reader_for(text, mapping.separator);
    mapping.validate_against(rdr.headers()?.len())?;

    let mut staged = DiveLog::new();
    let mut dives: Vec<Dive> = Vec::new();
    let mut current_key: Option<(String, String, String)> = None;

    for result in rdr.records() {
        let record = result?;
        let key = profile_key(&record, mapping);
        if current_key.as_ref() != Some(&key) {
            let mut dive = dive_summary(&record, mapping, &mut staged);
            dive.when = cell(&record, mapping.date)
                .and_then(|d| {
                    builder::parse_date_time(d, cell(&record, mapping.starttime), mapping.datefmt)
                })
                .unwrap_or(0);
            dive.computers.push(DiveComputer {
                model: mapping.hw.clone(),
                when: dive.when,
                ..Default::default()
            });
            dives.push(dive);
            current_key = Some(key);
        }
        if let (Some(dive), Some(sample)) = (dives.last_mut(), build_sample(&record, mapping)) {
            dive.computers[0].samples.push(sample);
        }
    }

    let added = dives.len();
    for dive in dives {
        staged.table.push(finish_profile_dive(dive));
    }
    log.absorb(staged);
    Ok(added)
}
