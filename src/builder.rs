//! Canonical model builder: the one place raw adapter values become
//! normalized model values.
//!
//! Pure transformation, no I/O. Every adapter funnels its scalar text/number
//! values through these helpers so unit policy, timestamp policy and site
//! resolution exist exactly once. Malformed input degrades to `None`; a bad
//! cell never aborts a row, let alone a file.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::model::{DiveLog, GasMix, SiteId, O2_IN_AIR};

/// Unit system the source file's numbers are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Metres, bar, litres, Celsius.
    #[default]
    Metric,
    /// Feet, psi, cubic feet, Fahrenheit.
    Imperial,
}

/// Date layout selector for tabular sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    MmDdYyyy,
    DdMmYyyy,
    #[default]
    YyyyMmDd,
}

/// Duration layout selector for tabular sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationFormat {
    /// Decimal minutes, e.g. `32.5`.
    Minutes,
    /// `MM:SS`, e.g. `32:30`.
    #[default]
    MinutesSeconds,
    /// `HH:MM:SS`.
    HoursMinutesSeconds,
}

fn clean(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim()
}

/// Parse a plain integer cell. Empty or malformed input is field-absent.
pub fn parse_int(raw: &str) -> Option<i32> {
    clean(raw).parse::<i32>().ok()
}

fn parse_float(raw: &str) -> Option<f64> {
    let s = clean(raw);
    if s.is_empty() {
        return None;
    }
    // Several vendor exports use a decimal comma.
    s.parse::<f64>().or_else(|_| s.replace(',', ".").parse()).ok()
}

fn round_i32(v: f64) -> Option<i32> {
    let r = v.round();
    if r.is_finite() && r >= f64::from(i32::MIN) && r <= f64::from(i32::MAX) {
        Some(r as i32)
    } else {
        None
    }
}

/// Depth cell (metres or feet) to millimetres.
pub fn depth_to_mm(raw: &str, units: UnitSystem) -> Option<i32> {
    let v = parse_float(raw)?;
    match units {
        UnitSystem::Metric => round_i32(v * 1000.0),
        UnitSystem::Imperial => round_i32(v * 304.8),
    }
}

/// Depth in metres (already numeric, e.g. from a database REAL column).
pub fn m_to_mm(v: f64) -> Option<i32> {
    round_i32(v * 1000.0)
}

/// Pressure cell (bar or psi) to millibar.
pub fn pressure_to_mbar(raw: &str, units: UnitSystem) -> Option<i32> {
    let v = parse_float(raw)?;
    match units {
        UnitSystem::Metric => round_i32(v * 1000.0),
        UnitSystem::Imperial => round_i32(v * 68.9476),
    }
}

/// Pressure in bar (already numeric) to millibar.
pub fn bar_to_mbar(v: f64) -> Option<i32> {
    round_i32(v * 1000.0)
}

/// Cylinder size cell (litres or cubic feet) to millilitres.
pub fn volume_to_ml(raw: &str, units: UnitSystem) -> Option<i32> {
    let v = parse_float(raw)?;
    match units {
        UnitSystem::Metric => round_i32(v * 1000.0),
        UnitSystem::Imperial => round_i32(v * 28_316.846),
    }
}

/// Volume in litres (already numeric) to millilitres.
pub fn l_to_ml(v: f64) -> Option<i32> {
    round_i32(v * 1000.0)
}

/// Temperature cell (Celsius or Fahrenheit) to millidegrees Celsius.
pub fn temperature_to_mc(raw: &str, units: UnitSystem) -> Option<i32> {
    let v = parse_float(raw)?;
    match units {
        UnitSystem::Metric => round_i32(v * 1000.0),
        UnitSystem::Imperial => round_i32((v - 32.0) / 1.8 * 1000.0),
    }
}

/// Temperature in Celsius (already numeric) to millidegrees.
pub fn c_to_mc(v: f64) -> Option<i32> {
    round_i32(v * 1000.0)
}

/// Gas percentage cell ("32", "32.0", "32%") to permille.
pub fn percent_to_permille(raw: &str) -> Option<i32> {
    let v = parse_float(clean(raw).trim_end_matches('%'))?;
    round_i32(v * 10.0)
}

/// Build a gas mix from optional O2/He percent cells. Air when both absent.
pub fn gas_mix(o2_raw: Option<&str>, he_raw: Option<&str>) -> GasMix {
    let o2 = o2_raw.and_then(percent_to_permille);
    let he = he_raw.and_then(percent_to_permille).unwrap_or(0);
    GasMix {
        o2_permille: o2.unwrap_or(O2_IN_AIR),
        he_permille: he,
    }
}

/// Duration cell to seconds, under the selected layout.
pub fn duration_to_s(raw: &str, fmt: DurationFormat) -> Option<i32> {
    let s = clean(raw);
    let s = s.strip_suffix("min").map(str::trim).unwrap_or(s);
    match fmt {
        DurationFormat::Minutes => round_i32(parse_float(s)? * 60.0),
        DurationFormat::MinutesSeconds => {
            let (m, sec) = s.split_once(':')?;
            Some(m.trim().parse::<i32>().ok()? * 60 + sec.trim().parse::<i32>().ok()?)
        }
        DurationFormat::HoursMinutesSeconds => {
            let mut it = s.split(':');
            let h = it.next()?.trim().parse::<i32>().ok()?;
            let m = it.next()?.trim().parse::<i32>().ok()?;
            let sec = it.next()?.trim().parse::<i32>().ok()?;
            Some(h * 3600 + m * 60 + sec)
        }
    }
}

/// Sample time offset to seconds. Accepts plain seconds, `MM:SS`, and an
/// optional trailing `min` marker as seen in profile exports.
pub fn sample_time_to_s(raw: &str) -> Option<i32> {
    let s = clean(raw);
    let s = s.strip_suffix("min").map(str::trim).unwrap_or(s);
    if let Some((m, sec)) = s.split_once(':') {
        Some(m.trim().parse::<i32>().ok()? * 60 + sec.trim().parse::<i32>().ok()?)
    } else {
        s.parse::<i32>().ok()
    }
}

/// Date + time-of-day cells to epoch seconds UTC.
///
/// Accepts `/`, `.` and `-` as date separators. A missing or malformed time
/// cell means midnight.
pub fn parse_date_time(date_raw: &str, time_raw: Option<&str>, fmt: DateFormat) -> Option<i64> {
    let date = parse_date(date_raw, fmt)?;
    let time = time_raw
        .and_then(parse_time_of_day)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    Some(date.and_time(time).and_utc().timestamp())
}

fn parse_date(raw: &str, fmt: DateFormat) -> Option<NaiveDate> {
    let norm: String = clean(raw)
        .chars()
        .map(|c| if c == '/' || c == '.' { '-' } else { c })
        .collect();
    let mut it = norm.split('-');
    let a = it.next()?.trim().parse::<i32>().ok()?;
    let b = it.next()?.trim().parse::<u32>().ok()?;
    let c = it.next()?.trim().parse::<u32>().ok()?;
    let (y, m, d) = match fmt {
        DateFormat::YyyyMmDd => (a, b, c),
        DateFormat::DdMmYyyy => (c as i32, b, a as u32),
        DateFormat::MmDdYyyy => (c as i32, a as u32, b),
    };
    NaiveDate::from_ymd_opt(y, m, d)
}

fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let s = clean(raw);
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Compact `YYYYMMDDHHMMSS` timestamp (DL7 dive headers) to epoch seconds.
pub fn parse_compact_timestamp(raw: &str) -> Option<i64> {
    let s = clean(raw);
    if s.len() != 14 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(
        s[0..4].parse().ok()?,
        s[4..6].parse().ok()?,
        s[6..8].parse().ok()?,
    )?;
    let time = NaiveTime::from_hms_opt(
        s[8..10].parse().ok()?,
        s[10..12].parse().ok()?,
        s[12..14].parse().ok()?,
    )?;
    Some(date.and_time(time).and_utc().timestamp())
}

/// GPS cell ("61.123456 25.456" or "61.123456;25.456") to micro-degrees.
pub fn parse_gps(raw: &str) -> Option<(i32, i32)> {
    let s = clean(raw);
    let mut it = s
        .split(|c: char| c == ' ' || c == ';' || c == ',')
        .filter(|t| !t.trim().is_empty());
    let lat = it.next()?.trim().parse::<f64>().ok()?;
    let lon = it.next()?.trim().parse::<f64>().ok()?;
    Some((round_i32(lat * 1_000_000.0)?, round_i32(lon * 1_000_000.0)?))
}

/// Resolve a location name and/or GPS pair to a site reference, allocating
/// the site in the registry when it does not exist yet.
///
/// Adapters never build [`crate::model::DiveSite`] themselves; this is the
/// single name/GPS-to-identifier path, and it is idempotent.
pub fn resolve_site(log: &mut DiveLog, name: &str, gps: Option<(i32, i32)>) -> Option<SiteId> {
    let name = name.trim();
    if name.is_empty() && gps.is_none() {
        return None;
    }
    let id = SiteId::of(name, gps);
    let site = log.sites.get_or_create(id);
    if site.name.is_empty() {
        site.name = name.to_string();
    }
    if site.gps.is_none() {
        site.gps = gps;
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_units() {
        assert_eq!(depth_to_mm("7.6", UnitSystem::Metric), Some(7600));
        assert_eq!(depth_to_mm("100", UnitSystem::Imperial), Some(30480));
        assert_eq!(depth_to_mm("n/a", UnitSystem::Metric), None);
    }

    #[test]
    fn pressure_units() {
        assert_eq!(pressure_to_mbar("200", UnitSystem::Metric), Some(200_000));
        assert_eq!(pressure_to_mbar("3000", UnitSystem::Imperial), Some(206_843));
    }

    #[test]
    fn gas_defaults_to_air() {
        assert!(gas_mix(None, None).is_air());
        let ean32 = gas_mix(Some("32"), None);
        assert_eq!(ean32.o2_permille, 320);
        assert_eq!(ean32.he_permille, 0);
    }

    #[test]
    fn durations() {
        assert_eq!(duration_to_s("30:00", DurationFormat::MinutesSeconds), Some(1800));
        assert_eq!(duration_to_s("32.5", DurationFormat::Minutes), Some(1950));
        assert_eq!(
            duration_to_s("1:02:30", DurationFormat::HoursMinutesSeconds),
            Some(3750)
        );
        assert_eq!(duration_to_s("", DurationFormat::MinutesSeconds), None);
    }

    #[test]
    fn dates_across_layouts() {
        let iso = parse_date_time("2009-10-10", Some("10:12:41"), DateFormat::YyyyMmDd).unwrap();
        let dmy = parse_date_time("10.10.2009", Some("10:12:41"), DateFormat::DdMmYyyy).unwrap();
        let mdy = parse_date_time("10/10/2009", Some("10:12:41"), DateFormat::MmDdYyyy).unwrap();
        assert_eq!(iso, dmy);
        assert_eq!(iso, mdy);
        assert_eq!(iso, 1255169561);
    }

    #[test]
    fn compact_timestamp() {
        assert_eq!(parse_compact_timestamp("20091010101241"), Some(1255169561));
        assert_eq!(parse_compact_timestamp("2009101010"), None);
    }

    #[test]
    fn gps_micro_degrees() {
        assert_eq!(parse_gps("61.123456 25.5"), Some((61_123_456, 25_500_000)));
        assert_eq!(parse_gps(""), None);
    }

    #[test]
    fn site_resolution_is_idempotent() {
        let mut log = DiveLog::new();
        let a = resolve_site(&mut log, "Suomi -  - Hälvälä", None).unwrap();
        let b = resolve_site(&mut log, "Suomi -  - Hälvälä", None).unwrap();
        assert_eq!(a, b);
        assert_eq!(log.sites.len(), 1);
        assert!(resolve_site(&mut log, "", None).is_none());
    }
}
