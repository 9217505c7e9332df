//! Native-format XML parser, the inverse of the writer.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ImportError, ImportResult};
use crate::model::{Cylinder, Dive, DiveComputer, DiveLog, GasMix, Sample, SiteId};

use super::ROOT;

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn attr_i32(e: &BytesStart, name: &str) -> Option<i32> {
    attr(e, name)?.parse().ok()
}

fn attr_i64(e: &BytesStart, name: &str) -> Option<i64> {
    attr(e, name)?.parse().ok()
}

fn attr_site_id(e: &BytesStart, name: &str) -> Option<SiteId> {
    u32::from_str_radix(&attr(e, name)?, 16).ok().map(SiteId)
}

fn attr_gps(e: &BytesStart) -> Option<(i32, i32)> {
    let raw = attr(e, "gps")?;
    let (lat, lon) = raw.split_once(' ')?;
    Some((lat.parse().ok()?, lon.parse().ok()?))
}

fn parse_site(log: &mut DiveLog, e: &BytesStart) {
    let Some(id) = attr_site_id(e, "uuid") else {
        return;
    };
    let site = log.sites.get_or_create(id);
    if let Some(name) = attr(e, "name") {
        site.name = name;
    }
    if let Some(gps) = attr_gps(e) {
        site.gps = Some(gps);
    }
}

fn parse_dive_start(e: &BytesStart) -> Dive {
    Dive {
        number: attr_i32(e, "number"),
        when: attr_i64(e, "when").unwrap_or(0),
        duration_s: attr_i32(e, "duration").unwrap_or(0),
        site: attr_site_id(e, "divesiteid"),
        max_depth_mm: attr_i32(e, "maxdepth"),
        mean_depth_mm: attr_i32(e, "meandepth"),
        air_temp_mc: attr_i32(e, "airtemp"),
        water_temp_mc: attr_i32(e, "watertemp"),
        buddy: attr(e, "buddy"),
        divemaster: attr(e, "divemaster"),
        suit: attr(e, "suit"),
        weight: attr(e, "weight"),
        tags: attr(e, "tags"),
        ..Default::default()
    }
}

fn parse_cylinder(e: &BytesStart) -> Cylinder {
    let gas = match attr_i32(e, "o2") {
        Some(o2_permille) => GasMix {
            o2_permille,
            he_permille: attr_i32(e, "he").unwrap_or(0),
        },
        None => GasMix::AIR,
    };
    Cylinder {
        size_ml: attr_i32(e, "size"),
        gas,
        start_mbar: attr_i32(e, "start"),
        end_mbar: attr_i32(e, "end"),
    }
}

fn parse_computer(e: &BytesStart) -> DiveComputer {
    DiveComputer {
        model: attr(e, "model"),
        serial: attr(e, "serial"),
        nickname: attr(e, "nickname"),
        when: attr_i64(e, "when").unwrap_or(0),
        ..Default::default()
    }
}

fn parse_sample(e: &BytesStart) -> Sample {
    Sample {
        time_s: attr_i32(e, "time").unwrap_or(0),
        depth_mm: attr_i32(e, "depth").unwrap_or(0),
        temperature_mc: attr_i32(e, "temp"),
        pressure_mbar: attr_i32(e, "pressure"),
        sensor: attr_i32(e, "sensor").and_then(|v| usize::try_from(v).ok()),
        cns_permille: attr_i32(e, "cns"),
        ndl_s: attr_i32(e, "ndl"),
        tts_s: attr_i32(e, "tts"),
        stopdepth_mm: attr_i32(e, "stopdepth"),
        setpoint_mbar: attr_i32(e, "setpoint"),
        po2_mbar: attr_i32(e, "po2"),
        o2sensor_mbar: [
            attr_i32(e, "o2sensor1"),
            attr_i32(e, "o2sensor2"),
            attr_i32(e, "o2sensor3"),
        ],
    }
}

/// Parse a native-format document into a fresh session.
pub fn parse_native(xml: &str) -> ImportResult<DiveLog> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut log = DiveLog::new();
    let mut current_dive: Option<Dive> = None;
    let mut current_dc: Option<DiveComputer> = None;
    let mut in_notes = false;
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if !saw_root {
                    if name != ROOT {
                        return Err(ImportError::NotRecognized(format!(
                            "root element is <{name}>, not <{ROOT}>"
                        )));
                    }
                    saw_root = true;
                } else {
                    match name.as_str() {
                        "site" => parse_site(&mut log, e),
                        "dive" => current_dive = Some(parse_dive_start(e)),
                        "divecomputer" => current_dc = Some(parse_computer(e)),
                        "notes" => {
                            if let Some(dive) = current_dive.as_mut() {
                                dive.notes = Some(String::new());
                                in_notes = true;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "site" => parse_site(&mut log, e),
                    "cylinder" => {
                        if let Some(dive) = current_dive.as_mut() {
                            dive.cylinders.push(parse_cylinder(e));
                        }
                    }
                    "divecomputer" => {
                        if let Some(dive) = current_dive.as_mut() {
                            dive.computers.push(parse_computer(e));
                        }
                    }
                    "sample" => {
                        if let Some(dc) = current_dc.as_mut() {
                            dc.samples.push(parse_sample(e));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "notes" => in_notes = false,
                    "divecomputer" => {
                        if let (Some(dive), Some(dc)) = (current_dive.as_mut(), current_dc.take())
                        {
                            dive.computers.push(dc);
                        }
                    }
                    "dive" => {
                        if let Some(dive) = current_dive.take() {
                            log.table.push(dive);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_notes {
                    if let (Some(dive), Ok(text)) = (current_dive.as_mut(), e.unescape()) {
                        if let Some(notes) = dive.notes.as_mut() {
                            notes.push_str(&text);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ImportError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ImportError::NotRecognized(
            "document has no root element".to_string(),
        ));
    }
    Ok(log)
}

/// Parse a native-format document and append its contents to an existing
/// session. The document is parsed fully before anything is appended, so a
/// parse failure leaves the session untouched. Returns the number of dives
/// added.
pub fn parse_native_into(xml: &str, log: &mut DiveLog) -> ImportResult<usize> {
    let parsed = parse_native(xml)?;
    let added = parsed.table.nr();
    log.absorb(parsed);
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_root() {
        let err = parse_native("<uddf></uddf>").unwrap_err();
        assert!(matches!(err, ImportError::NotRecognized(_)));
    }

    #[test]
    fn absent_attributes_stay_unset() {
        let log = parse_native(
            "<divelog><dives><dive when=\"100\" duration=\"60\"></dive></dives></divelog>",
        )
        .unwrap();
        let dive = log.table.get(0).unwrap();
        assert_eq!(dive.number, None);
        assert_eq!(dive.max_depth_mm, None);
        assert_eq!(dive.site, None);
        assert!(dive.notes.is_none());
    }

    #[test]
    fn air_cylinder_round_trips_without_gas_attributes() {
        let log = parse_native(
            "<divelog><dives><dive when=\"0\" duration=\"0\">\
             <cylinder size=\"12000\"/></dive></dives></divelog>",
        )
        .unwrap();
        let cylinder = &log.table.get(0).unwrap().cylinders[0];
        assert!(cylinder.gas.is_air());
        assert_eq!(cylinder.size_ml, Some(12000));
    }
}
