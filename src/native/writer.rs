//! Native-format XML writer.
//!
//! Read-only over the model: serialization never mutates the session. The
//! output is built fully in memory and only then handed to the filesystem,
//! so a failed save never leaves a half-written file behind a successful
//! return.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::ImportResult;
use crate::model::{Cylinder, Dive, DiveComputer, DiveLog, Sample};

use super::ROOT;

type XmlWriter = Writer<Vec<u8>>;

fn push_opt_i32(elem: &mut BytesStart, name: &str, value: Option<i32>) {
    if let Some(v) = value {
        elem.push_attribute((name, v.to_string().as_str()));
    }
}

fn push_opt_str(elem: &mut BytesStart, name: &str, value: Option<&str>) {
    if let Some(v) = value {
        elem.push_attribute((name, v));
    }
}

fn write_site_list(writer: &mut XmlWriter, log: &DiveLog) -> ImportResult<()> {
    if log.sites.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("divesites")))?;
    for (id, site) in log.sites.iter() {
        let mut elem = BytesStart::new("site");
        elem.push_attribute(("uuid", id.to_string().as_str()));
        if !site.name.is_empty() {
            elem.push_attribute(("name", site.name.as_str()));
        }
        if let Some((lat, lon)) = site.gps {
            elem.push_attribute(("gps", format!("{lat} {lon}").as_str()));
        }
        writer.write_event(Event::Empty(elem))?;
    }
    writer.write_event(Event::End(BytesEnd::new("divesites")))?;
    Ok(())
}

fn write_cylinder(writer: &mut XmlWriter, cylinder: &Cylinder) -> ImportResult<()> {
    let mut elem = BytesStart::new("cylinder");
    push_opt_i32(&mut elem, "size", cylinder.size_ml);
    if !cylinder.gas.is_air() {
        elem.push_attribute(("o2", cylinder.gas.o2_permille.to_string().as_str()));
        if cylinder.gas.he_permille != 0 {
            elem.push_attribute(("he", cylinder.gas.he_permille.to_string().as_str()));
        }
    }
    push_opt_i32(&mut elem, "start", cylinder.start_mbar);
    push_opt_i32(&mut elem, "end", cylinder.end_mbar);
    writer.write_event(Event::Empty(elem))?;
    Ok(())
}

fn write_sample(writer: &mut XmlWriter, sample: &Sample) -> ImportResult<()> {
    let mut elem = BytesStart::new("sample");
    elem.push_attribute(("time", sample.time_s.to_string().as_str()));
    elem.push_attribute(("depth", sample.depth_mm.to_string().as_str()));
    push_opt_i32(&mut elem, "temp", sample.temperature_mc);
    push_opt_i32(&mut elem, "pressure", sample.pressure_mbar);
    if let Some(sensor) = sample.sensor {
        elem.push_attribute(("sensor", sensor.to_string().as_str()));
    }
    push_opt_i32(&mut elem, "cns", sample.cns_permille);
    push_opt_i32(&mut elem, "ndl", sample.ndl_s);
    push_opt_i32(&mut elem, "tts", sample.tts_s);
    push_opt_i32(&mut elem, "stopdepth", sample.stopdepth_mm);
    push_opt_i32(&mut elem, "setpoint", sample.setpoint_mbar);
    push_opt_i32(&mut elem, "po2", sample.po2_mbar);
    push_opt_i32(&mut elem, "o2sensor1", sample.o2sensor_mbar[0]);
    push_opt_i32(&mut elem, "o2sensor2", sample.o2sensor_mbar[1]);
    push_opt_i32(&mut elem, "o2sensor3", sample.o2sensor_mbar[2]);
    writer.write_event(Event::Empty(elem))?;
    Ok(())
}

fn write_computer(writer: &mut XmlWriter, dc: &DiveComputer) -> ImportResult<()> {
    let mut elem = BytesStart::new("divecomputer");
    push_opt_str(&mut elem, "model", dc.model.as_deref());
    push_opt_str(&mut elem, "serial", dc.serial.as_deref());
    push_opt_str(&mut elem, "nickname", dc.nickname.as_deref());
    elem.push_attribute(("when", dc.when.to_string().as_str()));
    if dc.samples.is_empty() {
        writer.write_event(Event::Empty(elem))?;
        return Ok(());
    }
    writer.write_event(Event::Start(elem))?;
    for sample in &dc.samples {
        write_sample(writer, sample)?;
    }
    writer.write_event(Event::End(BytesEnd::new("divecomputer")))?;
    Ok(())
}

fn write_dive(writer: &mut XmlWriter, dive: &Dive) -> ImportResult<()> {
    let mut elem = BytesStart::new("dive");
    push_opt_i32(&mut elem, "number", dive.number);
    elem.push_attribute(("when", dive.when.to_string().as_str()));
    elem.push_attribute(("duration", dive.duration_s.to_string().as_str()));
    if let Some(site) = dive.site {
        elem.push_attribute(("divesiteid", site.to_string().as_str()));
    }
    push_opt_i32(&mut elem, "maxdepth", dive.max_depth_mm);
    push_opt_i32(&mut elem, "meandepth", dive.mean_depth_mm);
    push_opt_i32(&mut elem, "airtemp", dive.air_temp_mc);
    push_opt_i32(&mut elem, "watertemp", dive.water_temp_mc);
    push_opt_str(&mut elem, "buddy", dive.buddy.as_deref());
    push_opt_str(&mut elem, "divemaster", dive.divemaster.as_deref());
    push_opt_str(&mut elem, "suit", dive.suit.as_deref());
    push_opt_str(&mut elem, "weight", dive.weight.as_deref());
    push_opt_str(&mut elem, "tags", dive.tags.as_deref());
    writer.write_event(Event::Start(elem))?;

    if let Some(notes) = dive.notes.as_deref() {
        writer.write_event(Event::Start(BytesStart::new("notes")))?;
        writer.write_event(Event::Text(BytesText::new(notes)))?;
        writer.write_event(Event::End(BytesEnd::new("notes")))?;
    }
    for cylinder in &dive.cylinders {
        write_cylinder(writer, cylinder)?;
    }
    for dc in &dive.computers {
        write_computer(writer, dc)?;
    }

    writer.write_event(Event::End(BytesEnd::new("dive")))?;
    Ok(())
}

/// Serialize a session to the native format. Dive order follows table order.
pub fn write_native(log: &DiveLog) -> ImportResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut root = BytesStart::new(ROOT);
    root.push_attribute(("program", env!("CARGO_PKG_NAME")));
    root.push_attribute(("version", "1"));
    writer.write_event(Event::Start(root))?;

    write_site_list(&mut writer, log)?;

    writer.write_event(Event::Start(BytesStart::new("dives")))?;
    for dive in &log.table {
        write_dive(&mut writer, dive)?;
    }
    writer.write_event(Event::End(BytesEnd::new("dives")))?;

    writer.write_event(Event::End(BytesEnd::new(ROOT)))?;

    let out = writer.into_inner();
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Serialize a session and write it to `path`.
pub fn save_native(log: &DiveLog, path: impl AsRef<Path>) -> ImportResult<()> {
    let xml = write_native(log)?;
    std::fs::write(path, xml)?;
    Ok(())
}
