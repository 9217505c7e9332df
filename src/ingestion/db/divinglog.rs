//! DivingLog 5.x adapter.
//!
//! DivingLog stores everything in one wide `Logbook` table: local date and
//! entry time as text, duration in minutes, metric depths and pressures,
//! percent gas fractions, and free-text place/buddy/divemaster columns.

use std::path::Path;

use rusqlite::Connection;

use crate::builder::{self, DateFormat};
use crate::error::ImportResult;
use crate::model::{Cylinder, Dive, DiveComputer, DiveLog, GasMix, O2_IN_AIR};

use super::{require_tables, schema_mismatch, DbImportOptions};

const LOGBOOK_QUERY: &str = "SELECT Number, Divedate, Entrytime, Divetime, Depth, Watertemp, \
     Airtemp, Tanksize, PresS, PresE, O2, He, Place, Buddy, Divemaster, Comments, Suit, \
     Computer FROM Logbook ORDER BY Divedate, Entrytime";

fn get_f64(row: &rusqlite::Row<'_>, idx: usize) -> Option<f64> {
    row.get::<_, Option<f64>>(idx).ok().flatten()
}

fn get_text(row: &rusqlite::Row<'_>, idx: usize) -> Option<String> {
    row.get::<_, Option<String>>(idx)
        .ok()
        .flatten()
        .filter(|s| !s.trim().is_empty())
}

fn logbook_cylinder(row: &rusqlite::Row<'_>) -> Option<Cylinder> {
    let size_l = get_f64(row, 7);
    let start_bar = get_f64(row, 8);
    let end_bar = get_f64(row, 9);
    let o2_pct = get_f64(row, 10);
    let he_pct = get_f64(row, 11);
    if size_l.is_none()
        && start_bar.is_none()
        && end_bar.is_none()
        && o2_pct.is_none()
        && he_pct.is_none()
    {
        return None;
    }
    Some(Cylinder {
        size_ml: size_l.and_then(builder::l_to_ml),
        gas: GasMix {
            o2_permille: o2_pct
                .map(|v| (v * 10.0).round() as i32)
                .filter(|&v| v > 0)
                .unwrap_or(O2_IN_AIR),
            he_permille: he_pct.map(|v| (v * 10.0).round() as i32).unwrap_or(0),
        },
        start_mbar: start_bar.and_then(builder::bar_to_mbar),
        end_mbar: end_bar.and_then(builder::bar_to_mbar),
    })
}

/// Import every dive from an open DivingLog store into the session.
pub fn parse_divinglog(
    conn: &Connection,
    opts: &DbImportOptions<'_>,
    log: &mut DiveLog,
) -> ImportResult<usize> {
    require_tables(conn, &["Logbook"])?;

    let mut stmt = conn.prepare(LOGBOOK_QUERY).map_err(schema_mismatch)?;
    let mut rows = stmt.query([])?;

    // Sites resolve into the staged session too, so a scan failure after
    // the first row cannot leave stray registry entries behind.
    let mut staged = DiveLog::new();
    let mut seen = 0usize;
    while let Some(row) = rows.next()? {
        if opts.cancelled() {
            break;
        }
        seen += 1;
        opts.report(seen);

        let model = get_text(row, 17);
        if !opts.device_matches(model.as_deref()) {
            continue;
        }

        let when = get_text(row, 1)
            .and_then(|date| {
                builder::parse_date_time(
                    &date,
                    get_text(row, 2).as_deref(),
                    DateFormat::YyyyMmDd,
                )
            })
            .unwrap_or(0);

        let mut dive = Dive {
            number: row
                .get::<_, Option<i64>>(0)
                .ok()
                .flatten()
                .map(|n| n as i32),
            when,
            // Divetime is minutes.
            duration_s: get_f64(row, 3).map(|v| (v * 60.0).round() as i32).unwrap_or(0),
            max_depth_mm: get_f64(row, 4).and_then(builder::m_to_mm),
            water_temp_mc: get_f64(row, 5).and_then(builder::c_to_mc),
            air_temp_mc: get_f64(row, 6).and_then(builder::c_to_mc),
            buddy: get_text(row, 13),
            divemaster: get_text(row, 14),
            notes: get_text(row, 15),
            suit: get_text(row, 16),
            ..Default::default()
        };

        let place = get_text(row, 12).unwrap_or_default();
        dive.site = builder::resolve_site(&mut staged, &place, None);

        if let Some(cylinder) = logbook_cylinder(row) {
            dive.cylinders.push(cylinder);
        }
        if let Some(model) = model {
            dive.computers.push(DiveComputer {
                model: Some(model),
                when,
                ..Default::default()
            });
        }
        staged.table.push(dive);
    }

    let added = staged.table.nr();
    log.absorb(staged);
    Ok(added)
}

/// Open a DivingLog store at `path` and import it.
pub fn parse_divinglog_file(
    path: impl AsRef<Path>,
    opts: &DbImportOptions<'_>,
    log: &mut DiveLog,
) -> ImportResult<usize> {
    let conn = super::open_store(path)?;
    parse_divinglog(&conn, opts, log)
}
