//! Merge engine: reconciling two tables that may describe the same dives.
//!
//! Re-importing an overlapping range, or importing two computers' accounts of
//! one dive, must not duplicate entries. Two dives are merge candidates iff
//! their start timestamps fall within a tolerance window and at least one
//! dive-computer pair aligns by device identity or near-identical start time
//! (dives without any DC record fall back to timestamp-only candidacy).
//!
//! The merged table is built fully in a scratch structure and only then
//! committed, so a merge never partially mutates its destination. Given the
//! same inputs in the same order the output is identical across runs.

use crate::model::{Cylinder, Dive, DiveComputer, DiveLog, DiveTable, SiteId, SiteRegistry};

/// Merge tolerance: a tenth of the dive's duration, at least a minute.
fn tolerance_s(dive: &Dive) -> i64 {
    i64::from(dive.duration_s / 10).max(60)
}

fn computers_align(a: &Dive, b: &Dive, tol: i64) -> bool {
    if a.computers.is_empty() || b.computers.is_empty() {
        return true;
    }
    a.computers.iter().any(|da| {
        b.computers
            .iter()
            .any(|db| da.same_device(db) || (da.when - db.when).abs() <= tol)
    })
}

fn likely_same_dive(a: &Dive, b: &Dive) -> bool {
    let tol = tolerance_s(a).max(tolerance_s(b));
    (a.when - b.when).abs() <= tol && computers_align(a, b, tol)
}

/// Union `extra` into `into` under (size, gas mix) equality. Duplicate
/// cylinders collapse; pressure readings fill in from whichever side has
/// them, with the destination winning when both do.
fn merge_cylinders(into: &mut Vec<Cylinder>, extra: Vec<Cylinder>) {
    for cylinder in extra {
        match into.iter_mut().find(|c| c.same_type(&cylinder)) {
            Some(existing) => {
                if existing.start_mbar.is_none() {
                    existing.start_mbar = cylinder.start_mbar;
                }
                if existing.end_mbar.is_none() {
                    existing.end_mbar = cylinder.end_mbar;
                }
            }
            None => into.push(cylinder),
        }
    }
}

/// Concatenate DC records, deduplicating by device identity. An exactly
/// equal record is dropped; a same-device record replaces the kept one only
/// when it carries strictly more samples.
fn merge_computers(into: &mut Vec<DiveComputer>, extra: Vec<DiveComputer>) {
    for dc in extra {
        if into.iter().any(|existing| *existing == dc) {
            continue;
        }
        match into.iter_mut().find(|existing| existing.same_device(&dc)) {
            Some(existing) => {
                if dc.samples.len() > existing.samples.len() {
                    *existing = dc;
                }
            }
            None => into.push(dc),
        }
    }
}

fn site_has_name(sites: &SiteRegistry, id: Option<SiteId>) -> bool {
    id.and_then(|id| sites.get(id))
        .is_some_and(|site| !site.name.is_empty())
}

fn merge_option_max(a: Option<i32>, b: Option<i32>) -> Option<i32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}

fn merge_dives(mut a: Dive, b: Dive, sites: &SiteRegistry) -> Dive {
    a.number = a.number.or(b.number);
    a.when = a.when.min(b.when);
    a.duration_s = a.duration_s.max(b.duration_s);

    // Site references reconcile by identifier, preferring the first record
    // that carries a non-empty name.
    if !site_has_name(sites, a.site) && site_has_name(sites, b.site) {
        a.site = b.site;
    } else {
        a.site = a.site.or(b.site);
    }

    a.max_depth_mm = merge_option_max(a.max_depth_mm, b.max_depth_mm);
    a.mean_depth_mm = a.mean_depth_mm.or(b.mean_depth_mm);
    a.air_temp_mc = a.air_temp_mc.or(b.air_temp_mc);
    a.water_temp_mc = a.water_temp_mc.or(b.water_temp_mc);
    a.buddy = a.buddy.or(b.buddy);
    a.divemaster = a.divemaster.or(b.divemaster);
    a.suit = a.suit.or(b.suit);
    a.notes = a.notes.or(b.notes);
    a.weight = a.weight.or(b.weight);
    a.tags = a.tags.or(b.tags);

    merge_cylinders(&mut a.cylinders, b.cylinders);
    merge_computers(&mut a.computers, b.computers);
    a
}

/// Merge two tables into one, deduplicating dives, cylinders, sites and DC
/// sub-records. Non-candidates are kept as separate entries in timestamp
/// order.
pub fn merge_tables(a: DiveTable, b: DiveTable, sites: &SiteRegistry) -> DiveTable {
    let mut pending: Vec<Dive> = a.into_iter().collect();
    pending.extend(b);
    // Stable by timestamp: ties keep a-before-b input order, which is what
    // makes repeated runs byte-identical.
    pending.sort_by_key(|d| d.when);

    let mut scratch: Vec<Dive> = Vec::with_capacity(pending.len());
    for dive in pending {
        match scratch.last_mut() {
            Some(prev) if likely_same_dive(prev, &dive) => {
                let merged = merge_dives(prev.clone(), dive, sites);
                *prev = merged;
            }
            _ => scratch.push(dive),
        }
    }

    let mut out = DiveTable::default();
    for dive in scratch {
        out.push(dive);
    }
    out
}

impl DiveLog {
    /// Merge another session into this one: sites reconcile by identifier,
    /// then the dive tables merge. The incoming session is consumed.
    pub fn merge_in(&mut self, other: DiveLog) {
        for (id, site) in other.sites.iter() {
            let dest = self.sites.get_or_create(id);
            if dest.name.is_empty() {
                dest.name = site.name.clone();
            }
            if dest.gps.is_none() {
                dest.gps = site.gps;
            }
        }
        let existing = std::mem::take(&mut self.table);
        self.table = merge_tables(existing, other.table, &self.sites);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GasMix, Sample};

    fn dc(model: &str, when: i64, nsamples: usize) -> DiveComputer {
        DiveComputer {
            model: Some(model.to_string()),
            when,
            samples: (0..nsamples)
                .map(|i| Sample {
                    time_s: i as i32 * 10,
                    depth_mm: 5000,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn mixed_cylinder_dive(when: i64, model: &str, o2: i32) -> Dive {
        Dive {
            when,
            duration_s: 1800,
            cylinders: vec![Cylinder {
                size_ml: Some(12000),
                gas: GasMix {
                    o2_permille: o2,
                    he_permille: 0,
                },
                ..Default::default()
            }],
            computers: vec![dc(model, when, 3)],
            ..Default::default()
        }
    }

    #[test]
    fn same_dive_from_two_computers_merges_cylinders_and_dcs() {
        let sites = SiteRegistry::default();
        let mut a = DiveTable::default();
        a.push(mixed_cylinder_dive(1000, "OSTC", 320));
        let mut b = DiveTable::default();
        b.push(mixed_cylinder_dive(1020, "Vyper", 209));

        let merged = merge_tables(a, b, &sites);
        assert_eq!(merged.nr(), 1);
        let dive = merged.get(0).unwrap();
        assert_eq!(dive.cylinders.len(), 2);
        assert_eq!(dive.computers.len(), 2);
        assert_eq!(dive.when, 1000);
    }

    #[test]
    fn merge_is_idempotent() {
        let sites = SiteRegistry::default();
        let mut table = DiveTable::default();
        table.push(mixed_cylinder_dive(1000, "OSTC", 320));
        table.push(mixed_cylinder_dive(90_000, "OSTC", 320));

        let merged = merge_tables(table.clone(), table.clone(), &sites);
        assert_eq!(merged, table);
    }

    #[test]
    fn distant_dives_stay_separate() {
        let sites = SiteRegistry::default();
        let mut a = DiveTable::default();
        a.push(mixed_cylinder_dive(1000, "OSTC", 320));
        let mut b = DiveTable::default();
        b.push(mixed_cylinder_dive(10_000, "OSTC", 320));

        assert_eq!(merge_tables(a, b, &sites).nr(), 2);
    }

    #[test]
    fn duplicate_cylinders_collapse_and_pressure_fills_in() {
        let mut into = vec![Cylinder {
            size_ml: Some(12000),
            start_mbar: Some(200_000),
            ..Default::default()
        }];
        merge_cylinders(
            &mut into,
            vec![Cylinder {
                size_ml: Some(12000),
                start_mbar: Some(195_000),
                end_mbar: Some(50_000),
                ..Default::default()
            }],
        );
        assert_eq!(into.len(), 1);
        assert_eq!(into[0].start_mbar, Some(200_000));
        assert_eq!(into[0].end_mbar, Some(50_000));
    }

    #[test]
    fn same_device_keeps_the_fuller_record() {
        let mut into = vec![dc("OSTC", 1000, 2)];
        merge_computers(&mut into, vec![dc("OSTC", 1000, 5)]);
        assert_eq!(into.len(), 1);
        assert_eq!(into[0].samples.len(), 5);
    }

    #[test]
    fn site_with_name_wins() {
        let mut sites = SiteRegistry::default();
        let named = SiteId::of("Hälvälä", None);
        sites.get_or_create(named).name = "Hälvälä".to_string();
        let anon = SiteId::of("", Some((1, 2)));
        sites.get_or_create(anon).gps = Some((1, 2));

        let mut a = mixed_cylinder_dive(1000, "OSTC", 320);
        a.site = Some(anon);
        let mut b = mixed_cylinder_dive(1000, "OSTC", 320);
        b.site = Some(named);

        let merged = merge_dives(a, b, &sites);
        assert_eq!(merged.site, Some(named));
    }
}
