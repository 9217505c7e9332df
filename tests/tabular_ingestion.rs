use divelog_ingest::ingestion::tabular::{parse_manual, parse_profile, FieldMapping, Separator};
use divelog_ingest::model::DiveLog;
use divelog_ingest::ImportError;

fn manual_mapping() -> FieldMapping {
    FieldMapping {
        number: Some(0),
        date: Some(1),
        time: Some(2),
        duration: Some(3),
        maxdepth: Some(4),
        meandepth: Some(5),
        buddy: Some(6),
        suit: Some(7),
        ..Default::default()
    }
}

#[test]
fn manual_log_builds_summary_dives() {
    let text = "\
number,date,time,duration,maxdepth,meandepth,buddy,suit
1,2024-05-01,09:30,41:00,18.2,11.0,Alice,wet
2,2024-05-02,10:00,35:30,24.6,14.3,Bob,dry
";
    let mut log = DiveLog::new();
    let added = parse_manual(text, &manual_mapping(), &mut log).unwrap();
    assert_eq!(added, 2);
    assert_eq!(log.table.nr(), 2);

    let first = log.table.get(0).unwrap();
    assert_eq!(first.number, Some(1));
    assert_eq!(first.duration_s, 41 * 60);
    assert_eq!(first.max_depth_mm, Some(18200));
    assert_eq!(first.mean_depth_mm, Some(11000));
    assert_eq!(first.buddy.as_deref(), Some("Alice"));
    assert_eq!(first.suit.as_deref(), Some("wet"));

    // Unmapped columns leave the attributes unset.
    assert_eq!(first.site, None);
    assert_eq!(first.divemaster, None);
    assert_eq!(first.notes, None);
    assert_eq!(first.weight, None);
    assert_eq!(first.tags, None);
    assert!(log.sites.is_empty());
}

#[test]
fn malformed_cell_degrades_to_unset() {
    let text = "\
number,date,time,duration,maxdepth,meandepth,buddy,suit
1,2024-05-01,09:30,41:00,not-a-depth,11.0,Alice,wet
";
    let mut log = DiveLog::new();
    assert_eq!(parse_manual(text, &manual_mapping(), &mut log).unwrap(), 1);
    let dive = log.table.get(0).unwrap();
    assert_eq!(dive.max_depth_mm, None);
    assert_eq!(dive.mean_depth_mm, Some(11000));
}

#[test]
fn out_of_range_mapping_fails_before_appending() {
    let mapping = FieldMapping {
        number: Some(12),
        ..Default::default()
    };
    let text = "a,b\n1,2\n";
    let mut log = DiveLog::new();
    let err = parse_manual(text, &mapping, &mut log).unwrap_err();
    assert!(matches!(
        err,
        ImportError::FieldMappingInvalid {
            field: "number",
            index: 12,
            ..
        }
    ));
    assert!(log.table.is_empty());
}

#[test]
fn profile_rows_group_into_dives_by_key() {
    let mapping = FieldMapping {
        number: Some(0),
        date: Some(1),
        time: Some(2),
        depth: Some(3),
        separator: Separator::Semicolon,
        ..Default::default()
    };
    let text = "\
number;date;time;depth
1;2024-05-01;0:10;3.0
1;2024-05-01;0:20;6.5
1;2024-05-01;0:30;4.0
2;2024-05-02;0:10;5.0
2;2024-05-02;0:20;2.0
";
    let mut log = DiveLog::new();
    assert_eq!(parse_profile(text, &mapping, &mut log).unwrap(), 2);

    let first = log.table.get(0).unwrap();
    assert_eq!(first.computers.len(), 1);
    assert_eq!(first.computers[0].samples.len(), 3);
    // Duration and max depth derive from the profile.
    assert_eq!(first.duration_s, 30);
    assert_eq!(first.max_depth_mm, Some(6500));

    let second = log.table.get(1).unwrap();
    assert_eq!(second.computers[0].samples.len(), 2);
}
