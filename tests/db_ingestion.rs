use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rusqlite::Connection;
use tempfile::TempDir;

use divelog_ingest::ingestion::db::{
    divinglog::{parse_divinglog, parse_divinglog_file},
    dm4::parse_dm4_file,
    dm5::parse_dm5_file,
    DbImportOptions,
};
use divelog_ingest::ingestion::detect::{detect_path, ImportFormat};
use divelog_ingest::model::DiveLog;
use divelog_ingest::ImportError;

fn f32_blob(values: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(values.len() * 4);
    for v in values {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

fn write_dm4(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Dive (
             DiveNumber INTEGER, StartTime INTEGER, Duration INTEGER,
             MaxDepth REAL, AvgDepth REAL, SampleInterval INTEGER,
             Note TEXT, Source TEXT, SourceSerialNumber TEXT,
             ProfileBlob BLOB, TemperatureBlob BLOB
         );",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO Dive VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            12,
            1_400_000_000i64,
            1800,
            24.5f64,
            14.0f64,
            10,
            "house reef",
            "Suunto D9",
            "1234",
            f32_blob(&[0.0, 12.0, 24.5, 6.0]),
            f32_blob(&[21.0, 20.5, 19.0, 20.0]),
        ],
    )
    .unwrap();
}

fn write_dm5(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Dive (
             DiveId INTEGER, DiveNumber INTEGER, StartTime INTEGER, Duration INTEGER,
             MaxDepth REAL, AvgDepth REAL, Note TEXT, Source TEXT, SourceSerialNumber TEXT
         );
         CREATE TABLE DiveSamples (
             DiveId INTEGER, Time INTEGER, Depth REAL, Temperature REAL, Pressure REAL
         );",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO Dive VALUES (1, 3, 1500000000, 2400, 31.0, 18.5, NULL, 'EON Steel', '77')",
        [],
    )
    .unwrap();
    for (t, d, temp, bar) in [(0, 0.0, 22.0, 200.0), (20, 15.5, 21.0, 190.0), (40, 31.0, 19.5, 180.0)] {
        conn.execute(
            "INSERT INTO DiveSamples VALUES (1, ?1, ?2, ?3, ?4)",
            rusqlite::params![t, d, temp, bar],
        )
        .unwrap();
    }
}

fn write_divinglog(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE Logbook (
             Number INTEGER, Divedate TEXT, Entrytime TEXT, Divetime REAL,
             Depth REAL, Watertemp REAL, Airtemp REAL, Tanksize REAL,
             PresS REAL, PresE REAL, O2 REAL, He REAL,
             Place TEXT, Buddy TEXT, Divemaster TEXT, Comments TEXT,
             Suit TEXT, Computer TEXT
         );",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO Logbook VALUES (7, '2010-03-15', '09:45:00', 42.0, 28.2, 24.0, 29.0,
             12.0, 200.0, 50.0, 32.0, 0.0, 'Blue Hole', 'Alice', 'Marco', 'nice wall', 'wet', 'OSTC')",
        [],
    )
    .unwrap();
}

#[test]
fn dm4_profile_blobs_become_samples() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trip.sde");
    write_dm4(&path);

    let mut log = DiveLog::new();
    let added = parse_dm4_file(&path, &DbImportOptions::default(), &mut log).unwrap();
    assert_eq!(added, 1);

    let dive = log.table.get(0).unwrap();
    assert_eq!(dive.number, Some(12));
    assert_eq!(dive.when, 1_400_000_000);
    assert_eq!(dive.duration_s, 1800);
    assert_eq!(dive.max_depth_mm, Some(24500));
    assert_eq!(dive.notes.as_deref(), Some("house reef"));

    let dc = &dive.computers[0];
    assert_eq!(dc.model.as_deref(), Some("Suunto D9"));
    assert_eq!(dc.serial.as_deref(), Some("1234"));
    assert_eq!(dc.samples.len(), 4);
    assert_eq!(dc.samples[2].time_s, 20);
    assert_eq!(dc.samples[2].depth_mm, 24500);
    assert_eq!(dc.samples[2].temperature_mc, Some(19000));
}

#[test]
fn dm5_samples_come_from_the_sample_relation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trip5.sde");
    write_dm5(&path);

    let mut log = DiveLog::new();
    assert_eq!(
        parse_dm5_file(&path, &DbImportOptions::default(), &mut log).unwrap(),
        1
    );
    let dive = log.table.get(0).unwrap();
    assert_eq!(dive.number, Some(3));
    assert_eq!(dive.notes, None);

    let dc = &dive.computers[0];
    assert_eq!(dc.model.as_deref(), Some("EON Steel"));
    assert_eq!(dc.samples.len(), 3);
    assert_eq!(dc.samples[1].time_s, 20);
    assert_eq!(dc.samples[1].depth_mm, 15500);
    assert_eq!(dc.samples[1].pressure_mbar, Some(190_000));
}

#[test]
fn divinglog_row_maps_summary_site_and_cylinder() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logbook.sql");
    write_divinglog(&path);

    let mut log = DiveLog::new();
    assert_eq!(
        parse_divinglog_file(&path, &DbImportOptions::default(), &mut log).unwrap(),
        1
    );
    let dive = log.table.get(0).unwrap();
    assert_eq!(dive.number, Some(7));
    assert_eq!(dive.duration_s, 42 * 60);
    assert_eq!(dive.max_depth_mm, Some(28200));
    assert_eq!(dive.water_temp_mc, Some(24000));
    assert_eq!(dive.buddy.as_deref(), Some("Alice"));
    assert_eq!(dive.suit.as_deref(), Some("wet"));

    let site = dive.site.and_then(|id| log.sites.get(id)).unwrap();
    assert_eq!(site.name, "Blue Hole");

    let cyl = &dive.cylinders[0];
    assert_eq!(cyl.size_ml, Some(12000));
    assert_eq!(cyl.start_mbar, Some(200_000));
    assert_eq!(cyl.end_mbar, Some(50_000));
    assert_eq!(cyl.gas.o2_permille, 320);
    assert_eq!(cyl.gas.he_permille, 0);
}

#[test]
fn device_filter_skips_other_sources() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trip.sde");
    write_dm4(&path);

    let opts = DbImportOptions {
        device_filter: Some("Vyper"),
        ..Default::default()
    };
    let mut log = DiveLog::new();
    assert_eq!(parse_dm4_file(&path, &opts, &mut log).unwrap(), 0);
    assert!(log.table.is_empty());
}

#[test]
fn progress_reports_and_cancel_keeps_partial_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trip5.sde");
    write_dm5(&path);
    // A second dive so cancellation after the first row is observable.
    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO Dive VALUES (2, 4, 1500100000, 1200, 12.0, 8.0, NULL, 'EON Steel', '77')",
        [],
    )
    .unwrap();
    drop(conn);

    let rows_seen = AtomicUsize::new(0);
    let cancel = AtomicBool::new(false);
    let progress = |_rows: usize| {
        rows_seen.fetch_add(1, Ordering::SeqCst);
        cancel.store(true, Ordering::SeqCst);
    };
    let opts = DbImportOptions {
        progress: Some(&progress),
        cancel: Some(&cancel),
        ..Default::default()
    };

    let mut log = DiveLog::new();
    let added = parse_dm5_file(&path, &opts, &mut log).unwrap();
    assert_eq!(added, 1);
    assert_eq!(rows_seen.load(Ordering::SeqCst), 1);
    assert_eq!(log.table.nr(), 1);
}

#[test]
fn mid_scan_failure_leaves_the_session_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logbook.sql");
    write_divinglog(&path);
    let conn = Connection::open(&path).unwrap();
    // A second row so the cursor has a step left after the first one.
    conn.execute(
        "INSERT INTO Logbook VALUES (8, '2010-03-16', '10:00:00', 35.0, 19.0, 24.0, 28.0,
             12.0, 210.0, 60.0, 32.0, 0.0, 'Canyon', NULL, NULL, NULL, NULL, 'OSTC')",
        [],
    )
    .unwrap();

    // Interrupt the running statement from the progress callback: the first
    // row is processed (its 'Blue Hole' site resolved), then the next cursor
    // step fails. Neither the dive nor the site may reach the session.
    let handle = conn.get_interrupt_handle();
    let progress = move |_rows: usize| handle.interrupt();
    let opts = DbImportOptions {
        progress: Some(&progress),
        ..Default::default()
    };

    let mut log = DiveLog::new();
    let err = parse_divinglog(&conn, &opts, &mut log).unwrap_err();
    assert!(matches!(err, ImportError::Sqlite(_)));
    assert!(log.table.is_empty());
    assert!(log.sites.is_empty());
}

#[test]
fn missing_schema_is_a_mismatch_and_leaves_the_table_alone() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.sde");
    Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE Unrelated (x INTEGER);")
        .unwrap();

    let mut log = DiveLog::new();
    let err = parse_dm4_file(&path, &DbImportOptions::default(), &mut log).unwrap_err();
    assert!(matches!(err, ImportError::SchemaMismatch { .. }));
    assert!(log.table.is_empty());
}

#[test]
fn store_flavors_are_told_apart_by_table_layout() {
    let dir = TempDir::new().unwrap();

    let dm4 = dir.path().join("a.sde");
    write_dm4(&dm4);
    assert_eq!(detect_path(&dm4).unwrap(), Some(ImportFormat::Dm4));

    let dm5 = dir.path().join("b.sde");
    write_dm5(&dm5);
    assert_eq!(detect_path(&dm5).unwrap(), Some(ImportFormat::Dm5));

    let dl = dir.path().join("c.sql");
    write_divinglog(&dl);
    assert_eq!(detect_path(&dl).unwrap(), Some(ImportFormat::DivingLog));
}
