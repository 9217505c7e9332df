use divelog_ingest::ingestion::dl7::{self, parse_dl7};
use divelog_ingest::model::DiveLog;
use divelog_ingest::native::{parse_native, write_native};
use divelog_ingest::ImportError;

const THREE_DIVES: &str = "\
FSH|^~<US>|ZXU|shearwater|
ZRH|^~<US>|ZXU|1||EN
ZDH|1|1|I|20100110094500|
ZDP{
|0.0|0.0|
|0.5|4.2|
|1.0|9.8|
|1.5|9.6|
ZDP}
ZDT|1|1||20100110100000|
ZDH|2|2|I|20100110120000|
ZDP{
|0.0|0.0|
|1.0|12.0|
ZDP}
ZDT|2|2||20100110123000|
ZDH|3|3|I|20100111083000|
ZDP{
|0.0|0.0|
|2.0|18.4|
|4.0|6.0|
ZDP}
ZDT|3|3||20100111090000|
";

#[test]
fn transfer_file_yields_one_dive_per_zdh() {
    let mut log = DiveLog::new();
    let added = parse_dl7(THREE_DIVES.as_bytes(), &dl7::default_mapping(), &mut log).unwrap();
    assert_eq!(added, 3);
    assert_eq!(log.table.nr(), 3);

    let first = log.table.get(0).unwrap();
    assert_eq!(first.number, Some(1));
    // 2010-01-10 09:45:00 UTC
    assert_eq!(first.when, 1_263_116_700);

    let dc = &first.computers[0];
    assert_eq!(dc.model.as_deref(), Some("DL7"));
    assert_eq!(dc.samples.len(), 4);
    // Profile times are decimal minutes.
    assert_eq!(dc.samples[1].time_s, 30);
    assert_eq!(dc.samples[1].depth_mm, 4200);

    // Duration and max depth derive from the profile.
    assert_eq!(first.duration_s, 90);
    assert_eq!(first.max_depth_mm, Some(9800));

    let third = log.table.get(2).unwrap();
    assert_eq!(third.number, Some(3));
    assert_eq!(third.max_depth_mm, Some(18400));

    // Everything the import produced survives a serialization cycle.
    let xml = write_native(&log).unwrap();
    let reread = parse_native(&xml).unwrap();
    assert_eq!(reread, log);
    assert_eq!(write_native(&reread).unwrap(), xml);
}

#[test]
fn header_magic_is_required() {
    let mut log = DiveLog::new();
    let err = parse_dl7(b"ZDH|1|1|I|20100110094500|\n", &dl7::default_mapping(), &mut log)
        .unwrap_err();
    assert!(matches!(err, ImportError::NotRecognized(_)));
}

#[test]
fn unterminated_profile_block_appends_nothing() {
    let data = "\
FSH|^~<US>|ZXU|shearwater|
ZDH|1|1|I|20100110094500|
ZDP{
|0.0|0.0|
|1.0|5.0|
";
    let mut log = DiveLog::new();
    let err = parse_dl7(data.as_bytes(), &dl7::default_mapping(), &mut log).unwrap_err();
    assert!(matches!(err, ImportError::Truncated { .. }));
    assert!(log.table.is_empty());
}

#[test]
fn hardware_label_overrides_the_default_model() {
    let mapping = divelog_ingest::ingestion::FieldMapping {
        hw: Some("Cobalt".to_string()),
        ..dl7::default_mapping()
    };
    let mut log = DiveLog::new();
    parse_dl7(THREE_DIVES.as_bytes(), &mapping, &mut log).unwrap();
    let dc = &log.table.get(0).unwrap().computers[0];
    assert_eq!(dc.model.as_deref(), Some("Cobalt"));
}
