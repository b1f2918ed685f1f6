mod common;

use common::{at, epoch, CardBuilder, DetailBuilder, FlowBuilder, SummaryBuilder, SummaryFields};
use fpicon_parser::reader::FileCounts;
use fpicon_parser::{
    Channel, CpapMode, DeviceClock, DeviceOutcome, Error, IconImporter, MemoryProfile, SessionSink,
};
use std::path::Path;
use tempfile::tempdir;

const SERIAL: &str = "20121234";

fn importer() -> IconImporter {
    IconImporter::builder().clock(DeviceClock::Utc).build()
}

/// Two nights on one device: summary, detail, two flow files and a log.
fn write_device(card: CardBuilder, serial: &str) -> CardBuilder {
    let night1 = at(2012, 5, 14, 22, 30, 0);
    let night2 = at(2012, 5, 15, 23, 0, 0);

    let summary = SummaryBuilder::new()
        .record(SummaryFields::cpap(night1, 60, 80).events(2, 1))
        .record(SummaryFields::apap(night2, 45, 40, 120))
        .end()
        .build();

    let detail = DetailBuilder::new()
        .entry(night1, 0, 1)
        .entry(night2, 1, 1)
        .end_index()
        .sample(80, 10, 0, 0, 0)
        .sample(80, 11, 1, 0, 0)
        .sample(80, 12, 0, 0, 0)
        .sample(60, 20, 0, 1, 0)
        .sample(70, 21, 0, 0, 0)
        .sample(80, 22, 0, 0, 0)
        .build();

    let flow1 = FlowBuilder::new(at(2012, 5, 14, 22, 30, 2))
        .chunk(&[10, 20], 900, 1)
        .end_stream()
        .build();
    let flow2 = FlowBuilder::new(at(2012, 5, 15, 23, 0, 2))
        .chunk(&[30], 900, 1)
        .end_stream()
        .build();

    card.file(serial, "DET0001.FPH", &detail)
        .file(serial, "FLW0001.FPH", &flow1)
        .file(serial, "FLW0002.FPH", &flow2)
        .file(serial, "LOG0001.FPH", &[0u8; 600])
        .file(serial, "SUM0001.FPH", &summary)
        .file(serial, "notes.txt", b"not a record file")
}

#[test]
fn test_import_card_end_to_end() {
    let dir = tempdir().unwrap();
    write_device(CardBuilder::new(dir.path()), SERIAL);

    let mut profile = MemoryProfile::new();
    let summary = importer().import(dir.path(), &mut profile).unwrap();

    assert_eq!(
        summary.outcomes,
        vec![DeviceOutcome::Imported {
            serial: SERIAL.to_string(),
            sessions: 2
        }]
    );
    assert_eq!(summary.devices(), 1);
    assert_eq!(summary.sessions(), 2);

    let device = profile.device(SERIAL).unwrap();
    assert_eq!(device.info.brand, "Fisher & Paykel");
    assert_eq!(device.info.model, "ICON");
    assert_eq!(device.days().len(), 2);

    let night1 = &device.sessions[&epoch(at(2012, 5, 14, 22, 30, 0))];
    assert_eq!(night1.mode(), Some(CpapMode::Cpap));
    assert_eq!(night1.count(Channel::Obstructive), Some(2));
    assert_eq!(night1.sample_count(Channel::Pressure), 3);
    assert_eq!(night1.sample_count(Channel::Obstructive), 1);
    assert_eq!(night1.event_lists(Channel::FlowRate)[0].values, vec![10, 20]);

    let night2 = &device.sessions[&epoch(at(2012, 5, 15, 23, 0, 0))];
    assert_eq!(night2.mode(), Some(CpapMode::Apap));
    assert_eq!(
        night2.event_lists(Channel::Pressure)[0].values,
        vec![60, 70, 80]
    );
    assert_eq!(night2.sample_count(Channel::Hypopnea), 1);
    assert_eq!(night2.event_lists(Channel::FlowRate)[0].values, vec![30]);
}

#[test]
fn test_detail_files_run_after_summaries() {
    // DET0001 sorts before SUM0001 but still finds its sessions.
    let dir = tempdir().unwrap();
    let card = write_device(CardBuilder::new(dir.path()), SERIAL);

    let import = importer().import_device(card.device_dir(SERIAL)).unwrap();
    assert_eq!(import.store.len(), 2);
    assert!(import
        .store
        .iter()
        .all(|s| s.sample_count(Channel::Pressure) == 3));
}

#[test]
fn test_file_counts() {
    let dir = tempdir().unwrap();
    let card = write_device(CardBuilder::new(dir.path()), SERIAL);

    let import = importer().import_device(card.device_dir(SERIAL)).unwrap();
    assert_eq!(import.info.serial, SERIAL);
    assert_eq!(
        import.files,
        FileCounts {
            summary: 1,
            detail: 1,
            flow: 2,
            log: 1,
            failed: 0,
        }
    );
}

#[test]
fn test_short_file_does_not_stop_import() {
    let dir = tempdir().unwrap();
    let card = write_device(CardBuilder::new(dir.path()), SERIAL).file(SERIAL, "SUM0002.FPH", &[1, 2, 3]);

    let import = importer().import_device(card.device_dir(SERIAL)).unwrap();
    assert_eq!(import.files.summary, 2);
    assert_eq!(import.files.failed, 1);
    assert_eq!(import.store.len(), 2);
}

#[test]
fn test_overlapping_device_is_rejected() {
    let dir = tempdir().unwrap();
    let card = write_device(CardBuilder::new(dir.path()), "100");
    write_device(card, "200");

    let mut profile = MemoryProfile::new();
    let summary = importer().import(dir.path(), &mut profile).unwrap();

    assert_eq!(summary.devices(), 1);
    assert_eq!(summary.sessions(), 2);
    assert!(matches!(
        &summary.outcomes[1],
        DeviceOutcome::Rejected { serial, .. } if serial == "200"
    ));
    assert!(profile.device("100").is_some());
    assert!(profile.device("200").is_none());
    assert_eq!(profile.session_count(), 2);
}

#[test]
fn test_commit_reports_overlap() {
    let dir = tempdir().unwrap();
    let card = write_device(CardBuilder::new(dir.path()), "100");
    let card = write_device(card, "200");

    let importer = importer();
    let mut profile = MemoryProfile::new();
    let first = importer.import_device(card.device_dir("100")).unwrap();
    assert_eq!(importer.commit(first, &mut profile).unwrap(), 2);

    let second = importer.import_device(card.device_dir("200")).unwrap();
    let err = importer.commit(second, &mut profile).unwrap_err();
    match err {
        Error::OverlappingDays { serial, day } => {
            assert_eq!(serial, "200");
            assert_eq!(day, at(2012, 5, 14, 0, 0, 0).date());
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!profile.has_device("200"));
}

#[test]
fn test_reimport_adds_nothing() {
    let dir = tempdir().unwrap();
    write_device(CardBuilder::new(dir.path()), SERIAL);

    let mut profile = MemoryProfile::new();
    importer().import(dir.path(), &mut profile).unwrap();
    let again = importer().import(dir.path(), &mut profile).unwrap();

    assert_eq!(
        again.outcomes,
        vec![DeviceOutcome::Imported {
            serial: SERIAL.to_string(),
            sessions: 0
        }]
    );
    assert_eq!(profile.session_count(), 2);
}

#[test]
fn test_accepts_fphcare_and_icon_paths() {
    let dir = tempdir().unwrap();
    write_device(CardBuilder::new(dir.path()), SERIAL);

    for path in [
        dir.path().join("FPHCARE"),
        dir.path().join("FPHCARE").join("ICON"),
    ] {
        let mut profile = MemoryProfile::new();
        let summary = importer().import(&path, &mut profile).unwrap();
        assert_eq!(summary.sessions(), 2);
    }
}

#[test]
fn test_non_numeric_directories_are_ignored() {
    let dir = tempdir().unwrap();
    write_device(CardBuilder::new(dir.path()), "backup");

    let mut profile = MemoryProfile::new();
    let summary = importer().import(dir.path(), &mut profile).unwrap();
    assert!(summary.outcomes.is_empty());
    assert_eq!(profile.session_count(), 0);
}

#[test]
fn test_missing_icon_directory() {
    let dir = tempdir().unwrap();
    let mut profile = MemoryProfile::new();
    let result = importer().import(dir.path(), &mut profile);
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn test_device_without_summary_has_no_sessions() {
    let dir = tempdir().unwrap();
    let flow = FlowBuilder::new(at(2012, 5, 14, 22, 30, 2))
        .chunk(&[10, 20], 900, 1)
        .end_stream()
        .build();
    let card = CardBuilder::new(dir.path()).file(SERIAL, "FLW0001.FPH", &flow);

    let import = importer().import_device(card.device_dir(SERIAL)).unwrap();
    assert!(import.store.is_empty());
    assert_eq!(import.files.flow, 1);
}

fn assert_same_sessions(a: &MemoryProfile, b: &MemoryProfile) {
    let ids = |p: &MemoryProfile| -> Vec<(String, Vec<i64>)> {
        p.devices()
            .map(|d| (d.info.serial.clone(), d.sessions.keys().copied().collect()))
            .collect()
    };
    assert_eq!(ids(a), ids(b));
}

#[cfg(feature = "tokio-runtime")]
#[tokio::test]
async fn test_concurrent_import_matches_sequential() {
    let dir = tempdir().unwrap();
    let card = write_device(CardBuilder::new(dir.path()), "100");
    let card = write_device(card, "200");
    let night = at(2013, 2, 1, 22, 0, 0);
    card.file(
        "300",
        "SUM0001.FPH",
        &SummaryBuilder::new()
            .record(SummaryFields::cpap(night, 70, 90))
            .build(),
    );

    let mut sequential = MemoryProfile::new();
    let expected = importer().import(dir.path(), &mut sequential).unwrap();

    let mut concurrent = MemoryProfile::new();
    let summary = importer()
        .import_concurrent(dir.path(), &mut concurrent)
        .await
        .unwrap();

    assert_eq!(summary.outcomes, expected.outcomes);
    assert_eq!(summary.devices(), 2);
    assert_same_sessions(&sequential, &concurrent);
}

#[test]
fn test_profiles_are_independent() {
    let dir = tempdir().unwrap();
    write_device(CardBuilder::new(dir.path()), SERIAL);

    let mut a = MemoryProfile::new();
    let mut b = MemoryProfile::new();
    importer().import(dir.path(), &mut a).unwrap();
    importer().import(Path::new(dir.path()), &mut b).unwrap();
    assert_same_sessions(&a, &b);
}
