pub mod common;

use br_core::record::RecordRow;
use br_core::report::text_path_for;
use br_core::{ReportSink, ReportWriter, RunError, TestRunOrchestrator};
use common::*;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn read_rows(path: &Path) -> Vec<RecordRow> {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn report_is_valid_after_a_full_run() {
    setup_logging();
    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("results.json");
    let host = Arc::new(
        FakeHost::new()
            .cpu(45.0)
            .answer("fill", 0, 3.0)
            .answer("backup", 0, 30.0)
            .answer("restore", 0, 25.0),
    );

    let writer = ReportWriter::create(&json_path).unwrap();
    assert!(read_rows(&json_path).is_empty());

    let mut orchestrator = TestRunOrchestrator::new(sequencer(&host), writer);
    let run = orchestrator.run(&configurations(3)).await.unwrap();
    assert_eq!(run.report_files, orchestrator.sink().locations());

    let rows = read_rows(&json_path);
    let labels: Vec<&str> = rows.iter().map(|r| r.target_size.as_str()).collect();
    assert_eq!(labels, ["1GB", "2GB", "3GB"]);
    for row in &rows {
        assert_eq!(row.database_size, "2048 MB");
        assert_eq!(row.backup_time, Some(30.0));
        assert_eq!(row.backup_avg_cpu, Some(45.0));
        assert_eq!(row.restore_time, Some(25.0));
        assert_eq!(row.service_restarted, Some(true));
    }

    let text = std::fs::read_to_string(text_path_for(&json_path)).unwrap();
    assert_eq!(text.matches("Configuration: ").count(), 3);
    assert!(text.contains("Complete configurations: 1GB, 2GB, 3GB"));
    assert!(text.contains("Elapsed:     30.00 s (0m 30s)"));
}

#[tokio::test]
async fn abort_after_two_of_four_keeps_a_parseable_report() {
    setup_logging();
    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("results.json");
    let host = Arc::new(FakeHost::new().drop_connection_at("fill 30"));

    let writer = ReportWriter::create(&json_path).unwrap();
    let mut orchestrator = TestRunOrchestrator::new(sequencer(&host), writer);
    let err = orchestrator.run(&configurations(4)).await.unwrap_err();
    assert!(matches!(err, RunError::Connection { .. }));

    let rows = read_rows(&json_path);
    assert_eq!(rows.len(), 3);
    assert!(rows[0].restore_time.is_some());
    assert!(rows[1].restore_time.is_some());
    // the interrupted configuration is kept with nothing collected
    assert_eq!(rows[2].target_size, "3GB");
    assert!(rows[2].fill_time.is_none());
    assert!(!host.log().iter().any(|c| c.starts_with("fill 40")));

    let text = std::fs::read_to_string(text_path_for(&json_path)).unwrap();
    assert!(text.contains("Run aborted: Connection lost during fill in configuration 3GB"));
}

#[tokio::test]
async fn crash_without_finalize_keeps_every_appended_record() {
    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("out").join("results.json");
    let host = Arc::new(FakeHost::new());
    let sequencer = sequencer(&host);

    {
        let mut writer = ReportWriter::create(&json_path).unwrap();
        for config in configurations(2) {
            let outcome = sequencer.run(&config).await;
            writer.append(&outcome.record).unwrap();
            assert_eq!(read_rows(&json_path).len(), outcome.record.scale_factor as usize / 10);
        }
        // dropped here without finalize, as if the process died
    }

    let rows = read_rows(&json_path);
    assert_eq!(rows.len(), 2);
    let text = std::fs::read_to_string(text_path_for(&json_path)).unwrap();
    assert!(text.contains("Configuration: 2GB"));
    assert!(!text.contains("Summary"));
}

#[tokio::test]
async fn append_after_finalize_is_rejected() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::new());
    let writer = ReportWriter::create(dir.path().join("results.json")).unwrap();
    let mut orchestrator = TestRunOrchestrator::new(sequencer(&host), writer);
    let run = orchestrator.run(&configurations(1)).await.unwrap();

    let mut writer = orchestrator.into_sink();
    assert!(writer.append(&run.records[0]).is_err());
    assert!(writer.finalize(&run).is_err());
}
