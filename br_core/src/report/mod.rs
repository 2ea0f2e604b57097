//! Incremental report output: a JSON array and a human readable text file,
//! both updated after every configuration.

mod json;
mod text;

pub use json::JsonArrayReport;
pub use text::{TextReport, format_elapsed};

use crate::orchestrator::TestRun;
use crate::record::PhaseRecord;
use snafu::{Location, Snafu};
use std::path::{Path, PathBuf};

/// Destination for per-configuration records.
pub trait ReportSink {
    /// Persists one record before the next configuration starts.
    fn append(&mut self, record: &PhaseRecord) -> Result<(), ReportError>;

    /// Closes the run, adding the summary.
    fn finalize(&mut self, run: &TestRun) -> Result<(), ReportError>;

    /// Files written by this sink.
    fn locations(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReportError {
    #[snafu(display("Failed to create report file {}", path.display()))]
    Create {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to write report file {}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to serialize report record"))]
    Serialize {
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Report was already finalized"))]
    Finalized {
        #[snafu(implicit)]
        location: Location,
    },
}

/// The JSON report plus its text companion (`results.json` and
/// `results_report.txt`).
pub struct ReportWriter {
    json: JsonArrayReport,
    text: TextReport,
    finalized: bool,
}

impl ReportWriter {
    pub fn create(json_path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let json_path = json_path.as_ref();
        let text_path = text_path_for(json_path);
        Ok(Self {
            json: JsonArrayReport::create(json_path)?,
            text: TextReport::create(&text_path)?,
            finalized: false,
        })
    }

    pub fn json_path(&self) -> &Path {
        self.json.path()
    }

    pub fn text_path(&self) -> &Path {
        self.text.path()
    }
}

impl ReportSink for ReportWriter {
    fn append(&mut self, record: &PhaseRecord) -> Result<(), ReportError> {
        if self.finalized {
            return FinalizedSnafu.fail();
        }
        self.json.append(&record.to_row())?;
        self.text.append(record)?;
        tracing::debug!(
            configuration = %record.target_size,
            json = %self.json.path().display(),
            "Appended record to reports"
        );
        Ok(())
    }

    fn finalize(&mut self, run: &TestRun) -> Result<(), ReportError> {
        if self.finalized {
            return FinalizedSnafu.fail();
        }
        self.json.finalize()?;
        self.text.finalize(run)?;
        self.finalized = true;
        Ok(())
    }

    fn locations(&self) -> Vec<PathBuf> {
        vec![self.json.path().to_path_buf(), self.text.path().to_path_buf()]
    }
}

/// `results.json` -> `results_report.txt`; other names get the suffix appended.
pub fn text_path_for(json_path: &Path) -> PathBuf {
    let file_name = json_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.strip_suffix(".json").unwrap_or(&file_name);
    json_path.with_file_name(format!("{stem}_report.txt"))
}
