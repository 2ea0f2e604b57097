//! Drives the configurations of one benchmark run, in order, into a report.

use crate::config::Configuration;
use crate::config::timing::settle;
use crate::record::{PhaseRecord, PhaseStatus};
use crate::remote::RemoteExecutor;
use crate::report::{ReportError, ReportSink};
use crate::sequencer::{ConnectionLost, TestPhaseSequencer};
use chrono::{DateTime, Utc};
use snafu::{Location, ResultExt, Snafu};
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RunError {
    #[snafu(display("Run aborted in configuration {configuration}"))]
    Connection {
        configuration: String,
        source: ConnectionLost,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to write the report"))]
    Report {
        source: ReportError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// The records of a run so far, in configuration order.
#[derive(Debug, Clone)]
pub struct TestRun {
    pub started_at: DateTime<Utc>,
    pub records: Vec<PhaseRecord>,
    /// Set when the run stopped before the last configuration.
    pub abort_reason: Option<String>,
    pub report_files: Vec<PathBuf>,
}

impl TestRun {
    fn new(report_files: Vec<PathBuf>) -> Self {
        Self {
            started_at: Utc::now(),
            records: Vec::new(),
            abort_reason: None,
            report_files,
        }
    }

    pub fn completed_configurations(&self) -> Vec<&str> {
        self.labels_with(PhaseStatus::Complete)
    }

    pub fn partial_configurations(&self) -> Vec<&str> {
        self.labels_with(PhaseStatus::Partial)
    }

    fn labels_with(&self, status: PhaseStatus) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.status() == status)
            .map(|r| r.target_size.as_str())
            .collect()
    }
}

/// Runs every configuration exactly once, in order, writing each record to
/// the sink before the next configuration starts.
///
/// `run` takes `&mut self` so one orchestrator can never drive two runs at
/// once; configurations share the remote data directory and service.
pub struct TestRunOrchestrator<E, S> {
    sequencer: TestPhaseSequencer<E>,
    sink: S,
}

impl<E: RemoteExecutor, S: ReportSink> TestRunOrchestrator<E, S> {
    pub fn new(sequencer: TestPhaseSequencer<E>, sink: S) -> Self {
        Self { sequencer, sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub async fn run(&mut self, configs: &[Configuration]) -> Result<TestRun, RunError> {
        let mut run = TestRun::new(self.sink.locations());
        tracing::info!(configurations = configs.len(), "Starting benchmark run");

        for (index, config) in configs.iter().enumerate() {
            if index > 0 {
                settle(self.sequencer.delays().between_configurations).await;
            }
            tracing::info!(
                configuration = config.label(),
                scale_factor = config.scale_factor(),
                "Configuration {}/{}",
                index + 1,
                configs.len()
            );

            let outcome = self.sequencer.run(config).await;
            self.sink.append(&outcome.record).context(ReportSnafu)?;
            log_record(&outcome.record);
            run.records.push(outcome.record);

            if let Some(lost) = outcome.connection_lost {
                tracing::error!(
                    configuration = config.label(),
                    step = %lost.step,
                    error = %lost.remote_error(),
                    "Connection lost, aborting run"
                );
                run.abort_reason = Some(format!("{lost} in configuration {}", config.label()));
                if let Err(e) = self.sink.finalize(&run) {
                    tracing::error!(error = %e, "Failed to finalize report after abort");
                }
                return Err(lost).context(ConnectionSnafu {
                    configuration: config.label(),
                });
            }
        }

        self.sink.finalize(&run).context(ReportSnafu)?;
        tracing::info!(
            complete = run.completed_configurations().len(),
            partial = run.partial_configurations().len(),
            "Benchmark run finished"
        );
        Ok(run)
    }
}

fn log_record(record: &PhaseRecord) {
    match record.aborted_at {
        Some(step) => tracing::warn!(
            configuration = %record.target_size,
            step = %step,
            "Configuration aborted, continuing with the next one"
        ),
        None if !record.failures.is_empty() => tracing::warn!(
            configuration = %record.target_size,
            failed_steps = record.failures.len(),
            "Configuration finished with failed steps"
        ),
        None => tracing::info!(configuration = %record.target_size, "Configuration finished"),
    }
}
