//! The fixed six-step phase sequence of one configuration.

use crate::config::timing::settle;
use crate::config::{CommandSet, Configuration, SamplerConfig, SettleDelays};
use crate::monitor::{MonitoredResult, MonitoredRun};
use crate::record::{PhaseRecord, SIZE_QUERY_FAILED, Step, StepFailure, UNKNOWN_SIZE};
use crate::remote::{CommandResult, RemoteError, RemoteExecutor};
use crate::size::parse_database_size;
use snafu::{Location, ResultExt, Snafu};
use std::sync::Arc;

const LOGGED_OUTPUT_CHARS: usize = 200;

/// The transport went away while `step` was running.
#[derive(Debug, Snafu)]
#[snafu(display("Connection lost during {step}"))]
pub struct ConnectionLost {
    pub step: Step,
    source: RemoteError,
    #[snafu(implicit)]
    location: Location,
}

impl ConnectionLost {
    pub fn remote_error(&self) -> &RemoteError {
        &self.source
    }
}

/// What one configuration produced. The record is always present, even when
/// the connection was lost part way through.
#[derive(Debug)]
pub struct PhaseOutcome {
    pub record: PhaseRecord,
    pub connection_lost: Option<ConnectionLost>,
}

/// Runs fill, size measurement, backup, service stop, data wipe and restore
/// against the remote host, then restarts the service.
///
/// Steps 4 and 5 wipe service-wide state, so two sequences must never run
/// against the same host at once; `run` is only ever awaited one
/// configuration at a time by the orchestrator.
pub struct TestPhaseSequencer<E> {
    executor: Arc<E>,
    monitor: MonitoredRun<E>,
    commands: CommandSet,
    delays: SettleDelays,
}

impl<E: RemoteExecutor> TestPhaseSequencer<E> {
    pub fn new(
        executor: Arc<E>,
        commands: CommandSet,
        delays: SettleDelays,
        sampler: SamplerConfig,
    ) -> Self {
        Self {
            monitor: MonitoredRun::new(executor.clone(), sampler),
            executor,
            commands,
            delays,
        }
    }

    pub fn delays(&self) -> &SettleDelays {
        &self.delays
    }

    pub async fn run(&self, config: &Configuration) -> PhaseOutcome {
        let mut record = PhaseRecord::new(config);
        let connection_lost = self.run_steps(config, &mut record).await.err();
        PhaseOutcome {
            record,
            connection_lost,
        }
    }

    async fn run_steps(
        &self,
        config: &Configuration,
        record: &mut PhaseRecord,
    ) -> Result<(), ConnectionLost> {
        let label = config.label();

        let fill_command = self.commands.fill_command(config.scale_factor());
        let fill = self.monitored(Step::Fill, label, &fill_command).await?;
        note_monitored(record, Step::Fill, &fill);
        record.fill = Some(fill);
        settle(self.delays.between_steps).await;

        let size = self
            .plain(Step::MeasureSize, label, &self.commands.measure_size)
            .await?;
        record.database_size = if size.success() {
            parse_database_size(&size.output).unwrap_or_else(|| {
                tracing::warn!(
                    configuration = label,
                    output = %size.output_excerpt(LOGGED_OUTPUT_CHARS).trim(),
                    "Could not find a size in the size query output"
                );
                UNKNOWN_SIZE.to_string()
            })
        } else {
            note_failure(record, label, Step::MeasureSize, &size);
            SIZE_QUERY_FAILED.to_string()
        };
        tracing::info!(configuration = label, database_size = %record.database_size, "Measured database size");
        settle(self.delays.between_steps).await;

        let backup = self.monitored(Step::Backup, label, &self.commands.backup).await?;
        note_monitored(record, Step::Backup, &backup);
        record.backup = Some(backup);
        settle(self.delays.between_steps).await;

        for (step, command) in [
            (Step::StopService, &self.commands.stop_service),
            (Step::WipeData, &self.commands.wipe_data),
        ] {
            let result = self.plain(step, label, command).await?;
            if !result.success() {
                note_failure(record, label, step, &result);
                if step.aborts_configuration() {
                    record.aborted_at = Some(step);
                    tracing::error!(
                        configuration = label,
                        step = %step,
                        "Aborting configuration, continuing would be unsafe"
                    );
                    record.service_restarted = Some(self.restart_service(record, label).await?);
                    return Ok(());
                }
            }
            settle(self.delays.between_steps).await;
        }

        let restore = self.monitored(Step::Restore, label, &self.commands.restore).await;
        if let Ok(restore) = &restore {
            note_monitored(record, Step::Restore, restore);
        }
        // the restart runs whatever happened to the restore
        let restarted = self.restart_service(record, label).await;
        record.restore = Some(restore?);
        record.service_restarted = Some(restarted?);
        Ok(())
    }

    /// Best effort: a failed start is recorded but does not fail the sequence.
    async fn restart_service(
        &self,
        record: &mut PhaseRecord,
        label: &str,
    ) -> Result<bool, ConnectionLost> {
        let result = self
            .plain(Step::StartService, label, &self.commands.start_service)
            .await?;
        if !result.success() {
            note_failure(record, label, Step::StartService, &result);
            return Ok(false);
        }
        tracing::info!(configuration = label, "Service started");
        settle(self.delays.after_service_start).await;
        Ok(true)
    }

    async fn monitored(
        &self,
        step: Step,
        label: &str,
        command: &str,
    ) -> Result<MonitoredResult, ConnectionLost> {
        announce(step, label);
        self.monitor
            .run(command, &format!("{} ({label})", step.title()))
            .await
            .context(ConnectionLostSnafu { step })
    }

    async fn plain(
        &self,
        step: Step,
        label: &str,
        command: &str,
    ) -> Result<CommandResult, ConnectionLost> {
        announce(step, label);
        self.executor
            .run(command)
            .await
            .context(ConnectionLostSnafu { step })
    }
}

fn announce(step: Step, label: &str) {
    tracing::info!(
        configuration = label,
        step = %step,
        "[step {}/{}] {}",
        step.number(),
        Step::TOTAL,
        step.title()
    );
}

fn note_monitored(record: &mut PhaseRecord, step: Step, result: &MonitoredResult) {
    if !result.success() {
        record.failures.push(StepFailure {
            step,
            exit_status: result.exit_status,
        });
    }
}

fn note_failure(record: &mut PhaseRecord, label: &str, step: Step, result: &CommandResult) {
    tracing::warn!(
        configuration = label,
        step = %step,
        exit_status = result.exit_status,
        output = %result.output_excerpt(LOGGED_OUTPUT_CHARS).trim(),
        "Remote command failed"
    );
    record.failures.push(StepFailure {
        step,
        exit_status: result.exit_status,
    });
}
