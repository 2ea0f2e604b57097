//! Per-configuration results and their report representation.

use crate::config::Configuration;
use crate::monitor::MonitoredResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stored when the size query succeeded but its output had no recognisable size.
pub const UNKNOWN_SIZE: &str = "unknown";
/// Stored when the size query itself exited non-zero.
pub const SIZE_QUERY_FAILED: &str = "error";

/// The fixed steps of one configuration, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    Fill,
    MeasureSize,
    Backup,
    StopService,
    WipeData,
    Restore,
    StartService,
}

impl Step {
    pub const TOTAL: u8 = 6;

    /// Position in the six-step sequence; the service restart belongs to step 6.
    pub fn number(self) -> u8 {
        match self {
            Step::Fill => 1,
            Step::MeasureSize => 2,
            Step::Backup => 3,
            Step::StopService => 4,
            Step::WipeData => 5,
            Step::Restore | Step::StartService => 6,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Fill => "Fill",
            Step::MeasureSize => "Measure size",
            Step::Backup => "Backup",
            Step::StopService => "Stop service",
            Step::WipeData => "Wipe data directory",
            Step::Restore => "Restore",
            Step::StartService => "Start service",
        }
    }

    /// Steps after which the remaining sequence would be unsafe if they failed.
    pub fn aborts_configuration(self) -> bool {
        matches!(self, Step::StopService | Step::WipeData)
    }
}

/// A step whose command exited non-zero or timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: Step,
    pub exit_status: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PhaseStatus {
    /// Every step ran (some may still have exited non-zero).
    Complete,
    /// The sequence stopped early; later fields are missing.
    Partial,
}

/// Everything collected for one configuration. Built by the sequencer and
/// never changed once handed to the report.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRecord {
    pub target_size: String,
    pub scale_factor: u32,
    pub database_size: String,
    pub timestamp: DateTime<Utc>,
    pub fill: Option<MonitoredResult>,
    pub backup: Option<MonitoredResult>,
    pub restore: Option<MonitoredResult>,
    pub failures: Vec<StepFailure>,
    pub aborted_at: Option<Step>,
    /// `None` when the restart was never attempted.
    pub service_restarted: Option<bool>,
}

impl PhaseRecord {
    pub fn new(config: &Configuration) -> Self {
        Self {
            target_size: config.label().to_string(),
            scale_factor: config.scale_factor(),
            database_size: UNKNOWN_SIZE.to_string(),
            timestamp: Utc::now(),
            fill: None,
            backup: None,
            restore: None,
            failures: Vec::new(),
            aborted_at: None,
            service_restarted: None,
        }
    }

    pub fn status(&self) -> PhaseStatus {
        if self.aborted_at.is_some() {
            PhaseStatus::Partial
        } else {
            PhaseStatus::Complete
        }
    }

    pub fn to_row(&self) -> RecordRow {
        RecordRow {
            target_size: self.target_size.clone(),
            scale_factor: self.scale_factor,
            database_size: self.database_size.clone(),
            timestamp: self.timestamp,
            status: self.status(),
            aborted_at: self.aborted_at,
            failed_steps: self.failures.iter().map(|f| f.step).collect(),
            fill_time: self.fill.as_ref().map(|r| r.elapsed_seconds),
            fill_avg_cpu: self.fill.as_ref().and_then(|r| r.average_cpu_percent),
            backup_time: self.backup.as_ref().map(|r| r.elapsed_seconds),
            backup_avg_cpu: self.backup.as_ref().and_then(|r| r.average_cpu_percent),
            backup_max_cpu: self.backup.as_ref().and_then(|r| r.peak_cpu_percent),
            backup_exit_status: self.backup.as_ref().map(|r| r.exit_status),
            restore_time: self.restore.as_ref().map(|r| r.elapsed_seconds),
            restore_avg_cpu: self.restore.as_ref().and_then(|r| r.average_cpu_percent),
            restore_max_cpu: self.restore.as_ref().and_then(|r| r.peak_cpu_percent),
            restore_exit_status: self.restore.as_ref().map(|r| r.exit_status),
            service_restarted: self.service_restarted,
        }
    }
}

/// One object of the structured report. Missing timings are explicit `null`s;
/// CPU figures are omitted when no sample was available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub target_size: String,
    pub scale_factor: u32,
    pub database_size: String,
    pub timestamp: DateTime<Utc>,
    pub status: PhaseStatus,
    pub aborted_at: Option<Step>,
    pub failed_steps: Vec<Step>,
    pub fill_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_avg_cpu: Option<f64>,
    pub backup_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_avg_cpu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_max_cpu: Option<f64>,
    pub backup_exit_status: Option<i32>,
    pub restore_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_avg_cpu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_max_cpu: Option<f64>,
    pub restore_exit_status: Option<i32>,
    pub service_restarted: Option<bool>,
}
