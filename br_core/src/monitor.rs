//! Running one remote command under concurrent CPU sampling.

use crate::config::SamplerConfig;
use crate::remote::{RemoteError, RemoteExecutor};
use crate::sampler::{CpuSample, CpuSampler};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const OUTPUT_EXCERPT_CHARS: usize = 500;
const LOGGED_OUTPUT_CHARS: usize = 200;

/// Timing and CPU figures of one monitored command.
///
/// `elapsed_seconds` comes from the command itself and is present even when
/// sampling failed; the CPU figures are `None` when no sample was collected.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredResult {
    pub elapsed_seconds: f64,
    pub average_cpu_percent: Option<f64>,
    pub peak_cpu_percent: Option<f64>,
    pub sample_count: usize,
    pub exit_status: i32,
    pub timed_out: bool,
    /// Start of the combined output, kept for the report of a failed step.
    pub output_excerpt: String,
}

impl MonitoredResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0 && !self.timed_out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CpuSummary {
    pub average: Option<f64>,
    pub peak: Option<f64>,
    pub samples: usize,
}

impl CpuSummary {
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a CpuSample>) -> Self {
        let values: Vec<f64> = samples.into_iter().map(|s| s.value).collect();
        if values.is_empty() {
            return Self::default();
        }
        let sum: f64 = values.iter().sum();
        let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            average: Some(sum / values.len() as f64),
            peak: Some(peak),
            samples: values.len(),
        }
    }
}

/// Reduces the samples falling inside the command's window, widened by
/// `tolerance` on both sides.
///
/// Samples carry the remote clock while the window uses the local one. When
/// skew pushes every sample outside the window, all of them are used instead.
pub fn summarize_window(
    samples: &[CpuSample],
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    tolerance: Duration,
) -> CpuSummary {
    let slack = chrono::Duration::from_std(tolerance).unwrap_or_else(|_| chrono::Duration::zero());
    let from = started_at - slack;
    let to = ended_at + slack;
    let in_window: Vec<&CpuSample> = samples
        .iter()
        .filter(|s| s.collected_at >= from && s.collected_at <= to)
        .collect();
    if in_window.is_empty() && !samples.is_empty() {
        tracing::debug!(
            samples = samples.len(),
            "No CPU sample inside the command window, assuming clock skew"
        );
        return CpuSummary::from_samples(samples);
    }
    CpuSummary::from_samples(in_window)
}

/// Starts the sampler, runs the command, stops the sampler.
///
/// Sampling is best effort: a sampler that cannot start only costs the CPU
/// figures. A lost connection is propagated once the sampler has been stopped.
pub struct MonitoredRun<E> {
    executor: Arc<E>,
    sampler: CpuSampler<E>,
    window_tolerance: Duration,
}

impl<E: RemoteExecutor> MonitoredRun<E> {
    pub fn new(executor: Arc<E>, config: SamplerConfig) -> Self {
        let window_tolerance = config.window_tolerance;
        Self {
            sampler: CpuSampler::new(executor.clone(), config),
            executor,
            window_tolerance,
        }
    }

    pub async fn run(
        &self,
        command: &str,
        description: &str,
    ) -> Result<MonitoredResult, RemoteError> {
        tracing::info!(
            host = self.executor.host(),
            step = description,
            "Starting monitored command"
        );
        let handle = match self.sampler.start().await {
            Ok(handle) => {
                tracing::debug!(
                    step = description,
                    pid = handle.pid(),
                    buffer = handle.buffer(),
                    "Sampling CPU"
                );
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(step = description, "CPU sampling unavailable: {e}");
                None
            }
        };

        let outcome = self.executor.run(command).await;

        let samples = match handle {
            Some(handle) => self.sampler.stop(handle).await,
            None => Vec::new(),
        };
        let result = outcome?;

        let cpu = summarize_window(
            &samples,
            result.started_at,
            result.ended_at,
            self.window_tolerance,
        );
        let monitored = MonitoredResult {
            elapsed_seconds: result.elapsed.as_secs_f64(),
            average_cpu_percent: cpu.average,
            peak_cpu_percent: cpu.peak,
            sample_count: cpu.samples,
            exit_status: result.exit_status,
            timed_out: result.timed_out,
            output_excerpt: result.output_excerpt(OUTPUT_EXCERPT_CHARS),
        };

        if monitored.success() {
            tracing::info!(
                step = description,
                elapsed_s = monitored.elapsed_seconds,
                avg_cpu = ?monitored.average_cpu_percent,
                peak_cpu = ?monitored.peak_cpu_percent,
                samples = monitored.sample_count,
                "Monitored command finished"
            );
        } else {
            tracing::warn!(
                step = description,
                exit_status = monitored.exit_status,
                timed_out = monitored.timed_out,
                elapsed_s = monitored.elapsed_seconds,
                output = %result.output_excerpt(LOGGED_OUTPUT_CHARS).trim(),
                "Monitored command failed"
            );
        }
        Ok(monitored)
    }
}
