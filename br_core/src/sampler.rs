//! Background CPU sampling on the remote host.
//!
//! The sampler is a detached shell loop that appends `<epoch> <percent>` lines
//! to a buffer file on the remote host. The controller only talks to it at the
//! start/stop boundaries; nothing is streamed while the measured command runs.

use crate::config::SamplerConfig;
use crate::remote::{RemoteError, RemoteExecutor};
use chrono::{DateTime, Utc};
use snafu::{Location, ResultExt, Snafu};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Prefix of every remote buffer file, handy when hunting orphaned samplers.
pub const BUFFER_PREFIX: &str = "br-cpu-sampler-";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuSample {
    pub value: f64,
    pub collected_at: DateTime<Utc>,
}

/// A running remote sampler. Must be passed back to [`CpuSampler::stop`],
/// which kills the loop and removes its buffer.
#[must_use = "a started sampler keeps running on the remote host until stopped"]
#[derive(Debug)]
pub struct SamplerHandle {
    pid: u32,
    buffer: String,
    armed: bool,
}

impl SamplerHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                pid = self.pid,
                buffer = %self.buffer,
                "CPU sampler handle dropped without stop; remote sampler may be orphaned"
            );
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SamplerError {
    #[snafu(display("A CPU sampler is already active on this host"))]
    AlreadyActive {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("CPU sampler unavailable: {reason}"))]
    Unavailable {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to reach the host while starting the CPU sampler"))]
    Remote {
        source: RemoteError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Starts and stops the remote sampling loop.
///
/// At most one handle per sampler is live at a time. The orchestrator runs
/// configurations strictly one after another, so this is an assertion of that
/// usage rather than a lock.
pub struct CpuSampler<E> {
    executor: Arc<E>,
    config: SamplerConfig,
    active: AtomicBool,
}

impl<E: RemoteExecutor> CpuSampler<E> {
    pub fn new(executor: Arc<E>, config: SamplerConfig) -> Self {
        Self {
            executor,
            config,
            active: AtomicBool::new(false),
        }
    }

    pub async fn start(&self) -> Result<SamplerHandle, SamplerError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return AlreadyActiveSnafu.fail();
        }
        let started = self.launch().await;
        if started.is_err() {
            self.active.store(false, Ordering::Release);
        }
        started
    }

    async fn launch(&self) -> Result<SamplerHandle, SamplerError> {
        let buffer = format!(
            "{}/{BUFFER_PREFIX}{}.log",
            self.config.remote_dir.trim_end_matches('/'),
            uuid::Uuid::new_v4()
        );
        let interval = self.config.interval.as_secs().max(1);
        let result = self
            .executor
            .run(&start_command(&buffer, interval))
            .await
            .context(RemoteSnafu)?;
        if !result.success() {
            return UnavailableSnafu {
                reason: format!("launch exited with status {}", result.exit_status),
            }
            .fail();
        }
        let pid = parse_pid(&result.output).ok_or_else(|| {
            UnavailableSnafu {
                reason: format!("no process id in launch output {:?}", result.output.trim()),
            }
            .build()
        })?;
        tracing::debug!(pid, buffer = %buffer, "Started CPU sampler");
        Ok(SamplerHandle {
            pid,
            buffer,
            armed: true,
        })
    }

    /// Stops the loop and returns its raw samples. Never fails: a sampler that
    /// died early or a host that cannot be reached yields no samples.
    pub async fn stop(&self, mut handle: SamplerHandle) -> Vec<CpuSample> {
        handle.armed = false;
        self.active.store(false, Ordering::Release);
        let command = stop_command(handle.pid, &handle.buffer);
        match self.executor.run(&command).await {
            Ok(result) => {
                let samples = parse_samples(&result.output);
                tracing::debug!(pid = handle.pid, samples = samples.len(), "Stopped CPU sampler");
                samples
            }
            Err(e) => {
                tracing::warn!(pid = handle.pid, "Could not stop CPU sampler: {e}");
                Vec::new()
            }
        }
    }
}

fn start_command(buffer: &str, interval_secs: u64) -> String {
    let sample_loop = format!(
        concat!(
            "while :; do ",
            "v=$(vmstat {interval} 2 2>/dev/null | tail -1 | awk \"{{print 100-\\$15}}\"); ",
            "if [ -z \"$v\" ]; then ",
            "v=$(top -bn1 | grep \"Cpu(s)\" | sed \"s/.*, *\\([0-9.]*\\)%* id.*/\\1/\" | awk \"{{print 100 - \\$1}}\"); ",
            "sleep {interval}; ",
            "fi; ",
            "echo \"$(date +%s) $v\"; ",
            "done"
        ),
        interval = interval_secs
    );
    format!("nohup sh -c '{sample_loop}' > {buffer} 2>/dev/null < /dev/null & echo $!")
}

fn stop_command(pid: u32, buffer: &str) -> String {
    format!("kill {pid} 2>/dev/null; cat {buffer} 2>/dev/null; rm -f {buffer}")
}

fn parse_pid(output: &str) -> Option<u32> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())?
        .parse()
        .ok()
}

/// Parses `<epoch-seconds> <percent>` lines, skipping anything malformed or
/// outside `0..=100`.
pub fn parse_samples(output: &str) -> Vec<CpuSample> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let epoch: i64 = fields.next()?.parse().ok()?;
            let value: f64 = fields.next()?.parse().ok()?;
            if fields.next().is_some() || !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return None;
            }
            Some(CpuSample {
                value,
                collected_at: DateTime::from_timestamp(epoch, 0)?,
            })
        })
        .collect()
}
