extern crate tracing;
extern crate tracing_subscriber;

pub mod config;
pub mod logging;
pub mod monitor;
pub mod orchestrator;
pub mod record;
pub mod remote;
pub mod report;
pub mod sampler;
pub mod sequencer;
pub mod size;

#[cfg(test)]
mod test_utils;

pub use config::{CommandSet, Configuration, RemoteEndpoint, SamplerConfig, SettleDelays};
pub use monitor::{MonitoredResult, MonitoredRun};
pub use orchestrator::{RunError, TestRun, TestRunOrchestrator};
pub use record::{PhaseRecord, PhaseStatus, Step, StepFailure};
pub use remote::{CommandResult, RemoteError, RemoteExecutor, SshExecutor};
pub use report::{ReportError, ReportSink, ReportWriter};
pub use sampler::{CpuSample, CpuSampler, SamplerError, SamplerHandle};
pub use sequencer::{PhaseOutcome, TestPhaseSequencer};
