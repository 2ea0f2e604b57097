//! Remote command execution against the single benchmark host.

mod ssh;
mod sudo;

pub use ssh::SshExecutor;
pub use sudo::wrap_sudo;

use chrono::{DateTime, Utc};
use snafu::{Location, Snafu};
use std::future::Future;
use std::time::Duration;

/// Exit status reported for commands killed by a local timeout or a signal.
pub const ABNORMAL_EXIT_STATUS: i32 = -1;

/// Runs opaque shell commands on the remote host.
///
/// A non-zero exit status is returned as data inside [`CommandResult`]; only a
/// transport that cannot be established (or is lost) is an error.
pub trait RemoteExecutor: Send + Sync {
    /// Host name used in logs and error messages.
    fn host(&self) -> &str;

    fn run(&self, command: &str)
    -> impl Future<Output = Result<CommandResult, RemoteError>> + Send;
}

/// Outcome of one remote command. Timing is taken on the controlling side.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub exit_status: i32,
    /// Combined stdout followed by stderr.
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Monotonic wall-clock duration between launch and completion.
    pub elapsed: Duration,
    pub timed_out: bool,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// First `max_chars` characters of the output.
    pub fn output_excerpt(&self, max_chars: usize) -> String {
        self.output.chars().take(max_chars).collect()
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RemoteError {
    #[snafu(display("Connection to {host} failed: {detail}"))]
    Connection {
        host: String,
        detail: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to launch transport program `{program}`"))]
    Spawn {
        program: String,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}
