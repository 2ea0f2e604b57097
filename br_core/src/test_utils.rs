use crate::remote::{CommandResult, ConnectionSnafu, RemoteError, RemoteExecutor};
use crate::sampler::BUFFER_PREFIX;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;

pub const SCRIPTED_HOST: &str = "scripted-host";
pub const SCRIPTED_SAMPLER_PID: u32 = 4242;

/// Canned answer for one remote command.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponse {
    pub exit_status: i32,
    pub output: String,
    pub duration: Duration,
    /// CPU samples the sampler reports when it is stopped after this command.
    pub cpu: Vec<f64>,
}

impl ScriptedResponse {
    pub fn ok(output: &str) -> Self {
        Self {
            output: output.to_string(),
            ..Self::default()
        }
    }

    pub fn exit(exit_status: i32) -> Self {
        Self {
            exit_status,
            ..Self::default()
        }
    }

    pub fn taking(mut self, seconds: f64) -> Self {
        self.duration = Duration::from_secs_f64(seconds);
        self
    }

    pub fn with_cpu(mut self, cpu: &[f64]) -> Self {
        self.cpu = cpu.to_vec();
        self
    }
}

#[derive(Default)]
struct State {
    responses: Vec<(String, ScriptedResponse)>,
    occurrences: Vec<(String, usize, ScriptedResponse)>,
    commands: Vec<String>,
    pending_samples: Vec<f64>,
    launch_output: Option<String>,
    broken_sampler: bool,
    fail_from: Option<String>,
    disconnected: bool,
}

/// In-memory [`RemoteExecutor`] answering from a script and recording every command.
///
/// Sampler launch/stop commands are recognised by their buffer path and
/// answered with a fixed pid and the samples of the last scripted command.
#[derive(Default)]
pub struct ScriptedExecutor {
    state: Mutex<State>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers commands equal to, or starting with, `command`. Later
    /// responses win over earlier ones.
    pub fn with_response(self, command: &str, response: ScriptedResponse) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push((command.to_string(), response));
        self
    }

    /// Answers only the `nth` (1-based) command starting with `command`,
    /// taking precedence over [`Self::with_response`].
    pub fn with_nth_response(self, command: &str, nth: usize, response: ScriptedResponse) -> Self {
        self.state
            .lock()
            .unwrap()
            .occurrences
            .push((command.to_string(), nth, response));
        self
    }

    pub fn with_pending_samples(self, cpu: &[f64]) -> Self {
        self.state.lock().unwrap().pending_samples = cpu.to_vec();
        self
    }

    pub fn with_sampler_launch_output(self, output: &str) -> Self {
        self.state.lock().unwrap().launch_output = Some(output.to_string());
        self
    }

    /// Sampler launches exit non-zero and stops return nothing.
    pub fn with_broken_sampler(self) -> Self {
        self.state.lock().unwrap().broken_sampler = true;
        self
    }

    /// The first command starting with `command` loses the connection for good.
    pub fn fail_from(self, command: &str) -> Self {
        self.state.lock().unwrap().fail_from = Some(command.to_string());
        self
    }

    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    fn answer(&self, command: &str) -> Result<ScriptedResponse, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());

        let trips = state
            .fail_from
            .as_deref()
            .is_some_and(|prefix| command.starts_with(prefix));
        if trips {
            state.disconnected = true;
        }
        if state.disconnected {
            return ConnectionSnafu {
                host: SCRIPTED_HOST,
                detail: "connection reset by peer",
            }
            .fail();
        }

        if command.starts_with("nohup") && command.contains(BUFFER_PREFIX) {
            if state.broken_sampler {
                return Ok(ScriptedResponse::exit(127));
            }
            let output = state
                .launch_output
                .clone()
                .unwrap_or_else(|| format!("{SCRIPTED_SAMPLER_PID}\n"));
            return Ok(ScriptedResponse::ok(&output));
        }
        if command.starts_with("kill ") && command.contains(BUFFER_PREFIX) {
            let samples = std::mem::take(&mut state.pending_samples);
            if state.broken_sampler {
                return Ok(ScriptedResponse::exit(1));
            }
            let epoch = Utc::now().timestamp();
            let output: String = samples
                .iter()
                .map(|value| format!("{epoch} {value}\n"))
                .collect();
            return Ok(ScriptedResponse::ok(&output));
        }

        let seen = |key: &str| state.commands.iter().filter(|c| c.starts_with(key)).count();
        let response = state
            .occurrences
            .iter()
            .find(|(key, nth, _)| command.starts_with(key.as_str()) && seen(key) == *nth)
            .map(|(_, _, response)| response.clone())
            .or_else(|| {
                state
                    .responses
                    .iter()
                    .rev()
                    .find(|(key, _)| command.starts_with(key.as_str()))
                    .map(|(_, response)| response.clone())
            })
            .unwrap_or_default();
        state.pending_samples = response.cpu.clone();
        Ok(response)
    }
}

impl RemoteExecutor for ScriptedExecutor {
    fn host(&self) -> &str {
        SCRIPTED_HOST
    }

    async fn run(&self, command: &str) -> Result<CommandResult, RemoteError> {
        let response = self.answer(command)?;
        let started_at = Utc::now();
        let ended_at = started_at
            + chrono::Duration::from_std(response.duration).unwrap_or_else(|_| chrono::Duration::zero());
        Ok(CommandResult {
            exit_status: response.exit_status,
            output: response.output,
            started_at,
            ended_at,
            elapsed: response.duration,
            timed_out: false,
        })
    }
}
