use br_core::config::{CommandSet, Configuration, SamplerConfig, SettleDelays};
use br_core::remote::{CommandResult, ConnectionSnafu, RemoteError, RemoteExecutor};
use br_core::TestPhaseSequencer;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Sets up logging for tests
pub fn setup_logging() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env()
        .unwrap();
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .try_init();
}

/// Pretends to be the database host: answers by command prefix, reports a
/// fixed CPU load for every sampler stop and can drop the connection.
#[derive(Default)]
pub struct FakeHost {
    answers: Vec<(&'static str, i32, f64)>,
    cpu_percent: Option<f64>,
    drop_connection_at: Option<&'static str>,
    log: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands starting with `prefix` exit with `status` after `seconds`.
    pub fn answer(mut self, prefix: &'static str, status: i32, seconds: f64) -> Self {
        self.answers.push((prefix, status, seconds));
        self
    }

    pub fn cpu(mut self, percent: f64) -> Self {
        self.cpu_percent = Some(percent);
        self
    }

    pub fn drop_connection_at(mut self, prefix: &'static str) -> Self {
        self.drop_connection_at = Some(prefix);
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl RemoteExecutor for FakeHost {
    fn host(&self) -> &str {
        "fake-host"
    }

    async fn run(&self, command: &str) -> Result<CommandResult, RemoteError> {
        let disconnected = {
            let mut log = self.log.lock().unwrap();
            log.push(command.to_string());
            self.drop_connection_at.is_some_and(|prefix| {
                log.iter().any(|c| c.starts_with(prefix))
            })
        };
        if disconnected {
            return ConnectionSnafu {
                host: "fake-host",
                detail: "broken pipe",
            }
            .fail();
        }

        let started_at = Utc::now();
        let (exit_status, output, seconds) = if command.starts_with("nohup") {
            (0, "31337\n".to_string(), 0.0)
        } else if command.starts_with("kill ") {
            let output = self
                .cpu_percent
                .map(|cpu| format!("{} {cpu}\n", started_at.timestamp()))
                .unwrap_or_default();
            (0, output, 0.0)
        } else if command.starts_with("size") {
            (0, " 2048 MB\n(1 row)\n".to_string(), 0.0)
        } else {
            self.answers
                .iter()
                .rev()
                .find(|(prefix, _, _)| command.starts_with(prefix))
                .map(|(_, status, seconds)| (*status, String::new(), *seconds))
                .unwrap_or((0, String::new(), 0.0))
        };
        let elapsed = Duration::from_secs_f64(seconds);
        Ok(CommandResult {
            exit_status,
            output,
            started_at,
            ended_at: started_at + chrono::Duration::from_std(elapsed).unwrap(),
            elapsed,
            timed_out: false,
        })
    }
}

pub fn short_commands() -> CommandSet {
    CommandSet {
        fill: "fill {scale_factor}".to_string(),
        measure_size: "size".to_string(),
        backup: "backup".to_string(),
        stop_service: "stop".to_string(),
        wipe_data: "wipe".to_string(),
        restore: "restore".to_string(),
        start_service: "start".to_string(),
    }
}

pub fn sequencer(host: &Arc<FakeHost>) -> TestPhaseSequencer<FakeHost> {
    TestPhaseSequencer::new(
        host.clone(),
        short_commands(),
        SettleDelays::none(),
        SamplerConfig::default(),
    )
}

pub fn configurations(count: u32) -> Vec<Configuration> {
    (1..=count)
        .map(|i| Configuration::new(i * 10, format!("{i}GB")).unwrap())
        .collect()
}
