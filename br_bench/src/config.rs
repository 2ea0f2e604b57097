//! Command line and environment handling

use anyhow::Context;
use br_core::config::{
    Auth, CommandSet, Configuration, RemoteEndpoint, SamplerConfig, Secret, SettleDelays,
    default_configurations, parse_configurations,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "br_bench")]
#[command(about = "Benchmarks database backup and restore on a remote host over SSH")]
pub struct Args {
    /// Remote host name or address
    #[arg(long, env = "BR_HOST")]
    pub host: String,

    /// SSH user
    #[arg(short, long, env = "BR_USER")]
    pub user: String,

    /// SSH port
    #[arg(short, long, env = "BR_PORT", default_value_t = 22)]
    pub port: u16,

    /// Private key for key-based authentication; wins over --password
    #[arg(long, env = "BR_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// SSH password (password authentication through sshpass)
    #[arg(long, env = "BR_SSH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Password for remote sudo; defaults to the SSH password
    #[arg(long, env = "BR_SUDO_PASSWORD", hide_env_values = true)]
    pub sudo_password: Option<String>,

    /// Comma separated target sizes, e.g. `1GB,3GB,500MB`
    #[arg(long, env = "BR_SIZES")]
    pub sizes: Option<String>,

    /// Parallel backup processes passed to the backup tool
    #[arg(long, env = "BR_PROCESS_MAX")]
    pub process_max: Option<u32>,

    /// WAL archive timeout in seconds passed to the backup tool
    #[arg(long, env = "BR_ARCHIVE_TIMEOUT")]
    pub archive_timeout: Option<u32>,

    /// JSON file overriding any of the remote commands
    #[arg(long, env = "BR_COMMANDS_FILE")]
    pub commands_file: Option<PathBuf>,

    /// Structured report; the text report is written next to it
    #[arg(short, long, env = "BR_OUTPUT", default_value = "backup_restore_results.json")]
    pub output: PathBuf,

    /// Also write logs to this file
    #[arg(long, env = "BR_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Debug level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Kill remote commands running longer than this many seconds
    #[arg(long, env = "BR_COMMAND_TIMEOUT")]
    pub command_timeout: Option<u64>,

    /// Seconds to wait between steps
    #[arg(long, env = "BR_STEP_DELAY", default_value_t = 2)]
    pub step_delay: u64,

    /// Seconds to wait between configurations
    #[arg(long, env = "BR_CONFIG_DELAY", default_value_t = 5)]
    pub config_delay: u64,

    /// Open a new SSH connection for every command
    #[arg(long)]
    pub no_multiplex: bool,
}

/// Everything a run needs, resolved from [`Args`].
pub struct BenchConfig {
    pub endpoint: RemoteEndpoint,
    pub commands: CommandSet,
    pub configurations: Vec<Configuration>,
    pub delays: SettleDelays,
    pub sampler: SamplerConfig,
    pub output: PathBuf,
}

impl BenchConfig {
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let auth = match (&args.key_file, &args.password) {
            (Some(key_file), _) => Auth::KeyFile(key_file.clone()),
            (None, Some(password)) => Auth::Password(Secret::new(password.clone())),
            (None, None) => anyhow::bail!(
                "Either --key-file or --password (BR_SSH_PASSWORD) is required"
            ),
        };
        let sudo_password = args
            .sudo_password
            .clone()
            .or_else(|| args.password.clone())
            .map(Secret::new);

        let endpoint = RemoteEndpoint::new(&args.host, &args.user, auth)
            .with_port(args.port)
            .with_sudo_password(sudo_password)
            .with_command_timeout(args.command_timeout.map(Duration::from_secs))
            .with_multiplex(!args.no_multiplex);

        let commands = match &args.commands_file {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                CommandSet::from_json(&json)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => CommandSet::default(),
        }
        .with_backup_options(args.process_max, args.archive_timeout);

        let configurations = match &args.sizes {
            Some(sizes) => parse_configurations(sizes)
                .with_context(|| format!("Invalid --sizes value '{sizes}'"))?,
            None => default_configurations(),
        };
        anyhow::ensure!(!configurations.is_empty(), "No configurations to run");

        let delays = SettleDelays {
            between_steps: Duration::from_secs(args.step_delay),
            between_configurations: Duration::from_secs(args.config_delay),
            ..SettleDelays::default()
        };

        Ok(Self {
            endpoint,
            commands,
            configurations,
            delays,
            sampler: SamplerConfig::default(),
            output: args.output,
        })
    }
}
