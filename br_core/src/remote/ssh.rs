use super::sudo::wrap_sudo;
use super::{
    ABNORMAL_EXIT_STATUS, CommandResult, ConnectionSnafu, RemoteError, RemoteExecutor, SpawnSnafu,
};
use crate::config::{Auth, RemoteEndpoint};
use chrono::Utc;
use snafu::ResultExt;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

/// OpenSSH reports its own failures (as opposed to the remote command's) with 255.
/// A remote command that itself exits 255 is indistinguishable and is also
/// treated as a transport failure, with only stderr kept as the detail.
const SSH_TRANSPORT_FAILURE: i32 = 255;
const CONTROL_PERSIST_SECS: u32 = 60;
const ERROR_DETAIL_CHARS: usize = 200;

/// [`RemoteExecutor`] backed by the system `ssh` client.
///
/// Password authentication goes through `sshpass -e`, which reads the secret
/// from the environment rather than the command line.
pub struct SshExecutor {
    endpoint: RemoteEndpoint,
}

#[derive(Debug, PartialEq)]
struct Invocation {
    program: &'static str,
    args: Vec<String>,
    env: Vec<(&'static str, String)>,
}

impl SshExecutor {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    /// Fails with a connection error unless a trivial command succeeds.
    pub async fn probe(&self) -> Result<(), RemoteError> {
        let result = self.run("true").await?;
        if !result.success() {
            return ConnectionSnafu {
                host: self.endpoint.host.clone(),
                detail: format!(
                    "probe exited with status {}: {}",
                    result.exit_status,
                    result.output_excerpt(ERROR_DETAIL_CHARS).trim()
                ),
            }
            .fail();
        }
        tracing::info!(host = %self.endpoint.host, "Connected to remote host");
        Ok(())
    }

    /// Stops the shared control connection, if one is in use.
    pub async fn close(&self) {
        if !self.endpoint.multiplex {
            return;
        }
        let mut args = self.ssh_options();
        args.extend(["-O".to_string(), "exit".to_string(), self.endpoint.destination()]);
        let status = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(_) => tracing::debug!(host = %self.endpoint.host, "Closed SSH control connection"),
            Err(e) => tracing::debug!("Could not close SSH control connection: {e}"),
        }
    }

    fn ssh_options(&self) -> Vec<String> {
        let endpoint = &self.endpoint;
        let mut args = vec![
            "-p".to_string(),
            endpoint.port.to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", endpoint.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=30".to_string(),
        ];
        match &endpoint.auth {
            Auth::KeyFile(path) => {
                args.extend([
                    "-i".to_string(),
                    path.display().to_string(),
                    "-o".to_string(),
                    "BatchMode=yes".to_string(),
                ]);
            }
            Auth::Password(_) => {
                args.extend([
                    "-o".to_string(),
                    "PreferredAuthentications=password,keyboard-interactive".to_string(),
                ]);
            }
        }
        if endpoint.multiplex {
            let control_path = std::env::temp_dir().join("br-ssh-%C");
            args.extend([
                "-o".to_string(),
                "ControlMaster=auto".to_string(),
                "-o".to_string(),
                format!("ControlPath={}", control_path.display()),
                "-o".to_string(),
                format!("ControlPersist={CONTROL_PERSIST_SECS}"),
            ]);
        }
        args
    }

    fn invocation(&self, command: &str) -> Invocation {
        let remote_command = wrap_sudo(
            command,
            self.endpoint.sudo_password.as_ref().map(|s| s.expose()),
        );
        let mut ssh_args = self.ssh_options();
        ssh_args.push(self.endpoint.destination());
        ssh_args.push("--".to_string());
        ssh_args.push(remote_command);

        match &self.endpoint.auth {
            Auth::KeyFile(_) => Invocation {
                program: "ssh",
                args: ssh_args,
                env: Vec::new(),
            },
            Auth::Password(secret) => {
                let mut args = vec!["-e".to_string(), "ssh".to_string()];
                args.extend(ssh_args);
                Invocation {
                    program: "sshpass",
                    args,
                    env: vec![("SSHPASS", secret.expose().to_string())],
                }
            }
        }
    }
}

impl RemoteExecutor for SshExecutor {
    fn host(&self) -> &str {
        &self.endpoint.host
    }

    async fn run(&self, command: &str) -> Result<CommandResult, RemoteError> {
        tracing::debug!(host = %self.endpoint.host, command, "Running remote command");
        self.execute(self.invocation(command)).await
    }
}

impl SshExecutor {
    async fn execute(&self, invocation: Invocation) -> Result<CommandResult, RemoteError> {
        let mut process = Command::new(invocation.program);
        process
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started_at = Utc::now();
        let start = Instant::now();
        let child = process.spawn().context(SpawnSnafu {
            program: invocation.program,
        })?;

        let waited = match self.endpoint.command_timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .ok(),
            None => Some(child.wait_with_output().await),
        };
        let elapsed = start.elapsed();
        let ended_at = Utc::now();

        let Some(waited) = waited else {
            tracing::warn!(
                host = %self.endpoint.host,
                elapsed_s = elapsed.as_secs_f64(),
                "Remote command timed out and was killed"
            );
            return Ok(CommandResult {
                exit_status: ABNORMAL_EXIT_STATUS,
                output: format!("command timed out after {:.1}s", elapsed.as_secs_f64()),
                started_at,
                ended_at,
                elapsed,
                timed_out: true,
            });
        };

        let output = waited.map_err(|e| {
            ConnectionSnafu {
                host: self.endpoint.host.clone(),
                detail: format!("lost transport while waiting for command: {e}"),
            }
            .build()
        })?;

        let exit_status = output.status.code().unwrap_or(ABNORMAL_EXIT_STATUS);
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if exit_status == SSH_TRANSPORT_FAILURE {
            let detail: String = String::from_utf8_lossy(&output.stderr)
                .trim()
                .chars()
                .take(ERROR_DETAIL_CHARS)
                .collect();
            return ConnectionSnafu {
                host: self.endpoint.host.clone(),
                detail,
            }
            .fail();
        }

        tracing::debug!(
            host = %self.endpoint.host,
            exit_status,
            elapsed_s = elapsed.as_secs_f64(),
            "Remote command finished"
        );
        Ok(CommandResult {
            exit_status,
            output: combined,
            started_at,
            ended_at,
            elapsed,
            timed_out: false,
        })
    }
}
