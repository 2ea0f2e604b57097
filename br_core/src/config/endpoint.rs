use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A credential that must never show up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Auth {
    KeyFile(PathBuf),
    Password(Secret),
}

/// The single remote host a benchmark run talks to.
#[derive(Clone, Debug)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: Auth,
    /// Used for commands starting with `sudo `; `None` assumes NOPASSWD sudo.
    pub sudo_password: Option<Secret>,
    /// No timeout by default: a hung remote command hangs the run.
    pub command_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    /// Reuse one SSH connection for all commands through an OpenSSH control socket.
    pub multiplex: bool,
}

impl RemoteEndpoint {
    pub fn new(host: impl Into<String>, user: impl Into<String>, auth: Auth) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            user: user.into(),
            auth,
            sudo_password: None,
            command_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            multiplex: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_sudo_password(mut self, password: Option<Secret>) -> Self {
        self.sudo_password = password;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_multiplex(mut self, multiplex: bool) -> Self {
        self.multiplex = multiplex;
        self
    }

    /// `user@host` destination for the ssh command line.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}
