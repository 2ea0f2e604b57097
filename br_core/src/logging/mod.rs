use std::path::PathBuf;

pub use crate::logging::error::LogError;
use crate::logging::error::{FilterSnafu, InitSnafu, LogFileSnafu};
use snafu::ResultExt;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

mod error;

pub struct LoggingConfig {
    pub log_file: Option<PathBuf>,
    pub stderr: bool,
    /// Lowers the default level from INFO to DEBUG. `RUST_LOG` still wins.
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(log_file: Option<PathBuf>, stderr: bool, verbose: bool) -> Self {
        Self {
            log_file,
            stderr,
            verbose,
        }
    }

    fn default_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }
}

/// Installs the global subscriber: a plain file layer and/or a stderr layer
/// behind one env filter.
pub fn init(config: LoggingConfig) -> Result<(), LogError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.default_level().into())
        .from_env()
        .context(FilterSnafu)?;
    let subscriber = Registry::default().with(env_filter);

    let file_layer = if let Some(path) = config.log_file {
        let log_file = std::fs::File::create(&path).context(LogFileSnafu { path })?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(log_file),
        )
    } else {
        None
    };
    let subscriber = subscriber.with(file_layer);

    let stderr_layer = if config.stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
    } else {
        None
    };
    let subscriber = subscriber.with(stderr_layer);

    tracing::subscriber::set_global_default(subscriber).context(InitSnafu)?;
    Ok(())
}
