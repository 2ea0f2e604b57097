use snafu::{Location, Snafu};
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LogError {
    #[snafu(display("Failed to open log file {}", path.display()))]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Invalid log filter"))]
    Filter {
        source: tracing_subscriber::filter::FromEnvError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to install the global subscriber"))]
    Init {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },
}
