//! Error types for the logging backend.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("unknown log level {0:?}")]
    UnknownLevel(String),

    #[error("unable to parse {0:?} as subsys=level debuglevel string")]
    MalformedSpec(String),

    #[error("unknown log rotation {0:?}")]
    UnknownRotation(String),

    #[error("log file path {} has no file name", .0.display())]
    InvalidLogPath(PathBuf),

    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create file rotator: {0}")]
    Rotator(#[from] tracing_appender::rolling::InitError),
}
