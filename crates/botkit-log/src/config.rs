//! Construction options for [`LogBackend`](crate::LogBackend).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing_appender::rolling::Rotation;

use crate::error::LogError;

/// Host hook invoked with a formatted line (or an error payload).
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Default number of lines retained in memory.
pub const DEFAULT_MAX_BUFFER_LINES: usize = 1000;

/// Default number of log files kept on disk, the active one included.
pub const DEFAULT_MAX_LOG_FILES: usize = 5;

/// Default size at which the active log file is rolled.
pub const DEFAULT_MAX_LOG_FILE_SIZE: u64 = 1024 * 1024;

/// When the file sink starts a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    /// Roll once the active file would grow past this many bytes. The
    /// active file keeps the configured name; older ones get `.1`, `.2`, ...
    Size(u64),
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::Size(DEFAULT_MAX_LOG_FILE_SIZE)
    }
}

impl RotationPolicy {
    /// Time-based schedule for `tracing-appender`; `None` for size rolling.
    pub(crate) fn time_rotation(self) -> Option<Rotation> {
        match self {
            Self::Size(_) => None,
            Self::Minutely => Some(Rotation::MINUTELY),
            Self::Hourly => Some(Rotation::HOURLY),
            Self::Daily => Some(Rotation::DAILY),
            Self::Never => Some(Rotation::NEVER),
        }
    }
}

/// Accepts `minutely`, `hourly`, `daily`, `never`, or a size such as
/// `1048576`, `512k` or `2mb`.
impl FromStr for RotationPolicy {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "minutely" => return Ok(Self::Minutely),
            "hourly" => return Ok(Self::Hourly),
            "daily" => return Ok(Self::Daily),
            "never" => return Ok(Self::Never),
            _ => {}
        }

        let (digits, unit) = if let Some(n) = strip_any(&lower, &["mib", "mb", "m"]) {
            (n, 1024 * 1024)
        } else if let Some(n) = strip_any(&lower, &["kib", "kb", "k"]) {
            (n, 1024)
        } else {
            (lower.as_str(), 1)
        };
        digits
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(unit))
            .filter(|&bytes| bytes > 0)
            .map(Self::Size)
            .ok_or_else(|| LogError::UnknownRotation(s.to_owned()))
    }
}

fn strip_any<'a>(s: &'a str, suffixes: &[&str]) -> Option<&'a str> {
    suffixes.iter().find_map(|suffix| s.strip_suffix(suffix))
}

#[derive(Clone)]
pub struct LogConfig {
    /// Log file path. `None` disables the file sink.
    pub log_file: Option<PathBuf>,
    /// Comma-separated `level` / `subsys=level` tokens, e.g. `"info,PM=debug"`.
    pub debug_level: String,
    /// Log files kept on disk, the active one included; 0 keeps every file.
    pub max_log_files: usize,
    /// Capacity of the in-memory ring of recent lines.
    pub max_buffer_lines: usize,
    pub rotation: RotationPolicy,
    /// Invoked with every formatted line.
    pub log_callback: Option<LineCallback>,
    /// Invoked with the message text of every `[ERR]` record.
    pub error_callback: Option<LineCallback>,
    /// Mirror records to standard output.
    pub use_stdout: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            debug_level: String::new(),
            max_log_files: DEFAULT_MAX_LOG_FILES,
            max_buffer_lines: DEFAULT_MAX_BUFFER_LINES,
            rotation: RotationPolicy::default(),
            log_callback: None,
            error_callback: None,
            use_stdout: true,
        }
    }
}

impl fmt::Debug for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogConfig")
            .field("log_file", &self.log_file)
            .field("debug_level", &self.debug_level)
            .field("max_log_files", &self.max_log_files)
            .field("max_buffer_lines", &self.max_buffer_lines)
            .field("rotation", &self.rotation)
            .field("log_callback", &self.log_callback.is_some())
            .field("error_callback", &self.error_callback.is_some())
            .field("use_stdout", &self.use_stdout)
            .finish()
    }
}
