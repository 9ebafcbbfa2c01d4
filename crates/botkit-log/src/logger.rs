//! Per-subsystem logger handles.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Local, TimeZone};

use crate::backend::Sinks;
use crate::level::Level;

/// Timestamp layout shared by every record; 23 characters wide.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Handle for one subsystem. Clones share the same level, so a level change
/// made through the backend is seen by every clone immediately.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    subsystem: String,
    level: AtomicU8,
    sinks: Arc<Sinks>,
}

impl Logger {
    pub(crate) fn new(subsystem: &str, level: Level, sinks: Arc<Sinks>) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                subsystem: subsystem.to_owned(),
                level: AtomicU8::new(level as u8),
                sinks,
            }),
        }
    }

    pub fn subsystem(&self) -> &str {
        &self.inner.subsystem
    }

    pub fn level(&self) -> Level {
        Level::from_u8(self.inner.level.load(Ordering::Relaxed))
    }

    pub(crate) fn set_level(&self, level: Level) {
        self.inner.level.store(level as u8, Ordering::Relaxed);
    }

    pub fn enabled(&self, level: Level) -> bool {
        level != Level::Off && level >= self.level()
    }

    /// True when both handles point at the same registered logger.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn log(&self, level: Level, msg: impl fmt::Display) {
        if !self.enabled(level) {
            return;
        }
        let record = format_record(&Local::now(), level, &self.inner.subsystem, msg);
        self.inner.sinks.write(record.as_bytes());
    }

    pub fn trace(&self, msg: impl fmt::Display) {
        self.log(Level::Trace, msg);
    }

    pub fn debug(&self, msg: impl fmt::Display) {
        self.log(Level::Debug, msg);
    }

    pub fn info(&self, msg: impl fmt::Display) {
        self.log(Level::Info, msg);
    }

    pub fn warn(&self, msg: impl fmt::Display) {
        self.log(Level::Warn, msg);
    }

    pub fn error(&self, msg: impl fmt::Display) {
        self.log(Level::Error, msg);
    }

    pub fn critical(&self, msg: impl fmt::Display) {
        self.log(Level::Critical, msg);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("subsystem", &self.inner.subsystem)
            .field("level", &self.level())
            .finish()
    }
}

/// `2024-01-02 03:04:05.678 [INF] PM: message\n`
pub(crate) fn format_record<Tz>(
    ts: &DateTime<Tz>,
    level: Level,
    subsystem: &str,
    msg: impl fmt::Display,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!(
        "{} [{}] {}: {}\n",
        ts.format(TIMESTAMP_FORMAT),
        level.tag(),
        subsystem,
        msg
    )
}
