//! The logging backend: sink fan-out, level registry and logger cache.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use regex::Regex;

use crate::buffer::LogBuffer;
use crate::config::{LineCallback, LogConfig};
use crate::error::LogError;
use crate::layer::BackendLayer;
use crate::level::Level;
use crate::logger::Logger;
use crate::paths::expand_path;
use crate::rotate::FileSink;

/// Matches records written at error severity.
static ERROR_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3} \[ERR\] ")
        .expect("error record pattern is valid")
});

/// Width of the `YYYY-MM-DD HH:MM:SS.mmm [ERR] ` prefix stripped before the
/// error callback runs. Fixed: a different timestamp layout breaks payloads.
pub const ERROR_PREFIX_LEN: usize = 30;

/// Everything a formatted record is written to. Shared by the backend and
/// every logger it hands out.
pub(crate) struct Sinks {
    rotator: Mutex<Option<FileSink>>,
    use_stdout: bool,
    buffer: LogBuffer,
    on_line: Option<LineCallback>,
    on_error: Option<LineCallback>,
}

impl Sinks {
    /// Each sink is attempted independently; file and stdout failures are
    /// dropped for that record.
    pub(crate) fn write(&self, record: &[u8]) {
        if let Some(file) = self.rotator.lock().as_mut() {
            let _ = file.write_all(record);
        }

        if self.use_stdout {
            let _ = io::stdout().lock().write_all(record);
        }

        let line = String::from_utf8_lossy(record);
        self.buffer.append(line.as_ref());

        if let Some(cb) = &self.on_line {
            cb(&*line);
        }

        if let Some(cb) = &self.on_error {
            if let Some(payload) = error_payload(&line) {
                cb(payload);
            }
        }
    }

    pub(crate) fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    #[cfg(test)]
    pub(crate) fn detached(capacity: usize) -> Self {
        Self {
            rotator: Mutex::new(None),
            use_stdout: false,
            buffer: LogBuffer::new(capacity),
            on_line: None,
            on_error: None,
        }
    }
}

/// Message text of an error record, without its timestamp, tag or line ending.
pub fn error_payload(line: &str) -> Option<&str> {
    if !ERROR_RECORD.is_match(line) {
        return None;
    }
    line.get(ERROR_PREFIX_LEN..)
        .map(|rest| rest.trim_end_matches(['\r', '\n']))
}

/// One parsed token of a debug-level spec.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Directive {
    Default(Level),
    Subsystem(String, Level),
}

/// Parse `level` / `subsys=level` tokens separated by commas. Empty tokens
/// are ignored; nothing is applied unless every token parses.
fn parse_spec(spec: &str) -> Result<Vec<Directive>, LogError> {
    let mut directives = Vec::new();
    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let fields: Vec<&str> = token.split('=').collect();
        match fields.as_slice() {
            [level] => directives.push(Directive::Default(level.parse()?)),
            [subsys, level] => {
                let subsys = subsys.trim();
                if subsys.is_empty() {
                    return Err(LogError::MalformedSpec(token.to_owned()));
                }
                directives.push(Directive::Subsystem(subsys.to_owned(), level.parse()?));
            }
            _ => return Err(LogError::MalformedSpec(token.to_owned())),
        }
    }
    Ok(directives)
}

struct Registry {
    default_level: Level,
    overrides: HashMap<String, Level>,
    loggers: HashMap<String, Logger>,
}

impl Registry {
    fn effective_level(&self, subsystem: &str) -> Level {
        self.overrides
            .get(subsystem)
            .copied()
            .unwrap_or(self.default_level)
    }

    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::Default(level) => {
                self.default_level = level;
                for (subsys, logger) in &self.loggers {
                    if !self.overrides.contains_key(subsys) {
                        logger.set_level(level);
                    }
                }
            }
            Directive::Subsystem(subsys, level) => {
                if let Some(logger) = self.loggers.get(&subsys) {
                    logger.set_level(level);
                }
                self.overrides.insert(subsys, level);
            }
        }
    }
}

/// Process-wide logging backend. Safe to share across tasks; wrap it in an
/// `Arc` to hand it to the tracing bridge.
pub struct LogBackend {
    sinks: Arc<Sinks>,
    registry: Mutex<Registry>,
}

impl LogBackend {
    pub fn new(config: LogConfig) -> Result<Self, LogError> {
        let mut registry = Registry {
            default_level: Level::Info,
            overrides: HashMap::new(),
            loggers: HashMap::new(),
        };
        for directive in parse_spec(&config.debug_level)? {
            registry.apply(directive);
        }

        let log_file = config.log_file.as_deref().map(|path| match path.to_str() {
            Some(raw) => expand_path(raw),
            None => path.to_path_buf(),
        });
        let rotator = match log_file {
            Some(path) if !path.as_os_str().is_empty() => Some(FileSink::open(
                &path,
                config.rotation,
                config.max_log_files,
            )?),
            _ => None,
        };

        Ok(Self {
            sinks: Arc::new(Sinks {
                rotator: Mutex::new(rotator),
                use_stdout: config.use_stdout,
                buffer: LogBuffer::new(config.max_buffer_lines),
                on_line: config.log_callback,
                on_error: config.error_callback,
            }),
            registry: Mutex::new(registry),
        })
    }

    /// Ingest a fully formatted record.
    pub fn write(&self, record: &[u8]) {
        self.sinks.write(record);
    }

    /// Cached handle for `subsystem`, created on first use at the
    /// subsystem's override level or the default level.
    pub fn logger(&self, subsystem: &str) -> Logger {
        let mut registry = self.registry.lock();
        if let Some(logger) = registry.loggers.get(subsystem) {
            return logger.clone();
        }
        let level = registry.effective_level(subsystem);
        let logger = Logger::new(subsystem, level, Arc::clone(&self.sinks));
        registry.loggers.insert(subsystem.to_owned(), logger.clone());
        logger
    }

    /// Apply a debug-level spec to the running backend. A bare level changes
    /// the default for every subsystem without an override; `subsys=level`
    /// overrides one subsystem.
    pub fn set_level(&self, spec: &str) -> Result<(), LogError> {
        let directives = parse_spec(spec)?;
        let mut registry = self.registry.lock();
        for directive in directives {
            registry.apply(directive);
        }
        Ok(())
    }

    pub fn default_level(&self) -> Level {
        self.registry.lock().default_level
    }

    /// Level a logger for `subsystem` has, or would be created with.
    pub fn effective_level(&self, subsystem: &str) -> Level {
        self.registry.lock().effective_level(subsystem)
    }

    /// Names of subsystems that have a logger, sorted.
    pub fn subsystems(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.lock().loggers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn last_log_lines(&self, n: usize) -> Vec<String> {
        self.sinks.buffer().last_lines(n)
    }

    /// Flush and close the file sink. Later calls are no-ops; records
    /// written afterwards still reach the remaining sinks.
    pub fn close(&self) -> io::Result<()> {
        match self.sinks.rotator.lock().take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }

    /// Tracing layer that routes events into this backend, using the event
    /// target as the subsystem name.
    pub fn layer(self: &Arc<Self>) -> BackendLayer {
        BackendLayer::new(Arc::clone(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet(debug_level: &str) -> LogBackend {
        LogBackend::new(LogConfig {
            debug_level: debug_level.to_owned(),
            use_stdout: false,
            max_buffer_lines: 16,
            ..LogConfig::default()
        })
        .expect("backend")
    }

    #[test]
    fn directive_parsing_accepts_mixed_tokens() {
        let parsed = parse_spec("debug, PM=warn,,TIP=error").expect("parse");
        assert_eq!(
            parsed,
            vec![
                Directive::Default(Level::Debug),
                Directive::Subsystem("PM".into(), Level::Warn),
                Directive::Subsystem("TIP".into(), Level::Error),
            ]
        );
    }

    #[test]
    fn directive_parsing_rejects_bad_shapes() {
        assert!(matches!(parse_spec("a=b=c"), Err(LogError::MalformedSpec(_))));
        assert!(matches!(parse_spec("=info"), Err(LogError::MalformedSpec(_))));
        assert!(matches!(parse_spec("PM=loud"), Err(LogError::UnknownLevel(_))));
    }

    #[test]
    fn construction_rejects_malformed_debug_level() {
        let result = LogBackend::new(LogConfig {
            debug_level: "PM=info=debug".into(),
            use_stdout: false,
            ..LogConfig::default()
        });
        assert!(matches!(result, Err(LogError::MalformedSpec(_))));
    }

    #[test]
    fn logger_is_cached_per_subsystem() {
        let backend = quiet("");
        let a = backend.logger("RPC");
        let b = backend.logger("RPC");
        let c = backend.logger("PM");
        assert!(Logger::ptr_eq(&a, &b));
        assert!(!Logger::ptr_eq(&a, &c));
        assert_eq!(backend.subsystems(), vec!["PM", "RPC"]);
    }

    #[test]
    fn construction_spec_sets_default_and_overrides() {
        let backend = quiet("warn,PM=debug");
        assert_eq!(backend.default_level(), Level::Warn);
        assert_eq!(backend.logger("PM").level(), Level::Debug);
        assert_eq!(backend.logger("GC").level(), Level::Warn);
    }

    #[test]
    fn default_level_is_info() {
        let backend = quiet("");
        assert_eq!(backend.logger("X").level(), Level::Info);
    }

    #[test]
    fn bare_level_reapplies_to_loggers_without_override() {
        let backend = quiet("PM=debug");
        let pm = backend.logger("PM");
        let gc = backend.logger("GC");

        backend.set_level("warn").expect("set level");

        assert_eq!(gc.level(), Level::Warn);
        assert_eq!(pm.level(), Level::Debug);
        assert_eq!(backend.logger("X").level(), Level::Warn);
    }

    #[test]
    fn subsystem_override_is_independent_of_default() {
        let backend = quiet("");
        let x = backend.logger("X");
        backend.set_level("X=error").expect("set level");
        assert_eq!(x.level(), Level::Error);
        assert_eq!(backend.default_level(), Level::Info);

        backend.set_level("trace").expect("set level");
        assert_eq!(x.level(), Level::Error);
        assert_eq!(backend.effective_level("Y"), Level::Trace);
    }

    #[test]
    fn override_before_first_use_applies_on_creation() {
        let backend = quiet("");
        backend.set_level("TIP=critical").expect("set level");
        assert_eq!(backend.logger("TIP").level(), Level::Critical);
    }

    #[test]
    fn bad_set_level_leaves_state_untouched() {
        let backend = quiet("");
        let x = backend.logger("X");
        assert!(backend.set_level("debug,X=bogus").is_err());
        assert_eq!(x.level(), Level::Info);
        assert_eq!(backend.default_level(), Level::Info);
        assert!(backend.set_level("").is_ok());
    }

    #[test]
    fn error_payload_strips_fixed_prefix() {
        assert_eq!(
            error_payload("2024-01-02 03:04:05.678 [ERR] boom"),
            Some("boom")
        );
        assert_eq!(
            error_payload("2024-01-02 03:04:05.678 [ERR] PM: boom\n"),
            Some("PM: boom")
        );
        assert_eq!(error_payload("2024-01-02 03:04:05.678 [INF] boom"), None);
        assert_eq!(error_payload("x 2024-01-02 03:04:05.678 [ERR] boom"), None);
        assert_eq!(error_payload("2024-01-02 03:04:05 [ERR] boom"), None);
    }

    #[test]
    fn write_fans_out_to_buffer_and_callbacks() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let errors = Arc::new(Mutex::new(Vec::<String>::new()));
        let backend = LogBackend::new(LogConfig {
            use_stdout: false,
            log_callback: Some({
                let lines = Arc::clone(&lines);
                Arc::new(move |l: &str| lines.lock().push(l.to_owned()))
            }),
            error_callback: Some({
                let errors = Arc::clone(&errors);
                Arc::new(move |l: &str| errors.lock().push(l.to_owned()))
            }),
            ..LogConfig::default()
        })
        .expect("backend");

        backend.write(b"2024-01-02 03:04:05.678 [INF] fine\n");
        backend.write(b"2024-01-02 03:04:05.678 [ERR] boom\n");

        assert_eq!(lines.lock().len(), 2);
        assert_eq!(*errors.lock(), vec!["boom".to_owned()]);
        assert_eq!(backend.last_log_lines(1), vec!["2024-01-02 03:04:05.678 [ERR] boom\n"]);
    }

    #[test]
    fn logger_error_reaches_error_callback() {
        let errors = Arc::new(Mutex::new(Vec::<String>::new()));
        let backend = LogBackend::new(LogConfig {
            use_stdout: false,
            error_callback: Some({
                let errors = Arc::clone(&errors);
                Arc::new(move |l: &str| errors.lock().push(l.to_owned()))
            }),
            ..LogConfig::default()
        })
        .expect("backend");

        backend.logger("PM").error(format_args!("stream failed: {}", "eof"));
        backend.logger("PM").warn("not an error");

        assert_eq!(*errors.lock(), vec!["PM: stream failed: eof".to_owned()]);
    }

    #[test]
    fn close_without_file_sink_is_noop() {
        let backend = quiet("");
        backend.close().expect("first close");
        backend.close().expect("second close");
    }
}
