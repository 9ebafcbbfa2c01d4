//! Key/value bot configuration file (`key=value` per line).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use botkit_log::config::{DEFAULT_MAX_BUFFER_LINES, DEFAULT_MAX_LOG_FILES};
use botkit_log::LogConfig;
use thiserror::Error;

use crate::paths::{default_data_dir, expand_path};

const DEFAULT_RPC_URL: &str = "wss://127.0.0.1:7676/ws";

/// Directory of the relay client whose RPC certificates a bot reuses.
const CLIENT_APP_NAME: &str = "brclient";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value {value:?} for {key} on line {line}")]
    InvalidValue {
        key: String,
        value: String,
        line: usize,
    },
}

/// Resolved bot settings. Credentials and certificate paths are opaque
/// here and only handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BotConfig {
    pub data_dir: PathBuf,
    pub rpc_url: String,
    pub server_cert_path: PathBuf,
    pub client_cert_path: PathBuf,
    pub client_key_path: PathBuf,
    pub rpc_user: String,
    pub rpc_pass: String,
    /// Debug-level spec, e.g. `info,PM=debug`.
    pub debug: String,
    pub log_file: PathBuf,
    pub max_log_files: usize,
    pub max_buffer_lines: usize,
    /// Keys this crate does not interpret, preserved across rewrites.
    pub extra: BTreeMap<String, String>,
}

impl BotConfig {
    /// Defaults for a bot storing its data under `data_dir`.
    pub fn with_defaults(data_dir: &Path, log_name: &str) -> Self {
        let client_dir = default_data_dir(CLIENT_APP_NAME);
        Self {
            data_dir: data_dir.to_path_buf(),
            rpc_url: DEFAULT_RPC_URL.to_owned(),
            server_cert_path: client_dir.join("rpc.cert"),
            client_cert_path: client_dir.join("rpc-client.cert"),
            client_key_path: client_dir.join("rpc-client.key"),
            rpc_user: String::new(),
            rpc_pass: String::new(),
            debug: "info".to_owned(),
            log_file: data_dir.join("logs").join(format!("{log_name}.log")),
            max_log_files: DEFAULT_MAX_LOG_FILES,
            max_buffer_lines: DEFAULT_MAX_BUFFER_LINES,
            extra: BTreeMap::new(),
        }
    }

    /// Load `<dir>/<file_name>`, writing a default file first if none exists.
    ///
    /// `dir` defaults to [`default_data_dir`] of `app_name` and is created
    /// (mode 0700 on Unix) when missing.
    pub fn load(dir: Option<&str>, app_name: &str, file_name: &str) -> Result<Self, ConfigError> {
        let dir = match dir.map(expand_path) {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => default_data_dir(app_name),
        };
        create_private_dir(&dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(file_name);
        if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            return Self::parse_over(Self::with_defaults(&dir, app_name), &text);
        }

        let cfg = Self::with_defaults(&dir, app_name);
        cfg.write(&path)?;
        Ok(cfg)
    }

    /// Parse `key=value` lines. Lines without `=` and `#` comments are
    /// skipped; unknown keys land in `extra`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Self::parse_over(Self::default(), text)
    }

    /// Like [`BotConfig::parse`], but keys missing from `text` keep their
    /// value from `cfg`.
    pub fn parse_over(mut cfg: Self, text: &str) -> Result<Self, ConfigError> {
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "datadir" => cfg.data_dir = expand_path(value),
                "rpcurl" => cfg.rpc_url = value.to_owned(),
                "servercertpath" => cfg.server_cert_path = expand_path(value),
                "clientcertpath" => cfg.client_cert_path = expand_path(value),
                "clientkeypath" => cfg.client_key_path = expand_path(value),
                "rpcuser" => cfg.rpc_user = value.to_owned(),
                "rpcpass" => cfg.rpc_pass = value.to_owned(),
                "debug" => cfg.debug = value.to_owned(),
                "logfile" => cfg.log_file = expand_path(value),
                "maxlogfiles" => cfg.max_log_files = parse_count(key, value, idx + 1)?,
                "maxbufferlines" => cfg.max_buffer_lines = parse_count(key, value, idx + 1)?,
                _ => {
                    cfg.extra.insert(key.to_owned(), value.to_owned());
                }
            }
        }
        Ok(cfg)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let known = [
            ("datadir", self.data_dir.display().to_string()),
            ("rpcurl", self.rpc_url.clone()),
            ("servercertpath", self.server_cert_path.display().to_string()),
            ("clientcertpath", self.client_cert_path.display().to_string()),
            ("clientkeypath", self.client_key_path.display().to_string()),
            ("rpcuser", self.rpc_user.clone()),
            ("rpcpass", self.rpc_pass.clone()),
            ("debug", self.debug.clone()),
            ("logfile", self.log_file.display().to_string()),
            ("maxlogfiles", self.max_log_files.to_string()),
            ("maxbufferlines", self.max_buffer_lines.to_string()),
        ];
        for (key, value) in known.iter().map(|(k, v)| (*k, v.as_str())).chain(
            self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ) {
            let _ = writeln!(out, "{key}={value}");
        }
        out
    }

    /// Write the config file (mode 0600 on Unix).
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        write_private_file(path, self.render().as_bytes()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Logging options derived from this config. Callbacks and stdout
    /// mirroring are left to the host.
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            log_file: (!self.log_file.as_os_str().is_empty()).then(|| self.log_file.clone()),
            debug_level: self.debug.clone(),
            max_log_files: self.max_log_files,
            max_buffer_lines: self.max_buffer_lines,
            ..LogConfig::default()
        }
    }
}

fn parse_count(key: &str, value: &str, line: usize) -> Result<usize, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        line,
    })
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
