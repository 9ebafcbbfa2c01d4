//! The file sink. Time-based schedules use `tracing-appender` directly;
//! size-based rolling wraps a non-rotating appender and renames old files
//! to `<name>.1`, `<name>.2`, ... with the newest at `.1`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};

use crate::config::RotationPolicy;
use crate::error::LogError;

pub(crate) enum FileSink {
    Timed(RollingFileAppender),
    Sized(SizeRotator),
}

impl FileSink {
    /// Open the sink for `path`, creating its directory (0700 on Unix).
    /// `max_files` counts the active file; 0 keeps every file.
    pub(crate) fn open(
        path: &Path,
        policy: RotationPolicy,
        max_files: usize,
    ) -> Result<Self, LogError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| LogError::InvalidLogPath(path.to_path_buf()))?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        create_log_dir(&dir).map_err(|source| LogError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let Some(rotation) = policy.time_rotation() else {
            let max_bytes = match policy {
                RotationPolicy::Size(bytes) => bytes,
                _ => u64::MAX,
            };
            return Ok(Self::Sized(SizeRotator::open(dir, file_name, max_bytes, max_files)?));
        };

        let mut builder = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(file_name);
        if max_files > 0 {
            builder = builder.max_log_files(max_files);
        }
        Ok(Self::Timed(builder.build(dir)?))
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Timed(file) => file.write(buf),
            Self::Sized(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Timed(file) => file.flush(),
            Self::Sized(file) => file.flush(),
        }
    }
}

/// Appends to `<dir>/<file_name>` and rolls it once a write would push the
/// file past `max_bytes`. A record is never split across files.
pub(crate) struct SizeRotator {
    dir: PathBuf,
    file_name: String,
    max_bytes: u64,
    max_files: usize,
    written: u64,
    file: Option<RollingFileAppender>,
}

impl SizeRotator {
    fn open(
        dir: PathBuf,
        file_name: String,
        max_bytes: u64,
        max_files: usize,
    ) -> Result<Self, InitError> {
        let file = plain_appender(&dir, &file_name)?;
        let written = file_len(&dir.join(&file_name));
        Ok(Self {
            dir,
            file_name,
            max_bytes,
            max_files,
            written,
            file: Some(file),
        })
    }

    fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
        let rolled = roll_files(&self.path(), self.max_files);

        // Reopen even when rolling failed so logging carries on in place.
        let reopened = plain_appender(&self.dir, &self.file_name);
        self.written = file_len(&self.path());
        match reopened {
            Ok(file) => {
                self.file = Some(file);
                rolled
            }
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

impl Write for SizeRotator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len() as u64;
        if self.written > 0 && self.written.saturating_add(len) > self.max_bytes {
            if let Err(e) = self.rotate() {
                if self.file.is_none() {
                    return Err(e);
                }
            }
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "log file is closed"))?;
        file.write_all(buf)?;
        self.written = self.written.saturating_add(len);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn plain_appender(dir: &Path, file_name: &str) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn rolled_name(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Shift `path.N` to `path.N+1` and `path` to `path.1`, dropping whatever
/// would leave more than `max_files` files in total. 0 keeps everything.
fn roll_files(path: &Path, max_files: usize) -> io::Result<()> {
    if max_files == 1 {
        return remove_if_exists(path);
    }

    let mut top = 0;
    while rolled_name(path, top + 1).exists() {
        top += 1;
    }
    if max_files > 1 {
        let keep = max_files - 1;
        while top >= keep {
            remove_if_exists(&rolled_name(path, top))?;
            top -= 1;
        }
    }

    for n in (1..=top).rev() {
        fs::rename(rolled_name(path, n), rolled_name(path, n + 1))?;
    }
    match fs::rename(path, rolled_name(path, 1)) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(unix)]
fn create_log_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_log_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn roll_shifts_and_caps_history() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("bot.log");
        fs::write(&path, "current").expect("write");
        fs::write(rolled_name(&path, 1), "older").expect("write");
        fs::write(rolled_name(&path, 2), "oldest").expect("write");

        roll_files(&path, 3).expect("roll");

        assert_eq!(log_files(tmp.path()), vec!["bot.log.1", "bot.log.2"]);
        assert_eq!(fs::read_to_string(rolled_name(&path, 1)).expect("read"), "current");
        assert_eq!(fs::read_to_string(rolled_name(&path, 2)).expect("read"), "older");
    }

    #[test]
    fn roll_with_unlimited_history_keeps_everything() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("bot.log");
        fs::write(&path, "c").expect("write");
        fs::write(rolled_name(&path, 1), "b").expect("write");

        roll_files(&path, 0).expect("roll");

        assert_eq!(log_files(tmp.path()), vec!["bot.log.1", "bot.log.2"]);
    }

    #[test]
    fn single_file_budget_discards_history() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("bot.log");
        fs::write(&path, "c").expect("write");

        roll_files(&path, 1).expect("roll");

        assert!(log_files(tmp.path()).is_empty());
    }

    #[test]
    fn size_sink_writes_configured_path_and_rolls() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("bot.log");
        let mut sink = FileSink::open(&path, RotationPolicy::Size(100), 3).expect("open");

        for i in 0..20 {
            sink.write_all(format!("record {i:02} with a little padding\n").as_bytes())
                .expect("write");
        }
        sink.flush().expect("flush");

        assert_eq!(log_files(tmp.path()), vec!["bot.log", "bot.log.1", "bot.log.2"]);
        for name in log_files(tmp.path()) {
            let len = fs::metadata(tmp.path().join(&name)).expect("metadata").len();
            assert!(len <= 100, "{name} is {len} bytes");
        }
        let current = fs::read_to_string(&path).expect("read");
        assert!(current.ends_with("record 19 with a little padding\n"));
    }

    #[test]
    fn oversized_record_gets_its_own_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("bot.log");
        let mut sink = FileSink::open(&path, RotationPolicy::Size(10), 0).expect("open");

        sink.write_all(b"short\n").expect("write");
        sink.write_all(b"this record is longer than the limit\n").expect("write");
        sink.flush().expect("flush");

        assert_eq!(fs::read_to_string(rolled_name(&path, 1)).expect("read"), "short\n");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "this record is longer than the limit\n"
        );
    }

    #[test]
    fn reopening_counts_existing_bytes() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("bot.log");
        fs::write(&path, "x".repeat(90)).expect("write");

        let mut sink = FileSink::open(&path, RotationPolicy::Size(100), 3).expect("open");
        sink.write_all(b"0123456789abcdef\n").expect("write");
        sink.flush().expect("flush");

        assert_eq!(fs::read_to_string(&path).expect("read"), "0123456789abcdef\n");
        assert_eq!(file_len(&rolled_name(&path, 1)), 90);
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        let result = FileSink::open(Path::new("/"), RotationPolicy::default(), 3);
        assert!(matches!(result, Err(LogError::InvalidLogPath(_))));
    }
}
