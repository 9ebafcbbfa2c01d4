//! Path helpers: per-OS application data directory and `~`/`$VAR` expansion.

use std::path::{Path, PathBuf};

pub use botkit_log::paths::expand_path;

/// Operating-system specific data directory for `app_name`.
///
/// ```text
/// linux/bsd: ~/.mybot
/// macOS:     ~/Library/Application Support/Mybot
/// windows:   %LOCALAPPDATA%\Mybot
/// ```
pub fn default_data_dir(app_name: &str) -> PathBuf {
    let name = app_name.strip_prefix('.').unwrap_or(app_name);
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    data_dir_for(std::env::consts::OS, &home, name)
}

fn data_dir_for(os: &str, home: &Path, name: &str) -> PathBuf {
    match os {
        "windows" => {
            let base = std::env::var_os("LOCALAPPDATA")
                .or_else(|| std::env::var_os("APPDATA"))
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join("AppData").join("Local"));
            base.join(capitalize(name))
        }
        "macos" => home
            .join("Library")
            .join("Application Support")
            .join(capitalize(name)),
        _ => home.join(format!(".{name}")),
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
