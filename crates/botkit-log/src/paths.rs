//! `~` and `$VAR` expansion for user-supplied paths.

use std::path::{Component, Path, PathBuf};

/// Expand `$VAR` / `${VAR}` and a leading `~`, then drop `.` components.
/// Unset variables expand to nothing. An empty path stays empty.
pub fn expand_path(path: &str) -> PathBuf {
    if path.is_empty() {
        return PathBuf::new();
    }

    let expanded = expand_env(path);
    let expanded = match expanded.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home.join(rest.trim_start_matches(['/', '\\']))
        }
        _ => PathBuf::from(expanded),
    };
    clean(&expanded)
}

fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        if consumed == 0 {
            out.push('$');
            rest = after;
            continue;
        }
        if let Ok(value) = std::env::var(name) {
            out.push_str(&value);
        }
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}

fn clean(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
