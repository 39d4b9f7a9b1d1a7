//! Log file location, ANSI stripping and time formatting.
use std::fs;
use std::path::PathBuf;

/// Strip ANSI escape sequences from a string.
///
/// Handles SGR sequences (ending in `m`) and other CSI sequences (ending
/// in any letter in the `@`..`~` range).
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if let Some(next) = chars.next()
                && next == '['
            {
                for inner in chars.by_ref() {
                    if ('@'..='~').contains(&inner) {
                        break;
                    }
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Return the `$XDG_CACHE_HOME/dotfiles/` directory, creating it if needed.
fn cache_dir() -> Option<PathBuf> {
    let base = std::env::var("XDG_CACHE_HOME").map_or_else(
        |_| {
            std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .map_or_else(|_| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    );
    let dir = base.join("dotfiles");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Log file for `command` under the cache directory.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    Some(cache_dir()?.join(format!("{command}.log")))
}

/// Current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Current UTC time as `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_colors() {
        assert_eq!(strip_ansi("\x1b[31mERROR\x1b[0m hello"), "ERROR hello");
        assert_eq!(strip_ansi("no codes here"), "no codes here");
        assert_eq!(
            strip_ansi("\x1b[1;34m==>\x1b[0m \x1b[1mstage\x1b[0m"),
            "==> stage"
        );
    }

    #[test]
    fn strip_ansi_handles_cursor_sequences() {
        assert_eq!(strip_ansi("\x1b[2Jhello"), "hello");
        assert_eq!(strip_ansi("\x1b[Kworld"), "world");
        assert_eq!(strip_ansi(""), "");
    }

    #[test]
    fn time_formats_have_expected_shape() {
        let time = format_utc_time();
        assert_eq!(time.len(), 8);
        assert_eq!(time.matches(':').count(), 2);
        let datetime = format_utc_datetime();
        assert_eq!(datetime.len(), 19);
        assert!(datetime.contains(' '));
    }
}
