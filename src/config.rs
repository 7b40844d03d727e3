//! Process-wide settings for the exported entry points.
//!
//! The C surface has no way to thread a configuration object through every call, so the
//! print level and the log directory live here. Both can be overridden from the
//! environment:
//!
//! - `HOSTFUNCS_PRINT_LEVEL`: maximum level that is still written to log files
//! - `HOSTFUNCS_LOG_DIR`: directory the example log files are written to
//!
//! Rust callers should prefer passing a [`LogConfig`](crate::logs::LogConfig) explicitly.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;

use tracing::warn;

/// Environment variable holding the initial process-wide print level.
pub const PRINT_LEVEL_ENV: &str = "HOSTFUNCS_PRINT_LEVEL";

/// Environment variable naming the directory for example log files.
pub const LOG_DIR_ENV: &str = "HOSTFUNCS_LOG_DIR";

/// Every level is printed unless configured otherwise.
pub const DEFAULT_PRINT_LEVEL: i64 = i64::MAX;

static PRINT_LEVEL: OnceLock<AtomicI64> = OnceLock::new();

fn print_level_cell() -> &'static AtomicI64 {
    PRINT_LEVEL.get_or_init(|| AtomicI64::new(print_level_from_env()))
}

fn print_level_from_env() -> i64 {
    match std::env::var(PRINT_LEVEL_ENV) {
        Ok(raw) => parse_print_level(&raw).unwrap_or_else(|| {
            warn!(value = %raw, "ignoring invalid {PRINT_LEVEL_ENV}");
            DEFAULT_PRINT_LEVEL
        }),
        Err(_) => DEFAULT_PRINT_LEVEL,
    }
}

/// Parses a print level, accepting `max` as an alias for [`DEFAULT_PRINT_LEVEL`].
pub fn parse_print_level(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("max") {
        return Some(DEFAULT_PRINT_LEVEL);
    }
    raw.parse().ok()
}

/// Returns the current process-wide print level.
pub fn print_level() -> i64 {
    print_level_cell().load(Ordering::Relaxed)
}

/// Replaces the process-wide print level.
pub fn set_print_level(level: i64) {
    print_level_cell().store(level, Ordering::Relaxed);
}

/// Directory for example log files, the working directory by default.
pub fn log_dir() -> PathBuf {
    std::env::var_os(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolves `file_name` inside [`log_dir`].
pub fn log_path(file_name: &str) -> PathBuf {
    log_dir().join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_print_level() {
        assert_eq!(parse_print_level("3"), Some(3));
        assert_eq!(parse_print_level(" -1 "), Some(-1));
        assert_eq!(parse_print_level("MAX"), Some(i64::MAX));
        assert_eq!(parse_print_level("loud"), None);
    }

    #[test]
    fn test_log_path_joins_file_name() {
        assert!(log_path("example.log").ends_with("example.log"));
    }
}
