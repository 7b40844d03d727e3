//! Append-only diagnostic log files.
//!
//! A [`LogSink`] narrates the progress of an example routine into a plain text file for
//! later human inspection. The file carries no structure: every record appends exactly the
//! rendered template, nothing more.
//!
//! - [`LogSink::reset`] truncates (or creates) the target.
//! - [`LogSink::record`] appends one rendered record if its level passes the verbosity gate.
//!
//! Each record opens, appends and closes the target, so no file handle outlives a call.
//! Records written concurrently from several threads are not serialised and may interleave.
//!
//! # Example
//!
//! ```no_run
//! use hostfuncs::log_write;
//! use hostfuncs::logs::LogSink;
//!
//! let sink = LogSink::new("example.log");
//! sink.reset().unwrap();
//! log_write!(sink, 0, "looked up value par->%s = %g\n", "a", 3.5).unwrap();
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::{self, DEFAULT_PRINT_LEVEL};
use crate::errors::LogError;
use crate::printf::{self, Arg};

/// What to do when the log target cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Report [`LogError::TargetUnavailable`] to the caller.
    #[default]
    Strict,
    /// Drop the record and carry on.
    BestEffort,
}

/// Settings of a [`LogSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Records with a level above the threshold are skipped.
    pub threshold: i64,
    pub on_unavailable: FailurePolicy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PRINT_LEVEL,
            on_unavailable: FailurePolicy::Strict,
        }
    }
}

impl LogConfig {
    /// Configuration used by the exported entry points: the process-wide print level and
    /// best-effort writes.
    pub fn from_process() -> Self {
        Self {
            threshold: config::print_level(),
            on_unavailable: FailurePolicy::BestEffort,
        }
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_unavailable = policy;
        self
    }
}

/// A log file plus the settings used to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSink {
    target: PathBuf,
    config: LogConfig,
}

impl LogSink {
    /// Creates a sink with the default configuration (every level, strict).
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self::with_config(target, LogConfig::default())
    }

    pub fn with_config(target: impl Into<PathBuf>, config: LogConfig) -> Self {
        Self {
            target: target.into(),
            config,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn config(&self) -> LogConfig {
        self.config
    }

    /// Returns true if a record at `level` passes the verbosity gate.
    pub fn enabled(&self, level: i64) -> bool {
        level <= self.config.threshold
    }

    /// Truncates the target to zero length, creating it if needed.
    ///
    /// # Errors
    /// Returns [`LogError::TargetUnavailable`] if the file cannot be opened and the policy
    /// is [`FailurePolicy::Strict`].
    pub fn reset(&self) -> Result<(), LogError> {
        let opened = File::create(&self.target);
        self.settle(opened.map(drop))
    }

    /// Appends `template` rendered with `args` if `level` passes the gate.
    ///
    /// Skipped records are neither rendered nor touch the file.
    ///
    /// # Errors
    /// Returns [`LogError::Format`] if the template does not match the arguments, and
    /// [`LogError::TargetUnavailable`] as for [`reset`](Self::reset).
    pub fn record(&self, level: i64, template: &str, args: &[Arg<'_>]) -> Result<(), LogError> {
        if !self.enabled(level) {
            return Ok(());
        }
        let text = printf::format(template, args)?;
        self.append(text.as_bytes())
    }

    /// Appends `text` verbatim if `level` passes the gate.
    pub fn record_str(&self, level: i64, text: &str) -> Result<(), LogError> {
        if !self.enabled(level) {
            return Ok(());
        }
        self.append(text.as_bytes())
    }

    fn append(&self, bytes: &[u8]) -> Result<(), LogError> {
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.target)
            .and_then(|mut file| file.write_all(bytes));
        self.settle(written)
    }

    fn settle(&self, outcome: std::io::Result<()>) -> Result<(), LogError> {
        match (outcome, self.config.on_unavailable) {
            (Ok(()), _) => Ok(()),
            (Err(source), FailurePolicy::BestEffort) => {
                warn!(path = %self.target.display(), error = %source, "dropping log record");
                Ok(())
            }
            (Err(source), FailurePolicy::Strict) => Err(LogError::TargetUnavailable {
                path: self.target.clone(),
                source,
            }),
        }
    }
}

/// Records a printf-style message on a [`LogSink`].
///
/// Each argument is converted with [`Arg::from`](crate::printf::Arg), so integers, floats,
/// characters and strings can be passed directly.
///
/// ```no_run
/// # use hostfuncs::{log_write, logs::LogSink};
/// let sink = LogSink::new("example.log");
/// log_write!(sink, 0, "sizeof(par->N) = %d\n", 4).unwrap();
/// ```
#[macro_export]
macro_rules! log_write {
    ($sink:expr, $level:expr, $template:expr $(, $arg:expr)* $(,)?) => {
        $sink.record(
            $level,
            $template,
            &[$($crate::printf::Arg::from($arg)),*],
        )
    };
}
