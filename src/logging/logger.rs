//! Structured logger with step summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::STAGE_TARGET;
use super::types::{Log, StepEntry, StepStatus};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Logger for one command run.
///
/// Every message also lands in `$XDG_CACHE_HOME/dotfiles/<command>.log`
/// through the file layer installed by
/// [`init_subscriber`](super::subscriber::init_subscriber).
#[derive(Debug)]
pub struct Logger {
    command: String,
    steps: Mutex<Vec<StepEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger for `command`; only the log file path is computed here.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            steps: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded steps.
    #[must_use]
    pub fn steps(&self) -> Vec<StepEntry> {
        self.steps.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!(command = %self.command, "{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!(command = %self.command, "{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, command = %self.command, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!(command = %self.command, "{msg}");
    }

    /// Log a debug message.
    pub fn debug(&self, msg: &str) {
        tracing::debug!(command = %self.command, "{msg}");
    }

    /// Record a step result for the summary.
    pub fn record_step(&self, name: &str, status: StepStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.steps.lock() {
            guard.push(StepEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Return `true` if any recorded step has failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.steps
            .lock()
            .is_ok_and(|g| g.iter().any(|s| s.status == StepStatus::Failed))
    }

    /// Log the summary of all recorded steps.
    pub fn print_summary(&self) {
        let steps = self.steps();
        if steps.is_empty() {
            return;
        }

        self.stage("Summary");
        for step in &steps {
            let (icon, color) = match step.status {
                StepStatus::Ok => ("✓", "\x1b[32m"),
                StepStatus::Warned => ("!", "\x1b[33m"),
                StepStatus::Skipped => ("○", "\x1b[2m"),
                StepStatus::Failed => ("✗", "\x1b[31m"),
            };
            let suffix = step
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", step.name));
        }

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error);

    fn record_step(&self, name: &str, status: StepStatus, message: Option<&str>) {
        self.record_step(name, status, message);
    }
}
