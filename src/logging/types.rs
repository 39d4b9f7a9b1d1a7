//! Core logging types: step entries, status, and the [`Log`] trait.

/// Outcome of one pipeline step for summary reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEntry {
    /// Step name, e.g. `variables` or `jobs`.
    pub name: String,
    /// Final status of the step.
    pub status: StepStatus,
    /// Optional detail (counts, warning totals, error text).
    pub message: Option<String>,
}

/// Status of a completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Step completed.
    Ok,
    /// Step completed with non-fatal warnings.
    Warned,
    /// Step was not run.
    Skipped,
    /// Step failed and ended the run.
    Failed,
}

/// Abstraction over logging backends, so command code can log to a
/// [`Logger`](super::logger::Logger) or a test double alike.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (suppressed on console unless verbose).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record a step result for the summary.
    fn record_step(&self, name: &str, status: StepStatus, message: Option<&str>);
}
