//! Non-fatal checks on typed actions before they reach an executor.
use std::path::Path;

use super::{Action, Task};

/// Minimum length for octal mode strings.
const OCTAL_MODE_MIN_LEN: usize = 3;

/// Maximum length for octal mode strings.
const OCTAL_MODE_MAX_LEN: usize = 4;

/// A problem worth reporting that does not stop the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Declaring file of the task.
    pub source: String,
    /// Task display id.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Create a warning.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Check repository-relative sources exist and modes are octal.
///
/// Sources containing template syntax are left to the executor.
#[must_use]
pub fn validate_actions(root: &Path, actions: &[(Task, Action)]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    for (task, action) in actions {
        let (src, mode) = match action {
            Action::Link(link) => (Some(link.src.as_str()), None),
            Action::Copy(file) | Action::Template(file) => {
                (Some(file.src.as_str()), file.mode.as_deref())
            }
            Action::Directory(dir) => (None, dir.mode.as_deref()),
            Action::Package(_) | Action::Command(_) | Action::Other { .. } => (None, None),
        };

        if let Some(src) = src
            && !crate::template::contains_template_syntax(src)
            && !root.join(src).exists()
        {
            warnings.push(ValidationWarning::new(
                task.source(),
                task.id(),
                format!("source file does not exist: {src}"),
            ));
        }
        if let Some(message) = mode.and_then(validate_octal_mode) {
            warnings.push(ValidationWarning::new(task.source(), task.id(), message));
        }
    }
    warnings
}

/// Validates an octal mode string (e.g., "644", "0755").
///
/// Returns `Some(error_message)` if the mode is invalid, or `None` if valid.
fn validate_octal_mode(mode: &str) -> Option<String> {
    if !mode.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!(
            "invalid octal mode '{mode}': must contain only digits"
        ));
    }

    if mode.len() < OCTAL_MODE_MIN_LEN || mode.len() > OCTAL_MODE_MAX_LEN {
        return Some(format!(
            "invalid mode length '{mode}': \
             must be {OCTAL_MODE_MIN_LEN} or {OCTAL_MODE_MAX_LEN} digits"
        ));
    }

    if let Some(c) = mode.chars().find(|&c| c > '7') {
        return Some(format!("invalid octal digit '{c}' in mode '{mode}'"));
    }

    None
}
