//! Domain-specific error types for the resolution engine.
//!
//! Internal modules return [`ResolveError`] while command handlers at the CLI
//! boundary convert it to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! ResolveError
//! ├── Parse              - malformed YAML document
//! ├── Io                 - unreadable document
//! ├── ImportNotFound     - declared import does not exist
//! ├── CircularImport     - path reappears in the active import chain
//! ├── Conflict           - two sources disagree on a variable
//! ├── Condition          - expression fails to compile/run/type-check
//! ├── Template           - render failure, with line/column when known
//! ├── UnsupportedShape   - action value is not scalar/list/object
//! └── InvalidTaskConfig  - task payload rejected at the executor boundary
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Top-level error type for a resolution run.
///
/// Every variant is fatal to the run; there is no partial result.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A document could not be parsed into the expected structure.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// Document path, relative to the base directory when possible.
        path: String,
        /// Underlying YAML or structure error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A document could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A declared import does not exist and was not skipped.
    #[error("Import '{path}' declared in {from} does not exist")]
    ImportNotFound {
        /// Resolved import path.
        path: String,
        /// File declaring the import.
        from: String,
    },

    /// An absolute path reappeared in the active import chain.
    #[error("Circular import: {}", .chain.join(" -> "))]
    CircularImport {
        /// The open chain, ending with the repeated path.
        chain: Vec<String>,
    },

    /// Two sources define the same key with different values.
    #[error(transparent)]
    Conflict(#[from] Box<VariableConflict>),

    /// A condition expression failed.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// A template failed to render.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// An action value has a shape that cannot be normalized into tasks.
    #[error("Unsupported value for action '{action}' in {source_file}: {shape}")]
    UnsupportedShape {
        /// Action key.
        action: String,
        /// Description of the shape encountered.
        shape: String,
        /// Declaring file.
        source_file: String,
    },

    /// A task payload does not match the structure its action requires.
    #[error("Invalid config for task '{task}' ({action}): {message}")]
    InvalidTaskConfig {
        /// Task display id.
        task: String,
        /// Action key.
        action: String,
        /// Deserialization message.
        message: String,
    },
}

impl ResolveError {
    /// Return the conflict details if this is a variable conflict.
    #[must_use]
    pub fn as_conflict(&self) -> Option<&VariableConflict> {
        match self {
            Self::Conflict(conflict) => Some(conflict.as_ref()),
            _ => None,
        }
    }
}

/// Two definitions of the same dotted key with unequal non-map values.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableConflict {
    /// Dotted key, e.g. `user.email`.
    pub key: String,
    /// Value merged first.
    pub existing: Value,
    /// File the existing value came from, relative to the base directory.
    pub existing_file: String,
    /// Value that collided with it.
    pub incoming: Value,
    /// File the incoming value came from, relative to the base directory.
    pub incoming_file: String,
}

impl VariableConflict {
    /// Multi-line rendering for operators.
    #[must_use]
    pub fn pretty(&self) -> String {
        let width = self.existing_file.len().max(self.incoming_file.len());
        format!(
            "variable conflict at '{key}'\n  \
             {existing_file:<width$}  {existing}\n  \
             {incoming_file:<width$}  {incoming}\n\
             define '{key}' in one file, or give both definitions the same value",
            key = self.key,
            existing_file = self.existing_file,
            existing = compact(&self.existing),
            incoming_file = self.incoming_file,
            incoming = compact(&self.incoming),
        )
    }
}

impl fmt::Display for VariableConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Variable conflict for '{}': {} ({}) vs {} ({})",
            self.key,
            compact(&self.existing),
            self.existing_file,
            compact(&self.incoming),
            self.incoming_file,
        )
    }
}

impl std::error::Error for VariableConflict {}

/// Failure stage of a condition expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionFailure {
    /// The expression did not compile.
    Compile,
    /// The expression raised an error while running.
    Evaluate,
    /// The expression produced something other than a boolean.
    NotBoolean,
}

impl fmt::Display for ConditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "does not compile"),
            Self::Evaluate => write!(f, "failed to evaluate"),
            Self::NotBoolean => write!(f, "is not boolean"),
        }
    }
}

/// A condition expression that could not produce a boolean.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Condition `{expression}` {failure}: {message}")]
pub struct ConditionError {
    /// Expression text as declared.
    pub expression: String,
    /// Stage that failed.
    pub failure: ConditionFailure,
    /// Detail from the expression engine.
    pub message: String,
}

/// A template render failure enriched with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    /// Template name (`<string>` for inline templates, else the file path).
    pub name: String,
    /// Error description from the renderer.
    pub message: String,
    /// 1-based line of the failure, when known.
    pub line: Option<usize>,
    /// 1-based column of the failure, when known.
    pub column: Option<usize>,
    /// Surrounding source lines with a caret marker, when known.
    pub snippet: Option<String>,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Template error in {}", self.name)?;
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, " at line {line}, column {column}")?,
            (Some(line), None) => write!(f, " at line {line}")?,
            _ => {}
        }
        write!(f, ": {}", self.message)?;
        if let Some(snippet) = &self.snippet {
            write!(f, "\n{snippet}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TemplateError {}

/// Display `path` relative to `base` when it lies inside it.
#[must_use]
pub fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .map_or_else(|_| path.to_path_buf(), PathBuf::from)
        .display()
        .to_string()
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}
