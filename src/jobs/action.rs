//! Typed action payloads handed to the executor layer.
//!
//! Resolution keeps task configs map-shaped; this module is the boundary
//! where a payload is checked against the structure its action expects.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Task;
use crate::error::ResolveError;

/// Install a package through the platform's package manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PackageAction {
    /// Package name.
    pub name: String,
    /// Manager override, e.g. `brew` or `winget`.
    #[serde(default)]
    pub manager: Option<String>,
}

/// Create a symlink at `dest` pointing to `src`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LinkAction {
    /// Link target, relative to the repository.
    pub src: String,
    /// Link location.
    pub dest: String,
    /// Replace an existing file at `dest`.
    #[serde(default)]
    pub force: bool,
}

/// Copy or render a file to `dest`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileAction {
    /// Source file, relative to the repository.
    pub src: String,
    /// Destination path.
    pub dest: String,
    /// Octal permission string such as `0600`.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Run a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CommandAction {
    /// Label, and the command itself when `run` is absent.
    pub name: String,
    /// Command line.
    #[serde(default)]
    pub run: Option<String>,
    /// Working directory.
    #[serde(default)]
    pub cwd: Option<String>,
}

impl CommandAction {
    /// The command line to execute.
    #[must_use]
    pub fn command_line(&self) -> &str {
        self.run.as_deref().unwrap_or(&self.name)
    }
}

/// Ensure a directory exists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryAction {
    /// Directory path.
    pub path: String,
    /// Octal permission string.
    #[serde(default)]
    pub mode: Option<String>,
}

/// A task converted to its action-specific structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// `package` / `install`.
    Package(PackageAction),
    /// `link`.
    Link(LinkAction),
    /// `copy`.
    Copy(FileAction),
    /// `template`.
    Template(FileAction),
    /// `command`.
    Command(CommandAction),
    /// `directory`.
    Directory(DirectoryAction),
    /// Any action this crate does not type; passed through untouched.
    Other {
        /// Action key.
        action: String,
        /// Raw payload.
        config: Map<String, Value>,
    },
}

impl Action {
    /// Convert `task` into its typed action.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidTaskConfig`] when the payload is
    /// missing required fields, has the wrong types, or carries unknown keys.
    pub fn from_task(task: &Task) -> Result<Self, ResolveError> {
        Ok(match task.action() {
            "package" | "install" => Self::Package(parse(task)?),
            "link" => Self::Link(parse(task)?),
            "copy" => Self::Copy(parse(task)?),
            "template" => Self::Template(parse(task)?),
            "command" => Self::Command(parse(task)?),
            "directory" => Self::Directory(parse(task)?),
            other => Self::Other {
                action: other.to_string(),
                config: task.config().clone(),
            },
        })
    }

    /// Short label for listings.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Package(_) => "package",
            Self::Link(_) => "link",
            Self::Copy(_) => "copy",
            Self::Template(_) => "template",
            Self::Command(_) => "command",
            Self::Directory(_) => "directory",
            Self::Other { .. } => "other",
        }
    }
}

fn parse<T: DeserializeOwned>(task: &Task) -> Result<T, ResolveError> {
    serde_json::from_value(Value::Object(task.config().clone())).map_err(|e| {
        ResolveError::InvalidTaskConfig {
            task: task.id().to_string(),
            action: task.action().to_string(),
            message: e.to_string(),
        }
    })
}
