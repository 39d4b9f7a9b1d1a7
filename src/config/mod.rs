//! Repository settings (`dotfiles.toml`).
mod toml_loader;

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::Layout;
use crate::platform::PlatformOverrides;

/// Settings file name, looked up at the repository root.
pub const SETTINGS_FILE: &str = "dotfiles.toml";

/// Repository settings; every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Variable index, relative to the root.
    pub variables_index: PathBuf,
    /// Jobs directory, relative to the root.
    pub jobs_dir: PathBuf,
    /// Job index, relative to the jobs directory.
    pub jobs_index: PathBuf,
    /// Pinned platform facts.
    pub platform: PlatformOverrides,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            variables_index: PathBuf::from("vars/index.yaml"),
            jobs_dir: PathBuf::from("jobs"),
            jobs_index: PathBuf::from("index.yaml"),
            platform: PlatformOverrides::default(),
        }
    }
}

impl Settings {
    /// Load `dotfiles.toml` from `root`, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        toml_loader::load_config(&root.join(SETTINGS_FILE))
    }

    /// Document layout under `root`.
    #[must_use]
    pub fn layout(&self, root: &Path) -> Layout {
        Layout::new(root, &self.variables_index, &self.jobs_dir, &self.jobs_index)
    }
}
