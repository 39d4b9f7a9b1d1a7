//! Subcommand implementations and their shared setup.
pub mod plan;
pub mod trace;
pub mod vars;
pub mod version;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::Settings;
use crate::engine::Engine;
use crate::fs::SystemSourceFs;
use crate::logging::Logger;
use crate::platform::Platform;
use crate::template::TemplateContext;

/// Shared state produced by the common command setup sequence.
///
/// Locates the repository, loads `dotfiles.toml`, settles the platform facts
/// and builds the resolution engine, so each command starts from a ready
/// [`Engine`].
#[derive(Debug)]
pub struct CommandSetup {
    /// Canonical repository root.
    pub root: PathBuf,
    /// Settings from `dotfiles.toml`, or defaults.
    pub settings: Settings,
    /// Platform facts after overrides.
    pub platform: Platform,
    /// Resolution engine over the repository layout.
    pub engine: Engine,
}

impl CommandSetup {
    /// Resolve the root, load settings and build the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be determined or the
    /// settings file fails to parse.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        let root = resolve_root(global)?;
        log.debug(&format!("root: {}", root.display()));

        let settings = Settings::load(&root)
            .with_context(|| format!("loading settings from {}", root.display()))?;
        let overrides = global.platform_overrides().or(settings.platform.clone());
        let platform = Platform::detect().with_overrides(&overrides);
        log.info(&format!(
            "platform: {} {} ({})",
            platform.os, platform.arch, platform.hostname
        ));

        let layout = settings.layout(&root);
        log.debug(&format!("variables: {}", layout.variables_index.display()));
        log.debug(&format!("jobs: {}", layout.jobs_index.display()));

        let engine = Engine::new(
            Box::new(SystemSourceFs),
            TemplateContext::from_process(&platform),
            layout,
        );
        Ok(Self {
            root,
            settings,
            platform,
            engine,
        })
    }
}

/// Determine the dotfiles root: `--root`, then `DOTFILES_ROOT`, then the
/// current directory.
///
/// # Errors
///
/// Returns an error if the chosen directory does not exist.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(ref root) = global.root {
        return canonical_root(root);
    }

    if let Ok(root) = std::env::var("DOTFILES_ROOT")
        && !root.is_empty()
    {
        return canonical_root(Path::new(&root));
    }

    let cwd = std::env::current_dir().context("cannot determine dotfiles root")?;
    canonical_root(&cwd)
}

fn canonical_root(path: &Path) -> Result<PathBuf> {
    dunce::canonicalize(path)
        .with_context(|| format!("cannot determine dotfiles root: {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resolve_root_uses_explicit_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let global = GlobalOpts {
            root: Some(dir.path().to_path_buf()),
            ..GlobalOpts::default()
        };
        let root = resolve_root(&global).unwrap();
        assert_eq!(root, dunce::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn resolve_root_rejects_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let global = GlobalOpts {
            root: Some(dir.path().join("absent")),
            ..GlobalOpts::default()
        };
        let err = resolve_root(&global).unwrap_err();
        assert!(err.to_string().contains("cannot determine dotfiles root"));
    }

    #[test]
    fn cli_overrides_beat_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(crate::config::SETTINGS_FILE),
            "[platform]\nos = \"freebsd\"\nhostname = \"pinned\"\n",
        )
        .expect("write");
        let global = GlobalOpts {
            root: Some(dir.path().to_path_buf()),
            os: Some("windows".to_string()),
            ..GlobalOpts::default()
        };
        let log = Logger::new("test");
        let setup = CommandSetup::init(&global, &log).unwrap();
        assert_eq!(setup.platform.os, "windows");
        assert_eq!(setup.platform.hostname, "pinned");
        assert_eq!(setup.settings.platform.os.as_deref(), Some("freebsd"));
    }
}
