//! Command-line argument definitions.
use clap::{Parser, Subcommand};

use crate::platform::PlatformOverrides;

/// Top-level CLI entry point for the dotfiles resolution engine.
#[derive(Parser, Debug)]
#[command(
    name = "dotfiles",
    about = "Resolve dotfiles variables and plan tasks",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Override dotfiles root directory
    #[arg(long, global = true)]
    pub root: Option<std::path::PathBuf>,

    /// Pretend to run on this operating system
    #[arg(long, global = true)]
    pub os: Option<String>,

    /// Pretend to run on this CPU architecture
    #[arg(long, global = true)]
    pub arch: Option<String>,

    /// Override the detected shell
    #[arg(long, global = true)]
    pub shell: Option<String>,

    /// Override the detected hostname
    #[arg(long, global = true)]
    pub hostname: Option<String>,
}

impl GlobalOpts {
    /// Platform facts pinned on the command line.
    #[must_use]
    pub fn platform_overrides(&self) -> PlatformOverrides {
        PlatformOverrides {
            os: self.os.clone(),
            arch: self.arch.clone(),
            shell: self.shell.clone(),
            hostname: self.hostname.clone(),
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved variables
    Vars(VarsOpts),
    /// Resolve variables and jobs, then print the ordered task list
    Plan(PlanOpts),
    /// Show every file and line that contributed to a variable
    Trace(TraceOpts),
    /// Print version information
    Version,
}

/// Options for the `vars` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct VarsOpts {
    /// Print only this dotted key, e.g. `git.email`
    #[arg(short, long)]
    pub key: Option<String>,

    /// Print JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

/// Options for the `plan` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct PlanOpts {
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Options for the `trace` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct TraceOpts {
    /// Dotted variable key
    pub key: String,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_vars_with_key() {
        let cli = Cli::parse_from(["dotfiles", "vars", "--key", "git.email", "--json"]);
        assert!(
            matches!(&cli.command, Command::Vars(_)),
            "Expected Vars command"
        );
        if let Command::Vars(opts) = cli.command {
            assert_eq!(opts.key.as_deref(), Some("git.email"));
            assert!(opts.json);
        }
    }

    #[test]
    fn parse_plan() {
        let cli = Cli::parse_from(["dotfiles", "plan"]);
        assert!(matches!(cli.command, Command::Plan(_)));
    }

    #[test]
    fn parse_trace_key() {
        let cli = Cli::parse_from(["dotfiles", "trace", "editor"]);
        assert!(
            matches!(&cli.command, Command::Trace(_)),
            "Expected Trace command"
        );
        if let Command::Trace(opts) = cli.command {
            assert_eq!(opts.key, "editor");
        }
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["dotfiles", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["dotfiles", "-v", "plan"]);
        assert!(cli.verbose);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "dotfiles",
            "plan",
            "--os",
            "windows",
            "--hostname",
            "work-laptop",
            "--root",
            "/tmp/dots",
        ]);
        let overrides = cli.global.platform_overrides();
        assert_eq!(overrides.os.as_deref(), Some("windows"));
        assert_eq!(overrides.hostname.as_deref(), Some("work-laptop"));
        assert_eq!(overrides.arch, None);
        assert_eq!(cli.global.root, Some(std::path::PathBuf::from("/tmp/dots")));
    }

    #[test]
    fn trace_requires_key() {
        assert!(Cli::try_parse_from(["dotfiles", "trace"]).is_err());
    }
}
