//! `dotfiles` binary: resolve variables and plan tasks for a dotfiles repository.
use std::process::ExitCode;

use clap::Parser;

use dotfiles_engine::cli::{Cli, Command};
use dotfiles_engine::commands;
use dotfiles_engine::error::ResolveError;
use dotfiles_engine::logging::{self, Logger};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    let name = match &args.command {
        Command::Vars(_) => "vars",
        Command::Plan(_) => "plan",
        Command::Trace(_) => "trace",
        Command::Version => {
            commands::version::run();
            return ExitCode::SUCCESS;
        }
    };
    logging::init_subscriber(args.verbose, name);
    let log = Logger::new(name);

    let result = match &args.command {
        Command::Vars(opts) => commands::vars::run(&args.global, opts, &log),
        Command::Plan(opts) => commands::plan::run(&args.global, opts, &log),
        Command::Trace(opts) => commands::trace::run(&args.global, opts, &log),
        Command::Version => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let conflict = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<ResolveError>())
                .and_then(ResolveError::as_conflict);
            match conflict {
                Some(conflict) => log.error(&conflict.pretty()),
                None => log.error(&format!("{err:#}")),
            }
            ExitCode::FAILURE
        }
    }
}
