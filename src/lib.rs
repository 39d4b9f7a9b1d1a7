//! Dotfiles resolution engine.
//!
//! Turns a repository of YAML documents into two things an executor can act
//! on: a single conflict-free variable map, and an ordered list of tasks
//! filtered for the current platform. Both sides follow conditional,
//! templated imports with cycle detection.
//!
//! The public API is organised into layers:
//!
//! - **[`template`]**: minijinja rendering, condition evaluation and the
//!   platform/env/user fact context
//! - **[`variables`]**: import-aware variable merging with provenance
//! - **[`jobs`]**: action normalization into ordered [`jobs::Task`]s
//! - **[`engine`]**: the resolution driver tying both together
//! - **[`commands`]**: top-level subcommand orchestration (`vars`, `plan`, `trace`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod fs;
pub mod imports;
pub mod jobs;
pub mod logging;
pub mod platform;
pub mod template;
pub mod variables;
