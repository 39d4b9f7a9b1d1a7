//! Command: print resolved variables.
use anyhow::{Context as _, Result};
use serde_json::Value;

use crate::cli::{GlobalOpts, VarsOpts};
use crate::logging::{Logger, StepStatus};
use crate::variables::ResolvedVariables;

/// Resolve variables and print the map, or the subtree under `--key`.
///
/// # Errors
///
/// Returns an error if setup or resolution fails, or the key is not defined.
pub fn run(global: &GlobalOpts, opts: &VarsOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;

    log.stage("Resolving variables");
    let variables = setup
        .engine
        .resolve_variables()
        .context("resolving variables")?;
    log.record_step(
        "variables",
        StepStatus::Ok,
        Some(&format!("{} top-level keys", variables.values().len())),
    );

    let text = render(&variables, opts)?;
    print!("{text}");
    Ok(())
}

/// Serialize the selected variables as YAML or pretty JSON.
///
/// # Errors
///
/// Returns an error if `opts.key` names no variable.
pub fn render(variables: &ResolvedVariables, opts: &VarsOpts) -> Result<String> {
    let selected = match opts.key.as_deref() {
        Some(key) => variables
            .get(key)
            .cloned()
            .with_context(|| format!("variable '{key}' is not defined"))?,
        None => Value::Object(variables.values().clone()),
    };

    if opts.json {
        let mut text = serde_json::to_string_pretty(&selected)?;
        text.push('\n');
        Ok(text)
    } else {
        Ok(serde_yaml::to_string(&selected)?)
    }
}
