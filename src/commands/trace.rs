//! Command: show where a variable came from.
use anyhow::{Context as _, Result};
use serde_json::Value;

use crate::cli::{GlobalOpts, TraceOpts};
use crate::logging::{Logger, StepStatus};
use crate::variables::TraceHit;

/// Resolve variables and print every contribution to `opts.key`.
///
/// # Errors
///
/// Returns an error if resolution fails or no file defines the key.
pub fn run(global: &GlobalOpts, opts: &TraceOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;

    log.stage(&format!("Tracing {}", opts.key));
    let variables = setup
        .engine
        .resolve_variables()
        .context("resolving variables")?;
    let hits = variables.trace(&opts.key);
    if hits.is_empty() {
        anyhow::bail!("no file defines '{}'", opts.key);
    }
    log.record_step(
        &opts.key,
        StepStatus::Ok,
        Some(&format!("{} definition(s)", hits.len())),
    );

    print!("{}", format_hits(&hits));
    if let Some(value) = variables.get(&opts.key) {
        println!("= {}", inline(value));
    }
    Ok(())
}

/// `file:line` followed by the raw value, and the rendered value when it
/// differs.
#[must_use]
pub fn format_hits(hits: &[TraceHit]) -> String {
    hits.iter()
        .map(|hit| {
            let location = hit.line.map_or_else(
                || hit.source_file.clone(),
                |line| format!("{}:{line}", hit.source_file),
            );
            let rendered = hit
                .processed_value
                .as_ref()
                .filter(|processed| *processed != &hit.raw_value)
                .map(|processed| format!("  => {}", inline(processed)))
                .unwrap_or_default();
            format!("{location}  {}{rendered}\n", inline(&hit.raw_value))
        })
        .collect()
}

fn inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
