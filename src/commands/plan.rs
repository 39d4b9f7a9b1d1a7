//! Command: resolve variables and jobs, then print the ordered task list.
use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, PlanOpts};
use crate::jobs::validation::{ValidationWarning, validate_actions};
use crate::jobs::{Action, Task};
use crate::logging::{Logger, StepStatus};

/// Run the plan command.
///
/// # Errors
///
/// Returns an error if resolution fails or any task payload does not match
/// its action.
pub fn run(global: &GlobalOpts, opts: &PlanOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;

    log.stage("Resolving variables and jobs");
    let plan = setup.engine.plan().context("resolving plan")?;
    log.record_step(
        "variables",
        StepStatus::Ok,
        Some(&format!("{} sources", plan.variables.sources().len())),
    );
    log.record_step(
        "jobs",
        StepStatus::Ok,
        Some(&format!("{} tasks", plan.tasks.len())),
    );

    log.stage("Validating actions");
    let typed = typed_actions(&plan.tasks)?;
    let warnings = validate_actions(&setup.root, &typed);
    report_warnings(&warnings, log);

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", format_plan(&plan.tasks));
    }

    log.print_summary();
    Ok(())
}

/// Pair every task with its typed action.
///
/// # Errors
///
/// Returns the first task whose payload does not fit its action.
pub fn typed_actions(tasks: &[Task]) -> Result<Vec<(Task, Action)>> {
    tasks
        .iter()
        .map(|task| Ok((task.clone(), Action::from_task(task)?)))
        .collect()
}

fn report_warnings(warnings: &[ValidationWarning], log: &Logger) {
    if warnings.is_empty() {
        log.record_step("validation", StepStatus::Ok, None);
        return;
    }
    log.warn(&format!("found {} action warning(s):", warnings.len()));
    for warning in warnings {
        log.warn(&format!(
            "  {} [{}]: {}",
            warning.source, warning.item, warning.message
        ));
    }
    log.record_step(
        "validation",
        StepStatus::Warned,
        Some(&format!("{} warning(s)", warnings.len())),
    );
}

/// One line per task: order, action, id and declaring file.
#[must_use]
pub fn format_plan(tasks: &[Task]) -> String {
    let width = tasks.iter().map(|t| t.action().len()).max().unwrap_or(0);
    tasks
        .iter()
        .map(|task| {
            let condition = if task.condition().is_empty() {
                String::new()
            } else {
                format!("  if {}", task.condition())
            };
            format!(
                "{}. {:<width$}  {}  ({}){condition}\n",
                task.order(),
                task.action(),
                task.id(),
                task.source()
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::jobs::normalize;
    use serde_json::json;

    fn tasks() -> Vec<Task> {
        let mut order = 0;
        let mut tasks =
            normalize("install", json!(["git", "vim"]), "jobs/index.yaml", &mut order).unwrap();
        let link = json!({
            "src": "zshrc",
            "dest": "~/.zshrc",
            "condition": "Platform.OS != \"windows\"",
        });
        tasks.extend(normalize("link", link, "jobs/shell.yaml", &mut order).unwrap());
        tasks
    }

    #[test]
    fn listing_aligns_actions() {
        insta::assert_snapshot!(format_plan(&tasks()), @r#"
        0. install  git  (jobs/index.yaml)
        1. install  vim  (jobs/index.yaml)
        2. link     zshrc -> ~/.zshrc  (jobs/shell.yaml)  if Platform.OS != "windows"
        "#);
    }

    #[test]
    fn run_records_steps_from_one_plan() {
        let dir = tempfile::tempdir().expect("tempdir");
        let jobs = dir.path().join("jobs");
        std::fs::create_dir_all(&jobs).expect("mkdir");
        std::fs::write(jobs.join("index.yaml"), "install: [git, vim]\n").expect("write");
        let global = GlobalOpts {
            root: Some(dir.path().to_path_buf()),
            os: Some("linux".to_string()),
            ..GlobalOpts::default()
        };
        let log = Logger::new("test");
        run(&global, &PlanOpts::default(), &log).unwrap();
        let steps: Vec<String> = log
            .steps()
            .into_iter()
            .map(|s| format!("{} {}", s.name, s.message.unwrap_or_default()))
            .collect();
        assert_eq!(steps, vec!["variables 0 sources", "jobs 2 tasks", "validation "]);
    }

    #[test]
    fn empty_plan_prints_nothing() {
        assert_eq!(format_plan(&[]), "");
    }

    #[test]
    fn typed_actions_reject_bad_payloads() {
        let mut order = 0;
        let bad =
            normalize("link", json!({"src": "zshrc"}), "jobs/index.yaml", &mut order).unwrap();
        let err = typed_actions(&bad).unwrap_err();
        assert!(err.to_string().contains("link-0"), "{err}");
    }
}
