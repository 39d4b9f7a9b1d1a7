//! Job resolution: an ordered, platform-filtered task list from a job index
//! and its conditional imports.
//!
//! Imports are followed depth-first before a file's own action keys, so a
//! task's `order` reflects its position in the flattened import tree.
//! Action keys within one file are visited in lexicographic order.
pub mod action;
mod task;
pub mod validation;

pub use action::Action;
pub use task::{Task, normalize};

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::{ResolveError, display_path};
use crate::fs::SourceFs;
use crate::imports::{ImportChain, ImportFile, ImportResolver};
use crate::template::{ConditionEvaluator, TemplateEngine};

/// Reserved key holding a job file's imports.
const IMPORTS_KEY: &str = "imports";

/// Loads job documents and produces the filtered task list.
pub struct JobResolver<'a> {
    fs: &'a dyn SourceFs,
    templates: &'a TemplateEngine,
    root: PathBuf,
    jobs_dir: PathBuf,
}

impl std::fmt::Debug for JobResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobResolver")
            .field("root", &self.root)
            .field("jobs_dir", &self.jobs_dir)
            .finish_non_exhaustive()
    }
}

impl<'a> JobResolver<'a> {
    /// Create a resolver; relative imports resolve against `jobs_dir` and
    /// paths are shown relative to `root`.
    #[must_use]
    pub fn new(
        fs: &'a dyn SourceFs,
        templates: &'a TemplateEngine,
        root: &Path,
        jobs_dir: &Path,
    ) -> Self {
        Self {
            fs,
            templates,
            root: root.to_path_buf(),
            jobs_dir: jobs_dir.to_path_buf(),
        }
    }

    /// Resolve the job tree rooted at `index`, evaluating import and task
    /// conditions against `variables`.
    ///
    /// A missing index yields no tasks.
    ///
    /// # Errors
    ///
    /// Returns an error for unreadable or malformed documents, missing or
    /// circular imports, unsupported action shapes and failing conditions.
    pub fn resolve(
        &self,
        index: &Path,
        variables: &Map<String, Value>,
        conditions: &mut ConditionEvaluator<'_>,
    ) -> Result<Vec<Task>, ResolveError> {
        if !self.fs.is_file(index) {
            tracing::debug!(
                "job index {} not found, no tasks to plan",
                display_path(index, &self.root)
            );
            return Ok(Vec::new());
        }
        let index = self
            .fs
            .canonicalize(index)
            .map_err(|source| ResolveError::Io {
                path: display_path(index, &self.root),
                source,
            })?;

        let mut tasks = Vec::new();
        let mut next_order = 0;
        let mut chain = ImportChain::new(&self.root);
        {
            let mut guard = chain.enter(&index)?;
            self.load(
                &index,
                guard.chain(),
                &mut tasks,
                &mut next_order,
                variables,
                conditions,
            )?;
        }

        let declared = tasks.len();
        let mut kept = Vec::with_capacity(declared);
        for task in tasks {
            if conditions.evaluate(task.condition(), variables)? {
                kept.push(task);
            } else {
                tracing::debug!(
                    "dropping {} '{}': condition `{}` is false",
                    task.action(),
                    task.id(),
                    task.condition()
                );
            }
        }
        tracing::debug!("planned {} of {declared} declared tasks", kept.len());
        Ok(kept)
    }

    fn load(
        &self,
        path: &Path,
        chain: &mut ImportChain,
        tasks: &mut Vec<Task>,
        next_order: &mut usize,
        variables: &Map<String, Value>,
        conditions: &mut ConditionEvaluator<'_>,
    ) -> Result<(), ResolveError> {
        let shown = display_path(path, &self.root);
        tracing::debug!("loading jobs from {shown}");

        let mut doc = Document::load(self.fs, path, &self.root)?;
        let imports: Vec<ImportFile> = doc.take(IMPORTS_KEY, &shown)?;

        let resolver = ImportResolver {
            fs: self.fs,
            templates: self.templates,
            base_dir: &self.jobs_dir,
            display_base: &self.root,
        };
        for import in &imports {
            let Some(target) = resolver.resolve(import, path, conditions, variables)? else {
                continue;
            };
            if !import.variables.is_empty() {
                tracing::warn!(
                    "{shown}: inline variables on job import '{}' are ignored",
                    import.path
                );
            }
            let mut guard = chain.enter(&target)?;
            self.load(&target, guard.chain(), tasks, next_order, variables, conditions)?;
        }

        let mut actions: Vec<(String, Value)> = doc.root.into_iter().collect();
        actions.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (action, value) in actions {
            tasks.extend(normalize(&action, value, &shown, next_order)?);
        }
        Ok(())
    }
}
