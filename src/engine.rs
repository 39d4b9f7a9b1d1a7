//! Resolution driver: variables first, then tasks filtered by them.
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ResolveError;
use crate::fs::SourceFs;
use crate::jobs::{JobResolver, Task};
use crate::template::{ConditionEvaluator, TemplateContext, TemplateEngine};
use crate::variables::{ResolvedVariables, VariableResolver};

/// Where the documents of a repository live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Repository root; paths in messages are shown relative to it.
    pub root: PathBuf,
    /// Variable index document.
    pub variables_index: PathBuf,
    /// Directory job imports resolve against.
    pub jobs_dir: PathBuf,
    /// Job index document.
    pub jobs_index: PathBuf,
}

impl Layout {
    /// Layout under `root`; relative arguments are joined onto it, and the
    /// job index onto the jobs directory.
    #[must_use]
    pub fn new(root: &Path, variables_index: &Path, jobs_dir: &Path, jobs_index: &Path) -> Self {
        let jobs_dir = root.join(jobs_dir);
        Self {
            root: root.to_path_buf(),
            variables_index: root.join(variables_index),
            jobs_index: jobs_dir.join(jobs_index),
            jobs_dir,
        }
    }
}

/// Result of one resolution run, handed to the executor layer.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Resolved variables, facts included.
    #[serde(serialize_with = "serialize_values")]
    pub variables: ResolvedVariables,
    /// Tasks surviving their conditions, in execution order.
    pub tasks: Vec<Task>,
}

fn serialize_values<S: serde::Serializer>(
    variables: &ResolvedVariables,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    variables.values().serialize(serializer)
}

/// Resolution engine for one repository.
pub struct Engine {
    fs: Box<dyn SourceFs>,
    templates: TemplateEngine,
    context: TemplateContext,
    layout: Layout,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("layout", &self.layout)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine reading through `fs`.
    #[must_use]
    pub fn new(fs: Box<dyn SourceFs>, context: TemplateContext, layout: Layout) -> Self {
        Self {
            fs,
            templates: TemplateEngine::new(),
            context,
            layout,
        }
    }

    /// The repository layout.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The renderer, for action content rendered by executors.
    #[must_use]
    pub const fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    /// Resolve the variable map.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`ResolveError`].
    pub fn resolve_variables(&self) -> Result<ResolvedVariables, ResolveError> {
        let mut conditions = ConditionEvaluator::new(&self.templates);
        self.variables_with(&mut conditions)
    }

    /// Resolve the task list against already resolved `variables`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`ResolveError`].
    pub fn resolve_tasks(&self, variables: &ResolvedVariables) -> Result<Vec<Task>, ResolveError> {
        let mut conditions = ConditionEvaluator::new(&self.templates);
        self.tasks_with(variables, &mut conditions)
    }

    /// Resolve variables, then tasks, sharing one condition cache.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`ResolveError`]; there is no partial plan.
    pub fn plan(&self) -> Result<Plan, ResolveError> {
        let mut conditions = ConditionEvaluator::new(&self.templates);
        self.plan_with(&mut conditions)
    }

    /// [`Engine::plan`] with a caller-owned condition cache.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`ResolveError`].
    pub fn plan_with(
        &self,
        conditions: &mut ConditionEvaluator<'_>,
    ) -> Result<Plan, ResolveError> {
        let variables = self.variables_with(conditions)?;
        let tasks = self.tasks_with(&variables, conditions)?;
        tracing::debug!(
            "plan ready: {} tasks, {} compiled conditions",
            tasks.len(),
            conditions.compiled()
        );
        Ok(Plan { variables, tasks })
    }

    fn variables_with(
        &self,
        conditions: &mut ConditionEvaluator<'_>,
    ) -> Result<ResolvedVariables, ResolveError> {
        VariableResolver::new(
            self.fs.as_ref(),
            &self.templates,
            &self.context,
            &self.layout.root,
        )
        .resolve(&self.layout.variables_index, conditions)
    }

    fn tasks_with(
        &self,
        variables: &ResolvedVariables,
        conditions: &mut ConditionEvaluator<'_>,
    ) -> Result<Vec<Task>, ResolveError> {
        JobResolver::new(
            self.fs.as_ref(),
            &self.templates,
            &self.layout.root,
            &self.layout.jobs_dir,
        )
        .resolve(&self.layout.jobs_index, variables.values(), conditions)
    }
}
