//! Variable resolution: one conflict-free variable map from an index
//! document and its conditional imports.
//!
//! Resolution order for a file is depth-first: each import (and then its
//! inline overrides) in declared order, followed by the file's own
//! `variables` block. Once the whole tree is merged, every string leaf is
//! rendered once against the platform facts overlaid with the raw tree, and
//! finally any fact not shadowed by a variable is added at the top level.
mod merge;
mod trace;

pub use merge::MergedTree;
pub use trace::{TraceHit, VariableSource};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::document::{Document, LineIndex};
use crate::error::{ResolveError, display_path};
use crate::fs::SourceFs;
use crate::imports::{ImportChain, ImportFile, ImportResolver};
use crate::template::{ConditionEvaluator, TemplateContext, TemplateEngine};

/// Block holding a file's own variables.
const VARIABLES_BLOCK: &str = "variables";
/// Block holding inline overrides on an import.
const IMPORT_VARIABLES_BLOCK: &str = "imports.variables";

/// Final variable map with provenance.
#[derive(Debug, Clone, Default)]
pub struct ResolvedVariables {
    values: Map<String, Value>,
    sources: Vec<VariableSource>,
    lines: HashMap<String, LineIndex>,
}

impl ResolvedVariables {
    /// The resolved map, including platform/env/user facts.
    #[must_use]
    pub const fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Dotted lookup such as `user.email` or `packages.0`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let root = self.values.get(parts.next()?)?;
        trace::walk(root, &parts.collect::<Vec<_>>())
    }

    /// Every recorded definition, in merge order.
    #[must_use]
    pub fn sources(&self) -> &[VariableSource] {
        &self.sources
    }

    /// Every file and line that contributed to dotted `key`.
    #[must_use]
    pub fn trace(&self, key: &str) -> Vec<TraceHit> {
        trace::trace(&self.sources, &self.lines, key)
    }
}

/// Loads and resolves the variable tree rooted at an index document.
pub struct VariableResolver<'a> {
    fs: &'a dyn SourceFs,
    templates: &'a TemplateEngine,
    context: &'a TemplateContext,
    root: PathBuf,
}

impl std::fmt::Debug for VariableResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableResolver")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Working state for one resolution call.
#[derive(Default)]
struct Accumulator {
    tree: MergedTree,
    sources: Vec<VariableSource>,
    lines: HashMap<String, LineIndex>,
}

impl Accumulator {
    fn merge(
        &mut self,
        variables: &Map<String, Value>,
        file: &str,
        block: &str,
    ) -> Result<(), ResolveError> {
        let index = self.lines.get(file);
        for (key, value) in variables {
            self.sources.push(VariableSource {
                key: key.clone(),
                raw_value: value.clone(),
                processed_value: None,
                source_file: file.to_string(),
                line: index.and_then(|i| i.line_of(&format!("{block}.{key}"))),
                block: block.to_string(),
            });
        }
        self.tree.merge(variables, file)?;
        Ok(())
    }
}

impl<'a> VariableResolver<'a> {
    /// Create a resolver; file paths in messages and provenance are shown
    /// relative to `root`.
    #[must_use]
    pub fn new(
        fs: &'a dyn SourceFs,
        templates: &'a TemplateEngine,
        context: &'a TemplateContext,
        root: &Path,
    ) -> Self {
        Self {
            fs,
            templates,
            context,
            root: root.to_path_buf(),
        }
    }

    /// Resolve the tree rooted at `index`.
    ///
    /// A missing index yields only the platform/env/user facts. Relative
    /// import paths resolve against the index's directory.
    ///
    /// # Errors
    ///
    /// Returns an error for unreadable or malformed documents, missing or
    /// circular imports, conflicting definitions, failing conditions and
    /// render failures.
    pub fn resolve(
        &self,
        index: &Path,
        conditions: &mut ConditionEvaluator<'_>,
    ) -> Result<ResolvedVariables, ResolveError> {
        let mut acc = Accumulator::default();

        if self.fs.is_file(index) {
            let index = self
                .fs
                .canonicalize(index)
                .map_err(|source| ResolveError::Io {
                    path: display_path(index, &self.root),
                    source,
                })?;
            let base_dir = index.parent().unwrap_or(self.root.as_path()).to_path_buf();
            let mut chain = ImportChain::new(&self.root);
            let mut guard = chain.enter(&index)?;
            self.load(&index, &base_dir, guard.chain(), &mut acc, conditions)?;
        } else {
            tracing::debug!(
                "variable index {} not found, continuing with facts only",
                display_path(index, &self.root)
            );
        }

        let Accumulator {
            tree,
            mut sources,
            lines,
        } = acc;
        let raw = tree.into_values();
        let ctx = self.context.with_variables(&raw);

        let rendered = self.templates.render_value(&Value::Object(raw), &ctx)?;
        let mut values = match rendered {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for source in &mut sources {
            source.processed_value = Some(self.templates.render_value(&source.raw_value, &ctx)?);
        }

        for (key, fact) in self.context.facts() {
            values.entry(key.clone()).or_insert_with(|| fact.clone());
        }

        tracing::debug!(
            "resolved {} variables from {} definitions",
            values.len(),
            sources.len()
        );
        Ok(ResolvedVariables {
            values,
            sources,
            lines,
        })
    }

    fn load(
        &self,
        path: &Path,
        base_dir: &Path,
        chain: &mut ImportChain,
        acc: &mut Accumulator,
        conditions: &mut ConditionEvaluator<'_>,
    ) -> Result<(), ResolveError> {
        let shown = display_path(path, &self.root);
        tracing::debug!("loading variables from {shown}");

        let mut doc = Document::load(self.fs, path, &self.root)?;
        let imports: Vec<ImportFile> = doc.take("imports", &shown)?;
        let variables: Map<String, Value> = doc.take("variables", &shown)?;
        acc.lines.insert(shown.clone(), doc.lines);

        let resolver = ImportResolver {
            fs: self.fs,
            templates: self.templates,
            base_dir,
            display_base: &self.root,
        };
        for import in &imports {
            let ctx = self.context.with_variables(acc.tree.values());
            let Some(target) = resolver.resolve(import, path, conditions, &ctx)? else {
                continue;
            };
            {
                let mut guard = chain.enter(&target)?;
                self.load(&target, base_dir, guard.chain(), acc, conditions)?;
            }
            if !import.variables.is_empty() {
                acc.merge(&import.variables, &shown, IMPORT_VARIABLES_BLOCK)?;
            }
        }

        acc.merge(&variables, &shown, VARIABLES_BLOCK)
    }
}
