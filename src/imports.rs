//! Import declarations, circular-import guard and shared import resolution.
//!
//! Both engines follow the same discipline for every declared import:
//!
//! 1. render the path (an unresolved placeholder skips the import),
//! 2. evaluate the optional condition (false skips the import),
//! 3. resolve relative paths against the engine's base directory and
//!    require the file to exist,
//! 4. enter the canonical path into the [`ImportChain`] through an
//!    [`ImportGuard`], which leaves the chain again when dropped.
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ResolveError, display_path};
use crate::fs::SourceFs;
use crate::template::{ConditionEvaluator, TemplateEngine};

/// One declared import, normalized from either a bare path string or a full
/// `{path, condition, variables}` object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ImportDecl")]
pub struct ImportFile {
    /// Path template.
    pub path: String,
    /// Optional condition gating the import.
    pub condition: Option<String>,
    /// Inline variable overrides merged after the imported file.
    pub variables: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportDecl {
    Path(String),
    Full {
        path: String,
        #[serde(default)]
        condition: Option<String>,
        #[serde(default)]
        variables: Map<String, Value>,
    },
}

impl From<ImportDecl> for ImportFile {
    fn from(decl: ImportDecl) -> Self {
        match decl {
            ImportDecl::Path(path) => Self {
                path,
                condition: None,
                variables: Map::new(),
            },
            ImportDecl::Full {
                path,
                condition,
                variables,
            } => Self {
                path,
                condition,
                variables,
            },
        }
    }
}

/// Stack of absolute paths currently being loaded.
#[derive(Debug)]
pub struct ImportChain {
    stack: Vec<PathBuf>,
    display_base: PathBuf,
}

impl ImportChain {
    /// Create an empty chain; paths in errors are shown relative to `display_base`.
    #[must_use]
    pub fn new(display_base: &Path) -> Self {
        Self {
            stack: Vec::new(),
            display_base: display_base.to_path_buf(),
        }
    }

    /// Push `path` onto the chain for the lifetime of the returned guard.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::CircularImport`] if `path` is already open.
    pub fn enter(&mut self, path: &Path) -> Result<ImportGuard<'_>, ResolveError> {
        if self.stack.iter().any(|open| open == path) {
            let chain = self
                .stack
                .iter()
                .map(PathBuf::as_path)
                .chain(std::iter::once(path))
                .map(|p| display_path(p, &self.display_base))
                .collect();
            return Err(ResolveError::CircularImport { chain });
        }
        self.stack.push(path.to_path_buf());
        Ok(ImportGuard { chain: self })
    }

    /// Number of files currently open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Scoped membership of one path in an [`ImportChain`].
///
/// Nested loads go through [`ImportGuard::chain`]; the path is popped when
/// the guard drops, on success and on every early error return alike.
#[derive(Debug)]
pub struct ImportGuard<'a> {
    chain: &'a mut ImportChain,
}

impl ImportGuard<'_> {
    /// The chain, for entering nested imports.
    pub fn chain(&mut self) -> &mut ImportChain {
        self.chain
    }
}

impl Drop for ImportGuard<'_> {
    fn drop(&mut self) {
        self.chain.stack.pop();
    }
}

/// Resolves declared imports to existing files for one engine.
pub(crate) struct ImportResolver<'a> {
    /// Reads and checks import targets.
    pub fs: &'a dyn SourceFs,
    /// Renders import paths.
    pub templates: &'a TemplateEngine,
    /// Directory relative import paths are joined onto.
    pub base_dir: &'a Path,
    /// Directory paths in messages are shown relative to.
    pub display_base: &'a Path,
}

impl ImportResolver<'_> {
    /// Resolve `import`, declared in `from`, to a canonical path.
    ///
    /// Returns `Ok(None)` when the import is skipped: its path is unresolved
    /// on this host or its condition is false.
    pub fn resolve(
        &self,
        import: &ImportFile,
        from: &Path,
        conditions: &mut ConditionEvaluator<'_>,
        ctx: &Map<String, Value>,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let Some(rendered) = self.templates.render_path(&import.path, ctx)? else {
            tracing::debug!(
                "skipping import '{}' from {}: unresolved placeholder",
                import.path,
                display_path(from, self.display_base)
            );
            return Ok(None);
        };

        if let Some(condition) = &import.condition
            && !conditions.evaluate(condition, ctx)?
        {
            tracing::debug!("skipping import '{rendered}': condition `{condition}` is false");
            return Ok(None);
        }

        let candidate = Path::new(&rendered);
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        };

        if !self.fs.is_file(&candidate) {
            return Err(ResolveError::ImportNotFound {
                path: display_path(&candidate, self.display_base),
                from: display_path(from, self.display_base),
            });
        }

        self.fs
            .canonicalize(&candidate)
            .map(Some)
            .map_err(|source| ResolveError::Io {
                path: display_path(&candidate, self.display_base),
                source,
            })
    }
}
