//! YAML document loading and key line lookup.
use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{ResolveError, display_path};
use crate::fs::SourceFs;

/// A parsed YAML document whose root is a mapping.
#[derive(Debug, Clone)]
pub struct Document {
    /// Root mapping; empty for an empty document.
    pub root: Map<String, Value>,
    /// Line numbers of the mapping keys in the source text.
    pub lines: LineIndex,
}

impl Document {
    /// Parse `text`; `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Parse`] if the text is not YAML or its root is
    /// not a mapping.
    pub fn parse(text: &str, path: &str) -> Result<Self, ResolveError> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| ResolveError::Parse {
            path: path.to_string(),
            source: Box::new(e),
        })?;
        let root = match value {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ResolveError::Parse {
                    path: path.to_string(),
                    source: format!(
                        "expected a mapping at the document root, found {}",
                        kind(&other)
                    )
                    .into(),
                });
            }
        };
        Ok(Self {
            root,
            lines: LineIndex::scan(text),
        })
    }

    /// Read and parse the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Io`] if the file cannot be read, or
    /// [`ResolveError::Parse`] if it is malformed.
    pub fn load(fs: &dyn SourceFs, path: &Path, display_base: &Path) -> Result<Self, ResolveError> {
        let shown = display_path(path, display_base);
        let text = fs.read_to_string(path).map_err(|source| ResolveError::Io {
            path: shown.clone(),
            source,
        })?;
        Self::parse(&text, &shown)
    }

    /// Remove `key` from the root and deserialize it, defaulting when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Parse`] if the value has the wrong structure.
    pub fn take<T>(&mut self, key: &str, path: &str) -> Result<T, ResolveError>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match self.root.remove(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value).map_err(|e| ResolveError::Parse {
                path: path.to_string(),
                source: format!("invalid '{key}': {e}").into(),
            }),
        }
    }
}

/// Human-readable name of a value's shape.
#[must_use]
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Maps dotted key paths to the 1-based line that declares them.
///
/// Built from the raw text with an indentation scan: list items contribute
/// their keys to the enclosing path without an index, and only the first
/// declaration of a path is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    lines: HashMap<String, usize>,
}

impl LineIndex {
    /// Scan YAML `text` for mapping keys.
    #[must_use]
    pub fn scan(text: &str) -> Self {
        let mut lines = HashMap::new();
        let mut stack: Vec<(usize, String)> = Vec::new();
        let mut block_scalar_indent: Option<usize> = None;

        for (number, raw) in text.lines().enumerate() {
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut indent = raw.len() - trimmed.len();

            if let Some(parent) = block_scalar_indent {
                if indent > parent {
                    continue;
                }
                block_scalar_indent = None;
            }

            let mut content = trimmed;
            while let Some(rest) = content.strip_prefix("- ") {
                let rest_trimmed = rest.trim_start();
                indent += content.len() - rest_trimmed.len();
                content = rest_trimmed;
            }

            let Some((key, value)) = split_key(content) else {
                continue;
            };

            while stack.last().is_some_and(|(i, _)| *i >= indent) {
                stack.pop();
            }
            let path = stack
                .iter()
                .map(|(_, k)| k.as_str())
                .chain(std::iter::once(key))
                .collect::<Vec<_>>()
                .join(".");
            lines.entry(path).or_insert(number + 1);

            let value = value.trim();
            if value.starts_with('|') || value.starts_with('>') {
                block_scalar_indent = Some(indent);
            }
            stack.push((indent, key.to_string()));
        }

        Self { lines }
    }

    /// Line declaring the dotted `path`, if found.
    #[must_use]
    pub fn line_of(&self, path: &str) -> Option<usize> {
        self.lines.get(path).copied()
    }
}

/// Split `key: value` on the first unquoted `: ` (or trailing `:`).
fn split_key(content: &str) -> Option<(&str, &str)> {
    if content.starts_with(['"', '\'']) {
        let quote = content.chars().next()?;
        let end = content.get(1..)?.find(quote)? + 1;
        let key = content.get(1..end)?;
        let rest = content.get(end + 1..)?;
        let value = rest.strip_prefix(':')?;
        return Some((key, value));
    }
    let idx = content
        .find(": ")
        .or_else(|| content.strip_suffix(':').map(str::len))?;
    let key = content.get(..idx)?.trim_end();
    if key.is_empty() || key.contains(['{', '[']) {
        return None;
    }
    Some((key, content.get(idx + 1..)?))
}
