//! Variable provenance records and key tracing.
use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::document::LineIndex;

/// One top-level key as defined by one block of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableSource {
    /// Top-level variable name.
    pub key: String,
    /// Value as merged, before rendering.
    pub raw_value: Value,
    /// Value after the render pass; `None` until rendering has run.
    pub processed_value: Option<Value>,
    /// Declaring file, relative to the repository root.
    pub source_file: String,
    /// Line of the key in `source_file`, when found.
    pub line: Option<usize>,
    /// Document path of the defining block (`variables` or `imports.variables`).
    #[serde(skip)]
    pub(crate) block: String,
}

/// One contribution to a traced key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceHit {
    /// Dotted key that was traced.
    pub key: String,
    /// Contributing file.
    pub source_file: String,
    /// Line of the innermost key found in `source_file`.
    pub line: Option<usize>,
    /// Value this file contributed at `key`, before rendering.
    pub raw_value: Value,
    /// Same value after rendering.
    pub processed_value: Option<Value>,
}

/// Every contribution to dotted `key`, in merge order.
pub(super) fn trace(
    sources: &[VariableSource],
    lines: &HashMap<String, LineIndex>,
    key: &str,
) -> Vec<TraceHit> {
    let mut hits = Vec::new();
    for source in sources {
        let Some(rest) = strip_root(key, &source.key) else {
            continue;
        };
        let path: Vec<&str> = rest.map(|r| r.split('.').collect()).unwrap_or_default();
        let Some(raw_value) = walk(&source.raw_value, &path) else {
            continue;
        };
        let processed_value = source
            .processed_value
            .as_ref()
            .and_then(|v| walk(v, &path))
            .cloned();
        let line = lines
            .get(&source.source_file)
            .and_then(|index| innermost_line(index, &source.block, key))
            .or(source.line);
        hits.push(TraceHit {
            key: key.to_string(),
            source_file: source.source_file.clone(),
            line,
            raw_value: raw_value.clone(),
            processed_value,
        });
    }
    hits
}

/// `Some(None)` if `key` is `root`, `Some(Some(rest))` if it is nested below it.
fn strip_root<'k>(key: &'k str, root: &str) -> Option<Option<&'k str>> {
    let rest = key.strip_prefix(root)?;
    if rest.is_empty() {
        return Some(None);
    }
    rest.strip_prefix('.').map(Some)
}

/// Look up a nested value; list items are addressed by index.
pub(super) fn walk<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, part| match current {
        Value::Object(map) => map.get(*part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Line of the deepest component of `key` the index knows about.
fn innermost_line(index: &LineIndex, block: &str, key: &str) -> Option<usize> {
    let parts: Vec<&str> = key.split('.').filter(|p| p.parse::<usize>().is_err()).collect();
    (1..=parts.len()).rev().find_map(|n| {
        let dotted = parts.get(..n)?.join(".");
        index.line_of(&format!("{block}.{dotted}"))
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(key: &str, raw: Value, processed: Value, file: &str) -> VariableSource {
        VariableSource {
            key: key.to_string(),
            raw_value: raw,
            processed_value: Some(processed),
            source_file: file.to_string(),
            line: Some(1),
            block: "variables".to_string(),
        }
    }

    #[test]
    fn walk_descends_maps_and_lists() {
        let v = json!({"a": {"b": [10, {"c": "x"}]}});
        assert_eq!(walk(&v, &["a", "b", "1", "c"]), Some(&json!("x")));
        assert_eq!(walk(&v, &["a", "b", "0"]), Some(&json!(10)));
        assert_eq!(walk(&v, &["a", "z"]), None);
        assert_eq!(walk(&v, &[]), Some(&v));
    }

    #[test]
    fn strip_root_requires_component_boundary() {
        assert_eq!(strip_root("user", "user"), Some(None));
        assert_eq!(strip_root("user.email", "user"), Some(Some("email")));
        assert_eq!(strip_root("username", "user"), None);
        assert_eq!(strip_root("shell", "user"), None);
    }

    #[test]
    fn trace_collects_every_contributing_file() {
        let index_a = LineIndex::scan("variables:\n  user:\n    name: x\n");
        let index_b = LineIndex::scan("# work\nvariables:\n  user:\n    email: \"{{ domain }}\"\n");
        let lines = HashMap::from([
            ("a.yaml".to_string(), index_a),
            ("b.yaml".to_string(), index_b),
        ]);
        let sources = vec![
            source("user", json!({"name": "x"}), json!({"name": "x"}), "a.yaml"),
            source(
                "user",
                json!({"email": "{{ domain }}"}),
                json!({"email": "example.com"}),
                "b.yaml",
            ),
            source("shell", json!("zsh"), json!("zsh"), "a.yaml"),
        ];

        let root = trace(&sources, &lines, "user");
        assert_eq!(root.len(), 2);
        assert_eq!(root.first().map(|h| h.line), Some(Some(2)));

        let email = trace(&sources, &lines, "user.email");
        assert_eq!(email.len(), 1);
        let hit = email.first().unwrap();
        assert_eq!(hit.source_file, "b.yaml");
        assert_eq!(hit.line, Some(4));
        assert_eq!(hit.raw_value, json!("{{ domain }}"));
        assert_eq!(hit.processed_value, Some(json!("example.com")));

        assert!(trace(&sources, &lines, "user.phone").is_empty());
        assert!(trace(&sources, &lines, "missing").is_empty());
    }
}
