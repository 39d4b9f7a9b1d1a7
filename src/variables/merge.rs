//! Conflict-checked deep merge of variable trees.
//!
//! Maps merge recursively. Any other pair of values at a shared key must be
//! equal; a differing value is a [`VariableConflict`] rather than an
//! override, so the outcome does not depend on which file is merged first.
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::VariableConflict;

/// Merged tree plus the file each dotted key was first defined in.
#[derive(Debug, Default, Clone)]
pub struct MergedTree {
    values: Map<String, Value>,
    origins: HashMap<String, String>,
}

impl MergedTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The merged values so far.
    #[must_use]
    pub const fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consume the tree, returning the merged values.
    #[must_use]
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    /// Merge `incoming`, defined in `file`, into the tree.
    ///
    /// # Errors
    ///
    /// Returns the first [`VariableConflict`] found. The tree may have been
    /// partially updated; callers treat a conflict as fatal.
    pub fn merge(
        &mut self,
        incoming: &Map<String, Value>,
        file: &str,
    ) -> Result<(), Box<VariableConflict>> {
        merge_into(&mut self.values, incoming, "", file, &mut self.origins)
    }

    /// File that defined `key`, or its nearest defined ancestor.
    #[must_use]
    pub fn origin_of(&self, key: &str) -> Option<&str> {
        nearest_origin(&self.origins, key)
    }
}

fn merge_into(
    target: &mut Map<String, Value>,
    incoming: &Map<String, Value>,
    prefix: &str,
    file: &str,
    origins: &mut HashMap<String, String>,
) -> Result<(), Box<VariableConflict>> {
    for (key, value) in incoming {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), value.clone());
                origins.insert(path, file.to_string());
            }
            Some(Value::Object(existing)) if value.is_object() => {
                if let Value::Object(nested) = value {
                    merge_into(existing, nested, &path, file, origins)?;
                }
            }
            Some(existing) if existing == value => {}
            Some(existing) => {
                let existing_file = nearest_origin(origins, &path)
                    .unwrap_or_default()
                    .to_string();
                return Err(Box::new(VariableConflict {
                    key: path,
                    existing: existing.clone(),
                    existing_file,
                    incoming: value.clone(),
                    incoming_file: file.to_string(),
                }));
            }
        }
    }
    Ok(())
}

fn nearest_origin<'a>(origins: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    let mut candidate = key;
    loop {
        if let Some(file) = origins.get(candidate) {
            return Some(file);
        }
        candidate = candidate.get(..candidate.rfind('.')?)?;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn equal_scalars_merge_in_either_order() {
        for (first, second) in [("a.yaml", "b.yaml"), ("b.yaml", "a.yaml")] {
            let mut tree = MergedTree::new();
            tree.merge(&map(json!({"editor": "vim"})), first).unwrap();
            tree.merge(&map(json!({"editor": "vim"})), second).unwrap();
            assert_eq!(tree.values().get("editor"), Some(&json!("vim")));
        }
    }

    #[test]
    fn differing_scalars_conflict_in_either_order() {
        let a = map(json!({"editor": "vim"}));
        let b = map(json!({"editor": "emacs"}));
        for (first, second) in [(&a, &b), (&b, &a)] {
            let mut tree = MergedTree::new();
            tree.merge(first, "first.yaml").unwrap();
            let conflict = tree.merge(second, "second.yaml").unwrap_err();
            assert_eq!(conflict.key, "editor");
            assert_eq!(conflict.existing_file, "first.yaml");
            assert_eq!(conflict.incoming_file, "second.yaml");
        }
    }

    #[test]
    fn nested_maps_union() {
        let mut tree = MergedTree::new();
        tree.merge(&map(json!({"user": {"name": "x"}})), "a.yaml").unwrap();
        tree.merge(&map(json!({"user": {"email": "y"}})), "b.yaml").unwrap();
        assert_eq!(
            Value::Object(tree.into_values()),
            json!({"user": {"name": "x", "email": "y"}})
        );
    }

    #[test]
    fn nested_conflict_names_dotted_key_and_defining_file() {
        let mut tree = MergedTree::new();
        tree.merge(&map(json!({"user": {"name": "x"}})), "a.yaml").unwrap();
        tree.merge(&map(json!({"user": {"email": "y"}})), "b.yaml").unwrap();
        let conflict = tree
            .merge(&map(json!({"user": {"email": "z"}})), "c.yaml")
            .unwrap_err();
        assert_eq!(conflict.key, "user.email");
        assert_eq!(conflict.existing, json!("y"));
        assert_eq!(conflict.existing_file, "b.yaml");
        assert_eq!(conflict.incoming, json!("z"));
    }

    #[test]
    fn map_against_scalar_conflicts() {
        let mut tree = MergedTree::new();
        tree.merge(&map(json!({"proxy": {"host": "p"}})), "a.yaml").unwrap();
        let conflict = tree.merge(&map(json!({"proxy": "none"})), "b.yaml").unwrap_err();
        assert_eq!(conflict.key, "proxy");
    }

    #[test]
    fn null_against_value_conflicts() {
        let mut tree = MergedTree::new();
        tree.merge(&map(json!({"proxy": null})), "a.yaml").unwrap();
        assert!(tree.merge(&map(json!({"proxy": "p"})), "b.yaml").is_err());
    }

    #[test]
    fn equal_lists_are_kept_and_differing_lists_conflict() {
        let mut tree = MergedTree::new();
        tree.merge(&map(json!({"pkgs": ["git", "vim"]})), "a.yaml").unwrap();
        tree.merge(&map(json!({"pkgs": ["git", "vim"]})), "b.yaml").unwrap();
        assert!(tree.merge(&map(json!({"pkgs": ["git"]})), "c.yaml").is_err());
    }

    #[test]
    fn origin_of_walks_up_to_nearest_definition() {
        let mut tree = MergedTree::new();
        tree.merge(&map(json!({"user": {"name": "x"}})), "a.yaml").unwrap();
        tree.merge(&map(json!({"user": {"email": "y"}})), "b.yaml").unwrap();
        assert_eq!(tree.origin_of("user.name"), Some("a.yaml"));
        assert_eq!(tree.origin_of("user.email"), Some("b.yaml"));
        assert_eq!(tree.origin_of("missing"), None);
    }
}
