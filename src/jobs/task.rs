//! Task records and normalization of action declarations.
use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::kind;
use crate::error::ResolveError;

/// Key holding a task's condition inside its declaration.
const CONDITION_KEY: &str = "condition";

/// One normalized unit of declared work.
///
/// `order` is the sequencing contract; `id` is for display only and need
/// not be unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    id: String,
    action: String,
    config: Map<String, Value>,
    #[serde(skip_serializing_if = "String::is_empty")]
    condition: String,
    source: String,
    order: usize,
}

impl Task {
    /// Build a task from one declaration, moving `condition` out of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnsupportedShape`] if the condition is neither
    /// a string nor a boolean.
    pub fn new(
        action: &str,
        mut config: Map<String, Value>,
        source: &str,
        order: usize,
    ) -> Result<Self, ResolveError> {
        let condition = match config.remove(CONDITION_KEY) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s,
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => {
                return Err(ResolveError::UnsupportedShape {
                    action: action.to_string(),
                    shape: format!("condition must be a string or boolean, found {}", kind(&other)),
                    source_file: source.to_string(),
                });
            }
        };
        let id = derive_id(action, &config, order);
        Ok(Self {
            id,
            action: action.to_string(),
            config,
            condition,
            source: source.to_string(),
            order,
        })
    }

    /// Display id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Action key the task was declared under.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Action payload, without the condition.
    #[must_use]
    pub const fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// Condition expression; empty when unconditional.
    #[must_use]
    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Declaring file, relative to the repository root.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Position across the whole import tree, starting at 0.
    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }
}

/// Normalize the value of one action key into tasks, numbering them from
/// `next_order`.
///
/// # Errors
///
/// Returns [`ResolveError::UnsupportedShape`] for null values, nested lists
/// and null list items.
pub fn normalize(
    action: &str,
    value: Value,
    source: &str,
    next_order: &mut usize,
) -> Result<Vec<Task>, ResolveError> {
    let unsupported = |shape: String| ResolveError::UnsupportedShape {
        action: action.to_string(),
        shape,
        source_file: source.to_string(),
    };

    let declarations = match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                declaration(item).map_err(|found| unsupported(format!("list item {i} is {found}")))
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => vec![
            declaration(other).map_err(|found| unsupported(format!("value is {found}")))?,
        ],
    };

    declarations
        .into_iter()
        .map(|config| {
            let task = Task::new(action, config, source, *next_order)?;
            *next_order += 1;
            Ok(task)
        })
        .collect()
}

/// A scalar becomes `{name: scalar}`; a mapping is taken as is.
fn declaration(value: Value) -> Result<Map<String, Value>, &'static str> {
    match value {
        Value::Object(map) => Ok(map),
        scalar @ (Value::String(_) | Value::Number(_) | Value::Bool(_)) => {
            let mut map = Map::new();
            map.insert("name".to_string(), scalar);
            Ok(map)
        }
        other => Err(kind(&other)),
    }
}

/// Display id from well-known config fields.
fn derive_id(action: &str, config: &Map<String, Value>, order: usize) -> String {
    for key in ["name", "path", "value"] {
        if let Some(text) = config.get(key).and_then(scalar_text) {
            return text;
        }
    }
    let pair = |from: &str, to: &str| {
        let from = config.get(from).and_then(scalar_text)?;
        let to = config.get(to).and_then(scalar_text)?;
        Some(format!("{from} -> {to}"))
    };
    if let Some(id) = pair("src", "dest").or_else(|| pair("source", "destination")) {
        return id;
    }
    if let Some(Value::Array(items)) = config.get("items") {
        return format!("{action} ({} items)", items.len());
    }
    format!("{action}-{order}")
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
