//! Boolean condition evaluation with a per-run compiled-expression cache.
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use minijinja::value::ValueKind;
use minijinja::{Environment, Expression};
use serde_json::{Map, Value};

use super::TemplateEngine;
use crate::error::{ConditionError, ConditionFailure};

/// Compiles and evaluates condition expressions such as
/// `Platform.OS == "linux" and "work" in Platform.Hostname`.
///
/// Each distinct expression text is compiled once and kept for the lifetime
/// of the evaluator.  The cache is a plain map: one evaluator belongs to one
/// single-threaded resolution run and must not be shared across threads.
pub struct ConditionEvaluator<'env> {
    env: &'env Environment<'static>,
    cache: HashMap<String, Expression<'env, 'static>>,
}

impl std::fmt::Debug for ConditionEvaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.cache.keys().collect();
        keys.sort();
        f.debug_struct("ConditionEvaluator")
            .field("cache", &keys)
            .finish()
    }
}

impl<'env> ConditionEvaluator<'env> {
    /// Create an evaluator compiling into `templates`' environment.
    #[must_use]
    pub fn new(templates: &'env TemplateEngine) -> Self {
        Self {
            env: templates.environment(),
            cache: HashMap::new(),
        }
    }

    /// Evaluate `expression` against `ctx`.
    ///
    /// An empty or whitespace-only expression is `true`. An undefined or
    /// `none` result, e.g. a missing key as an `and`/`or` operand, is `false`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConditionError`] if the expression does not compile, fails
    /// while running, or yields anything other than a boolean.
    pub fn evaluate(
        &mut self,
        expression: &str,
        ctx: &Map<String, Value>,
    ) -> Result<bool, ConditionError> {
        let text = expression.trim();
        if text.is_empty() {
            return Ok(true);
        }

        let compiled = match self.cache.entry(text.to_string()) {
            Entry::Occupied(entry) => {
                tracing::trace!("condition cache hit: {text}");
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                let compiled = self
                    .env
                    .compile_expression_owned(text.to_string())
                    .map_err(|e| failure(text, ConditionFailure::Compile, &e))?;
                entry.insert(compiled)
            }
        };

        let value = compiled
            .eval(ctx)
            .map_err(|e| failure(text, ConditionFailure::Evaluate, &e))?;

        if matches!(value.kind(), ValueKind::Undefined | ValueKind::None) {
            return Ok(false);
        }
        if value.kind() != ValueKind::Bool {
            return Err(ConditionError {
                expression: text.to_string(),
                failure: ConditionFailure::NotBoolean,
                message: format!("evaluated to {} `{value}`", value.kind()),
            });
        }
        Ok(value.is_true())
    }

    /// Number of distinct expressions compiled so far.
    #[must_use]
    pub fn compiled(&self) -> usize {
        self.cache.len()
    }
}

fn failure(expression: &str, failure: ConditionFailure, err: &minijinja::Error) -> ConditionError {
    let message = err
        .detail()
        .map_or_else(|| err.kind().to_string(), |d| format!("{}: {d}", err.kind()));
    ConditionError {
        expression: expression.to_string(),
        failure,
        message,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Map<String, Value> {
        json!({
            "Platform": {"OS": "linux", "Hostname": "work-laptop"},
            "Env": {"CI": "false"},
            "groups": ["wheel", "docker"],
            "features": {"gui": true}
        })
        .as_object()
        .cloned()
        .unwrap_or_default()
    }

    #[test]
    fn empty_condition_is_true() {
        let engine = TemplateEngine::new();
        let mut eval = ConditionEvaluator::new(&engine);
        assert!(eval.evaluate("", &ctx()).unwrap());
        assert!(eval.evaluate("   ", &ctx()).unwrap());
        assert_eq!(eval.compiled(), 0);
    }

    #[test]
    fn comparisons_and_logic() {
        let engine = TemplateEngine::new();
        let mut eval = ConditionEvaluator::new(&engine);
        let c = ctx();
        assert!(eval.evaluate("Platform.OS == \"linux\"", &c).unwrap());
        assert!(!eval.evaluate("Platform.OS == \"windows\"", &c).unwrap());
        assert!(eval.evaluate("Platform.OS != \"windows\" and Env.CI == \"false\"", &c).unwrap());
        assert!(eval.evaluate("not features.gui or Platform.OS == \"linux\"", &c).unwrap());
        assert!(!eval.evaluate("not features.gui", &c).unwrap());
    }

    #[test]
    fn containment_membership_and_regex() {
        let engine = TemplateEngine::new();
        let mut eval = ConditionEvaluator::new(&engine);
        let c = ctx();
        assert!(eval.evaluate("\"work\" in Platform.Hostname", &c).unwrap());
        assert!(eval.evaluate("\"docker\" in groups", &c).unwrap());
        assert!(!eval.evaluate("\"audio\" in groups", &c).unwrap());
        assert!(eval.evaluate("Platform.Hostname is matches(\"^work-\")", &c).unwrap());
        assert!(!eval.evaluate("Platform.Hostname is matches(\"^home-\")", &c).unwrap());
    }

    #[test]
    fn missing_nested_keys_fail_closed() {
        let engine = TemplateEngine::new();
        let mut eval = ConditionEvaluator::new(&engine);
        let c = ctx();
        assert!(!eval.evaluate("Platform.Distro.Name == \"arch\"", &c).unwrap());
        assert!(!eval.evaluate("Env.WORK == \"1\"", &c).unwrap());
        assert!(!eval.evaluate("Nothing.At.All is matches(\".*\")", &c).unwrap());
    }

    #[test]
    fn missing_operands_of_logic_fail_closed() {
        let engine = TemplateEngine::new();
        let mut eval = ConditionEvaluator::new(&engine);
        let c: Map<String, Value> = json!({"Platform": {"OS": "linux"}, "Env": {"CI": "false"}})
            .as_object()
            .cloned()
            .unwrap_or_default();
        assert!(!eval.evaluate("features.gui", &c).unwrap());
        assert!(!eval.evaluate("Platform.OS == \"linux\" and features.gui", &c).unwrap());
        assert!(!eval.evaluate("Env.CI == \"true\" or features.gui", &c).unwrap());
        assert!(!eval.evaluate("false or features.gui", &c).unwrap());
        assert!(!eval.evaluate("none", &c).unwrap());
    }

    #[test]
    fn compile_error_is_reported() {
        let engine = TemplateEngine::new();
        let mut eval = ConditionEvaluator::new(&engine);
        let err = eval.evaluate("Platform.OS ==", &ctx()).unwrap_err();
        assert_eq!(err.failure, ConditionFailure::Compile);
        assert_eq!(err.expression, "Platform.OS ==");
    }

    #[test]
    fn non_boolean_result_is_an_error() {
        let engine = TemplateEngine::new();
        let mut eval = ConditionEvaluator::new(&engine);
        let err = eval.evaluate("Platform.OS", &ctx()).unwrap_err();
        assert_eq!(err.failure, ConditionFailure::NotBoolean);
        assert!(err.message.contains("linux"));
    }

    #[test]
    fn runtime_error_is_reported() {
        let engine = TemplateEngine::new();
        let mut eval = ConditionEvaluator::new(&engine);
        let err = eval
            .evaluate("Platform.OS is matches(\"(unclosed\")", &ctx())
            .unwrap_err();
        assert_eq!(err.failure, ConditionFailure::Evaluate);
    }

    #[test]
    fn expressions_compile_once() {
        let engine = TemplateEngine::new();
        let mut eval = ConditionEvaluator::new(&engine);
        let c = ctx();
        for _ in 0..3 {
            assert!(eval.evaluate("Platform.OS == \"linux\"", &c).unwrap());
        }
        assert!(eval.evaluate("  Platform.OS == \"linux\"  ", &c).unwrap());
        assert_eq!(eval.compiled(), 1);
        assert!(!eval.evaluate("Env.CI == \"true\"", &c).unwrap());
        assert_eq!(eval.compiled(), 2);
    }
}
