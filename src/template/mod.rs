//! Expression and template subsystem.
//!
//! Two evaluation modes share one context ([`TemplateContext`]):
//!
//! - **[`ConditionEvaluator`]** compiles boolean expressions once per run and
//!   evaluates them with chainable undefined lookups, so conditions on facts
//!   that are absent on this host fail closed.
//! - **[`TemplateEngine`]** renders strings, files and whole value trees with
//!   interpolation, `if`/`for` blocks and filters.
//!
//! Both are backed by [`minijinja`].

mod condition;
mod context;
mod snippet;

pub use condition::ConditionEvaluator;
pub use context::{TemplateContext, UserFacts};

use std::fmt::Write as _;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use minijinja::value::ValueKind;
use minijinja::{
    AutoEscape, Environment, Error, ErrorKind, Output, State, UndefinedBehavior, Value,
};
use serde_json::Map;

use crate::error::{ResolveError, TemplateError};
use crate::fs::SourceFs;

/// Name reported for inline templates.
const INLINE_NAME: &str = "<string>";

/// Template renderer with the engine's filters and tests registered.
pub struct TemplateEngine {
    /// Chainable undefined: used for values, files and conditions.
    env: Environment<'static>,
    /// Strict undefined: used for import paths, where an undefined
    /// reference marks the path as unresolved.
    strict: Environment<'static>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a renderer with custom filters and tests.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: build_environment(UndefinedBehavior::Chainable),
            strict: build_environment(UndefinedBehavior::Strict),
        }
    }

    /// The environment conditions are compiled in.
    pub(crate) const fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Render an inline template string.
    ///
    /// Strings without template syntax are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] positioned in `source` if rendering fails.
    pub fn render_str(
        &self,
        source: &str,
        ctx: &Map<String, serde_json::Value>,
    ) -> Result<String, TemplateError> {
        self.render_named(INLINE_NAME, source, ctx)
    }

    /// Render a template string reported under `name` in diagnostics.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] positioned in `source` if rendering fails.
    pub fn render_named(
        &self,
        name: &str,
        source: &str,
        ctx: &Map<String, serde_json::Value>,
    ) -> Result<String, TemplateError> {
        if !contains_template_syntax(source) {
            return Ok(source.to_string());
        }
        self.env
            .render_named_str(name, source, ctx)
            .map_err(|e| snippet::template_error(name, source, &e))
    }

    /// Read and render a template file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to render.
    pub fn render_file(
        &self,
        fs: &dyn SourceFs,
        path: &Path,
        ctx: &Map<String, serde_json::Value>,
    ) -> Result<String, ResolveError> {
        let source = fs.read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(self.render_named(&path.display().to_string(), &source, ctx)?)
    }

    /// Render every string leaf of `value`, including inside lists.
    ///
    /// Map keys and non-string leaves pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first render failure encountered.
    pub fn render_value(
        &self,
        value: &serde_json::Value,
        ctx: &Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, TemplateError> {
        use serde_json::Value as Json;
        match value {
            Json::String(s) => self.render_str(s, ctx).map(Json::String),
            Json::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.render_value(v, ctx)?);
                }
                Ok(Json::Object(out))
            }
            Json::Array(items) => items
                .iter()
                .map(|v| self.render_value(v, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Json::Array),
            other => Ok(other.clone()),
        }
    }

    /// Render an import path.
    ///
    /// Returns `Ok(None)` when the path references something undefined, or
    /// the output still contains template syntax: the path is unresolved on
    /// this host.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] for any other render failure.
    pub fn render_path(
        &self,
        source: &str,
        ctx: &Map<String, serde_json::Value>,
    ) -> Result<Option<String>, TemplateError> {
        if !contains_template_syntax(source) {
            return Ok(Some(source.to_string()));
        }
        match self.strict.render_named_str(INLINE_NAME, source, ctx) {
            Ok(rendered) if contains_template_syntax(&rendered) => Ok(None),
            Ok(rendered) => Ok(Some(rendered)),
            Err(e) if e.kind() == ErrorKind::UndefinedError => Ok(None),
            Err(e) => Err(snippet::template_error(INLINE_NAME, source, &e)),
        }
    }
}

/// Check if a string contains template syntax.
#[must_use]
pub fn contains_template_syntax(s: &str) -> bool {
    (s.contains("{{") && s.contains("}}"))
        || (s.contains("{%") && s.contains("%}"))
        || (s.contains("{#") && s.contains("#}"))
}

fn build_environment(undefined: UndefinedBehavior) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(undefined);
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_formatter(format_value);

    env.add_filter("b64encode", filter_b64encode);
    env.add_filter("b64decode", filter_b64decode);
    env.add_filter("basename", filter_basename);
    env.add_filter("dirname", filter_dirname);
    env.add_filter("regex_replace", filter_regex_replace);

    env.add_test("matches", test_matches);
    env
}

/// Booleans render as `true`/`false` so rendered flags compare equal to
/// the lowercase literals conditions are written with.
fn format_value(out: &mut Output<'_>, state: &State<'_, '_>, value: &Value) -> Result<(), Error> {
    if value.kind() == ValueKind::Bool {
        let text = if value.is_true() { "true" } else { "false" };
        return out
            .write_str(text)
            .map_err(|e| Error::new(ErrorKind::WriteFailure, e.to_string()));
    }
    minijinja::escape_formatter(out, state, value)
}

fn filter_b64encode(value: String) -> String {
    BASE64.encode(value.as_bytes())
}

fn filter_b64decode(value: String) -> Result<String, Error> {
    let bytes = BASE64
        .decode(value.trim())
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("invalid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("invalid UTF-8: {e}")))
}

fn filter_basename(value: String) -> String {
    Path::new(&value)
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
}

fn filter_dirname(value: String) -> String {
    Path::new(&value)
        .parent()
        .map_or_else(String::new, |p| p.to_string_lossy().into_owned())
}

fn compile_regex(pattern: &str) -> Result<regex::Regex, Error> {
    regex::Regex::new(pattern).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid regex `{pattern}`: {e}"),
        )
    })
}

fn filter_regex_replace(
    value: String,
    pattern: String,
    replacement: String,
) -> Result<String, Error> {
    Ok(compile_regex(&pattern)?
        .replace_all(&value, replacement.as_str())
        .into_owned())
}

/// `value is matches("pattern")`; undefined and non-string values never match.
fn test_matches(value: Value, pattern: String) -> Result<bool, Error> {
    let re = compile_regex(&pattern)?;
    Ok(value.as_str().is_some_and(|s| re.is_match(s)))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: serde_json::Value) -> Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn plain_strings_are_returned_unchanged() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render_str("no templates", &Map::new()).unwrap(), "no templates");
    }

    #[test]
    fn interpolates_variables() {
        let engine = TemplateEngine::new();
        let out = engine
            .render_str("hello {{ name }}", &ctx(json!({"name": "world"})))
            .unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn supports_conditionals_loops_and_filters() {
        let engine = TemplateEngine::new();
        let c = ctx(json!({"os": "linux", "pkgs": ["git", "vim"]}));
        let out = engine
            .render_str(
                "{% if os == 'linux' %}{% for p in pkgs %}{{ p | upper }} {% endfor %}{% endif %}",
                &c,
            )
            .unwrap();
        assert_eq!(out, "GIT VIM ");
    }

    #[test]
    fn booleans_render_lowercase() {
        let engine = TemplateEngine::new();
        let c = ctx(json!({"Platform": {"OS": "linux"}, "flag": false}));
        assert_eq!(engine.render_str("{{ 1 == 1 }}", &c).unwrap(), "true");
        assert_eq!(engine.render_str("{{ Platform.OS == 'linux' }}", &c).unwrap(), "true");
        assert_eq!(engine.render_str("{{ flag }}/{{ 2 }}", &c).unwrap(), "false/2");
        assert_eq!(
            engine.render_path("{{ Platform.OS == 'macos' }}.yaml", &c).unwrap(),
            Some("false.yaml".to_string())
        );
    }

    #[test]
    fn undefined_nested_lookup_renders_empty() {
        let engine = TemplateEngine::new();
        let out = engine
            .render_str("[{{ Platform.Missing.Deep }}]", &Map::new())
            .unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn custom_filters() {
        let engine = TemplateEngine::new();
        let c = ctx(json!({"p": "/home/me/.bashrc", "s": "hi"}));
        assert_eq!(engine.render_str("{{ p | basename }}", &c).unwrap(), ".bashrc");
        assert_eq!(engine.render_str("{{ p | dirname }}", &c).unwrap(), "/home/me");
        assert_eq!(engine.render_str("{{ s | b64encode }}", &c).unwrap(), "aGk=");
        assert_eq!(
            engine.render_str("{{ 'aGk=' | b64decode }}", &c).unwrap(),
            "hi"
        );
        assert_eq!(
            engine
                .render_str("{{ p | regex_replace('^/home/[a-z]+', '~') }}", &c)
                .unwrap(),
            "~/.bashrc"
        );
    }

    #[test]
    fn render_error_carries_position_and_snippet() {
        let engine = TemplateEngine::new();
        let err = engine
            .render_named("motd", "line one\n{{ name | nosuchfilter }}\n", &Map::new())
            .unwrap_err();
        assert_eq!(err.name, "motd");
        assert_eq!(err.line, Some(2));
        let snippet = err.snippet.expect("snippet");
        assert!(snippet.contains(">   2 | {{ name | nosuchfilter }}"));
    }

    #[test]
    fn render_value_walks_maps_and_lists() {
        let engine = TemplateEngine::new();
        let tree = json!({
            "greeting": "hi {{ who }}",
            "list": ["{{ who }}", 3, true],
            "nested": {"n": 1}
        });
        let out = engine
            .render_value(&tree, &ctx(json!({"who": "you"})))
            .unwrap();
        assert_eq!(
            out,
            json!({
                "greeting": "hi you",
                "list": ["you", 3, true],
                "nested": {"n": 1}
            })
        );
    }

    #[test]
    fn render_path_resolves_known_facts() {
        let engine = TemplateEngine::new();
        let c = ctx(json!({"Platform": {"OS": "linux"}}));
        assert_eq!(
            engine.render_path("os/{{ Platform.OS }}.yaml", &c).unwrap(),
            Some("os/linux.yaml".to_string())
        );
        assert_eq!(
            engine.render_path("plain.yaml", &c).unwrap(),
            Some("plain.yaml".to_string())
        );
    }

    #[test]
    fn render_path_with_unknown_fact_is_unresolved() {
        let engine = TemplateEngine::new();
        let c = ctx(json!({"Env": {}}));
        assert_eq!(
            engine.render_path("hosts/{{ Env.WORK_HOST }}.yaml", &c).unwrap(),
            None
        );
        assert_eq!(engine.render_path("{{ Nothing.here }}", &c).unwrap(), None);
    }

    #[test]
    fn render_path_with_syntax_error_fails() {
        let engine = TemplateEngine::new();
        assert!(engine.render_path("{{ broken ", &Map::new()).is_ok());
        assert!(engine.render_path("{{ a | }}", &Map::new()).is_err());
    }

    #[test]
    fn render_file_reads_through_source_fs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gitconfig.j2");
        std::fs::write(&path, "[user]\n  name = {{ user.name }}\n").expect("write");
        let engine = TemplateEngine::new();
        let out = engine
            .render_file(&crate::fs::SystemSourceFs, &path, &ctx(json!({"user": {"name": "me"}})))
            .unwrap();
        assert_eq!(out, "[user]\n  name = me\n");
    }

    #[test]
    fn detects_template_syntax() {
        assert!(contains_template_syntax("{{ x }}"));
        assert!(contains_template_syntax("{% if x %}{% endif %}"));
        assert!(!contains_template_syntax("plain {brace}"));
    }
}
