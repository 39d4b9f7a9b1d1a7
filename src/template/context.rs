//! Shared evaluation context: platform, environment and user facts.
use serde_json::{Map, Value};

use crate::platform::Platform;

/// User facts exposed to templates as `User`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFacts {
    /// Home directory.
    pub home: String,
    /// Login name.
    pub name: String,
}

impl UserFacts {
    /// Read the current user from `HOME`/`USERPROFILE` and `USER`/`USERNAME`.
    #[must_use]
    pub fn from_process() -> Self {
        let home = if cfg!(target_os = "windows") {
            std::env::var("USERPROFILE").or_else(|_| std::env::var("HOME"))
        } else {
            std::env::var("HOME")
        };
        Self {
            home: home.unwrap_or_default(),
            name: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_default(),
        }
    }
}

/// Facts available to every condition and template, built once per run.
///
/// Top-level keys are `Platform`, `Env` and `User`.  Variable trees are
/// layered on top with [`TemplateContext::with_variables`].
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateContext {
    facts: Map<String, Value>,
}

impl TemplateContext {
    /// Build a context from explicit facts.
    pub fn new(
        platform: &Platform,
        env: impl IntoIterator<Item = (String, String)>,
        user: &UserFacts,
    ) -> Self {
        let env: Map<String, Value> = env
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        let mut user_map = Map::new();
        user_map.insert("Home".to_string(), Value::String(user.home.clone()));
        user_map.insert("Name".to_string(), Value::String(user.name.clone()));

        let mut facts = Map::new();
        facts.insert("Platform".to_string(), Value::Object(platform.facts()));
        facts.insert("Env".to_string(), Value::Object(env));
        facts.insert("User".to_string(), Value::Object(user_map));
        Self { facts }
    }

    /// Build a context from the running process.
    #[must_use]
    pub fn from_process(platform: &Platform) -> Self {
        Self::new(platform, std::env::vars(), &UserFacts::from_process())
    }

    /// The bare facts map.
    #[must_use]
    pub const fn facts(&self) -> &Map<String, Value> {
        &self.facts
    }

    /// Facts overlaid with `variables`; on a top-level clash the variable wins.
    #[must_use]
    pub fn with_variables(&self, variables: &Map<String, Value>) -> Map<String, Value> {
        let mut combined = self.facts.clone();
        for (key, value) in variables {
            combined.insert(key.clone(), value.clone());
        }
        combined
    }
}
