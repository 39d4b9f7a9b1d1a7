// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed dotfiles repository and a fluent
// builder so each integration test can lay out variable and job documents
// without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dotfiles_engine::config::Settings;
use dotfiles_engine::engine::{Engine, Plan};
use dotfiles_engine::fs::SystemSourceFs;
use dotfiles_engine::jobs::Task;
use dotfiles_engine::platform::Platform;
use dotfiles_engine::template::{TemplateContext, UserFacts};

/// An isolated test repository backed by a [`tempfile::TempDir`].
///
/// The directory is automatically deleted when dropped.
pub struct TestRepo {
    /// Temporary directory holding the repository.
    pub root: tempfile::TempDir,
    env: Vec<(String, String)>,
}

impl TestRepo {
    /// Canonical path to the repository root.
    pub fn root_path(&self) -> PathBuf {
        dunce::canonicalize(self.root.path()).expect("canonical root")
    }

    /// Engine for `os`, with a fixed user and the builder's environment.
    pub fn engine(&self, os: &str) -> Engine {
        let root = self.root_path();
        let settings = Settings::load(&root).expect("load settings");
        let platform =
            Platform::new(os, "x86_64", "/bin/zsh", "testbox").with_overrides(&settings.platform);
        let context = TemplateContext::new(
            &platform,
            self.env.clone(),
            &UserFacts {
                home: "/home/tester".to_string(),
                name: "tester".to_string(),
            },
        );
        Engine::new(Box::new(SystemSourceFs), context, settings.layout(&root))
    }

    /// Resolve the full plan for `os`.
    pub fn plan(&self, os: &str) -> Plan {
        self.engine(os).plan().expect("plan")
    }
}

/// Fluent builder for [`TestRepo`].
pub struct TestRepoBuilder {
    repo: TestRepo,
}

impl TestRepoBuilder {
    /// Begin building an empty repository.
    pub fn new() -> Self {
        Self {
            repo: TestRepo {
                root: tempfile::tempdir().expect("create temp dir"),
                env: Vec::new(),
            },
        }
    }

    /// Write `content` to `rel` under the root, creating parent directories.
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        write(self.repo.root.path(), rel, content);
        self
    }

    /// Expose an environment variable to templates as `Env.<name>`.
    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.repo.env.push((name.to_string(), value.to_string()));
        self
    }

    /// Finish building and return the repository.
    pub fn build(self) -> TestRepo {
        self.repo
    }
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(&path, content).expect("write file");
}

/// `order action:id` per task, for compact assertions and snapshots.
pub fn listing(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|t| format!("{} {}:{} [{}]", t.order(), t.action(), t.id(), t.source()))
        .collect::<Vec<_>>()
        .join("\n")
}
