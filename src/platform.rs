//! Platform facts: OS, architecture, shell and hostname.
use serde::Deserialize;
use serde_json::{Map, Value};

/// Platform facts for the current system, each independently overridable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system identifier (`linux`, `windows`, `macos`, ...).
    pub os: String,
    /// CPU architecture (`x86_64`, `aarch64`, ...).
    pub arch: String,
    /// Login shell path, empty when unknown.
    pub shell: String,
    /// Host name, `localhost` when it cannot be determined.
    pub hostname: String,
}

/// Optional replacements for detected facts.
///
/// Read from the `[platform]` table of `dotfiles.toml` and from CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformOverrides {
    /// Replacement OS identifier.
    pub os: Option<String>,
    /// Replacement architecture.
    pub arch: Option<String>,
    /// Replacement shell.
    pub shell: Option<String>,
    /// Replacement hostname.
    pub hostname: Option<String>,
}

impl PlatformOverrides {
    /// Combine two override sets; values in `self` take precedence.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            os: self.os.or(fallback.os),
            arch: self.arch.or(fallback.arch),
            shell: self.shell.or(fallback.shell),
            hostname: self.hostname.or(fallback.hostname),
        }
    }
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            shell: Self::detect_shell(),
            hostname: Self::detect_hostname(),
        }
    }

    /// Create a platform with explicit values (for testing and overrides).
    #[must_use]
    pub fn new(os: &str, arch: &str, shell: &str, hostname: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            shell: shell.to_string(),
            hostname: hostname.to_string(),
        }
    }

    /// Replace every fact that has an override.
    #[must_use]
    pub fn with_overrides(self, overrides: &PlatformOverrides) -> Self {
        Self {
            os: overrides.os.clone().unwrap_or(self.os),
            arch: overrides.arch.clone().unwrap_or(self.arch),
            shell: overrides.shell.clone().unwrap_or(self.shell),
            hostname: overrides.hostname.clone().unwrap_or(self.hostname),
        }
    }

    /// Map-shaped snapshot exposed to templates as `Platform`.
    #[must_use]
    pub fn facts(&self) -> Map<String, Value> {
        let mut facts = Map::new();
        facts.insert("OS".to_string(), Value::String(self.os.clone()));
        facts.insert("Arch".to_string(), Value::String(self.arch.clone()));
        facts.insert("Shell".to_string(), Value::String(self.shell.clone()));
        facts.insert("Hostname".to_string(), Value::String(self.hostname.clone()));
        facts
    }

    fn detect_shell() -> String {
        std::env::var("SHELL")
            .or_else(|_| std::env::var("COMSPEC"))
            .unwrap_or_default()
    }

    fn detect_hostname() -> String {
        let from_env = std::env::var("HOSTNAME").or_else(|_| std::env::var("COMPUTERNAME"));
        let from_file = || {
            std::fs::read_to_string("/etc/hostname")
                .map(|s| s.trim().to_string())
                .ok()
                .filter(|s| !s.is_empty())
        };
        from_env
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(from_file)
            .unwrap_or_else(|| "localhost".to_string())
    }
}
