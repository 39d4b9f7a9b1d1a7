//! TOML settings file parsing.
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load a TOML file into `T`.
///
/// A missing file deserializes from empty TOML, so every field falls back
/// to its serde default.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return toml::from_str("").context("Failed to create empty config");
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sample: Sample = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "name = [").expect("write");
        let err = load_config::<Sample>(&path).unwrap_err();
        assert!(format!("{err}").contains("bad.toml"));
    }
}
