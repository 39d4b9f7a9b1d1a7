//! Filesystem abstraction for reading index, import and template files.
//!
//! Provides the [`SourceFs`] trait so that both resolution engines can be
//! unit-tested without touching the real filesystem.  Production code uses
//! [`SystemSourceFs`]; tests use the generated `MockSourceFs`.

use std::io;
use std::path::{Path, PathBuf};

/// Read-only filesystem queries used during resolution.
#[cfg_attr(test, mockall::automock)]
pub trait SourceFs {
    /// Returns `true` if `path` is an existing regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Read the whole file at `path` as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not valid UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Resolve `path` to an absolute, normalized form used as the identity
    /// of a file in the import chain.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not exist or cannot be resolved.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Production [`SourceFs`] implementation that delegates to [`std::fs`].
///
/// Canonicalization goes through [`dunce`] so Windows paths stay in their
/// familiar `C:\...` form instead of the `\\?\` UNC form.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSourceFs;

impl SourceFs for SystemSourceFs {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        dunce::canonicalize(path)
    }
}
