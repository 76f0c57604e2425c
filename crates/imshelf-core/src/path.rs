//! Reference paths
//!
//! A reference path like `cs/ai_books/sutton_barto` is both the store key
//! for a reference and its directory location relative to the store root.

use std::fmt;
use std::path::{Path, PathBuf};

/// Rejected reference path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid reference path `{path}`: {reason}")]
pub struct InvalidPath {
    pub path: String,
    pub reason: &'static str,
}

/// A validated slash-delimited reference path.
///
/// Stored in normalized form: no leading, trailing, or doubled slashes.
/// Ordering is lexicographic on the normalized string, which is the order
/// store enumeration and exports use.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefPath(String);

impl RefPath {
    /// Validate and normalize a path string.
    ///
    /// Segments must be non-empty, must not be `.` or `..`, and must not
    /// contain characters that are illegal in common filesystems.
    pub fn new(path: &str) -> Result<Self, InvalidPath> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.is_empty() {
            return Err(InvalidPath {
                path: path.to_string(),
                reason: "path has no segments",
            });
        }

        for segment in &segments {
            if *segment == "." || *segment == ".." {
                return Err(InvalidPath {
                    path: path.to_string(),
                    reason: "`.` and `..` segments are not allowed",
                });
            }
            if segment
                .chars()
                .any(|c| c.is_control() || matches!(c, '\\' | ':' | '<' | '>' | '"' | '|' | '?' | '*'))
            {
                return Err(InvalidPath {
                    path: path.to_string(),
                    reason: "segment contains a character illegal in filesystem names",
                });
            }
        }

        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments from root to leaf
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Filesystem location of this reference under a store root
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut full = root.to_path_buf();
        for segment in self.segments() {
            full.push(segment);
        }
        full
    }
}

impl fmt::Display for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RefPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
