//! Export selection
//!
//! Compiles an ordered list of gitignore-style patterns into a predicate
//! over store-relative paths. The orientation is a whitelist: a path is
//! excluded unless some pattern matches it, later matching patterns
//! override earlier verdicts, and a `!`-prefixed pattern flips a prior
//! match back to excluded. Matching is a pure function of the pattern list
//! and the path string; the filesystem is never consulted.

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Pattern compilation failure
#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },
    #[error("failed to compile pattern set: {0}")]
    Compile(#[source] ignore::Error),
}

/// A compiled include/exclude matcher
#[derive(Debug)]
pub struct Selector {
    matcher: Gitignore,
}

impl Selector {
    /// Compile an ordered pattern list.
    ///
    /// Pattern syntax is gitignore glob syntax: `/`-anchored patterns
    /// match from the store root (`/cs/*` matches only direct children of
    /// `cs`), `**` matches at any depth, `!` negates.
    pub fn compile(patterns: &[String]) -> Result<Self, SelectorError> {
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|source| SelectorError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })?;
        }
        let matcher = builder.build().map_err(SelectorError::Compile)?;
        Ok(Self { matcher })
    }

    /// Include/exclude verdict for a store-relative path.
    ///
    /// A leading `/` on the queried path is tolerated.
    pub fn is_match(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.matcher.matched(path, false).is_ignore()
    }
}
