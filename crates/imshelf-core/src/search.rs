//! Reference search
//!
//! Case-insensitive substring scan over every record file in the store.
//! Results come back in store enumeration order; an unreadable record is
//! skipped with a warning, like in exports.

use tracing::warn;

use crate::path::RefPath;
use crate::store::{Store, StoreError};

/// One search hit
#[derive(Debug)]
pub struct FoundRef {
    pub path: RefPath,
    /// Verbatim record file contents
    pub content: String,
}

/// Find references whose record text contains `query` (case-insensitive)
pub fn find(store: &Store, query: &str) -> Result<Vec<FoundRef>, StoreError> {
    let needle = query.to_lowercase();
    let mut results = Vec::new();

    for path in store.list(None)? {
        let content = match store.read_raw(&path) {
            Ok(content) => content,
            Err(error) => {
                warn!(reference = %path, %error, "skipping unreadable reference");
                continue;
            }
        };
        if content.to_lowercase().contains(&needle) {
            results.push(FoundRef { path, content });
        }
    }

    Ok(results)
}
