//! Shared fixtures for store integration tests

use std::fs;
use std::path::{Path, PathBuf};

use imshelf_core::Store;
use tempfile::TempDir;

/// A store rooted in a fresh temp directory
pub fn temp_store() -> (TempDir, Store) {
    let dir = TempDir::new().expect("create temp dir");
    let store = Store::new(dir.path(), "bib");
    (dir, store)
}

/// Write a file and return its path
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture file");
    path
}

/// A bulk import file with one record targeting `cs/ai_books`, carrying
/// two attachments
#[allow(dead_code)]
pub fn bulk_file_with_attachments(dir: &Path, a: &Path, b: &Path) -> PathBuf {
    let text = format!(
        "@book{{Sutton1998,\n    \
             author = {{Richard S. Sutton and Andrew G. Barto}},\n    \
             title = {{Reinforcement Learning: An Introduction}},\n    \
             year = {{1998}},\n    \
             collection = {{cs/ai_books}},\n    \
             file = {{{};{}}},\n\
         }}\n",
        a.display(),
        b.display()
    );
    write_file(dir, "bulk.bib", &text)
}
