//! Path-addressed reference store
//!
//! Maps a [`RefPath`] to a directory under the store root holding exactly
//! one record file plus any attachment files. Record writes are atomic
//! (temp file in the target directory, renamed over the old file), so a
//! reader never observes a truncated record. No cross-process lock is
//! taken; two simultaneous invocations against one store may race.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use imshelf_bibtex::{format_records, parse, ParseError, Record};
use tracing::debug;
use walkdir::WalkDir;

use crate::path::{InvalidPath, RefPath};

/// Store operation failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("reference not found: {0}")]
    NotFound(RefPath),
    #[error("reference already exists: {0}")]
    AlreadyExists(RefPath),
    #[error(transparent)]
    InvalidPath(#[from] InvalidPath),
    #[error("malformed record file for `{path}`: {source}")]
    Malformed {
        path: RefPath,
        source: ParseError,
    },
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A reference store rooted at one directory
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    record_file: String,
}

impl Store {
    /// Open a store at `root`. `storage_format` is the record file
    /// extension; the suite currently fixes it to `bib`.
    pub fn new(root: impl Into<PathBuf>, storage_format: &str) -> Self {
        Self {
            root: root.into(),
            record_file: format!("reference.{}", storage_format),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the record file inside every reference directory
    pub fn record_file_name(&self) -> &str {
        &self.record_file
    }

    /// Directory holding a reference
    pub fn dir(&self, path: &RefPath) -> PathBuf {
        path.to_fs_path(&self.root)
    }

    /// Record file location for a reference
    pub fn record_file(&self, path: &RefPath) -> PathBuf {
        self.dir(path).join(&self.record_file)
    }

    /// Whether a reference exists at this path.
    ///
    /// A directory without a record file is an organizational folder, not
    /// a reference.
    pub fn exists(&self, path: &RefPath) -> bool {
        self.record_file(path).is_file()
    }

    /// Read and parse the record file at this path
    pub fn read(&self, path: &RefPath) -> Result<Vec<Record>, StoreError> {
        let text = self.read_raw(path)?;
        parse(&text).map_err(|source| StoreError::Malformed {
            path: path.clone(),
            source,
        })
    }

    /// Read the record file verbatim (used by search and by exports, so
    /// hand-edited formatting in the store survives aggregation)
    pub fn read_raw(&self, path: &RefPath) -> Result<String, StoreError> {
        let file = self.record_file(path);
        if !file.is_file() {
            return Err(StoreError::NotFound(path.clone()));
        }
        fs::read_to_string(&file).map_err(|e| StoreError::io(file, e))
    }

    /// Write records to this path, creating the reference directory if
    /// absent and atomically replacing any previous record file
    pub fn write(&self, path: &RefPath, records: &[Record]) -> Result<(), StoreError> {
        let mut text = format_records(records);
        text.push('\n');
        self.write_raw(path, &text)
    }

    /// Write verbatim record text to this path with the same atomicity
    pub fn write_raw(&self, path: &RefPath, text: &str) -> Result<(), StoreError> {
        let dir = self.dir(path);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        // Temp file must live in the target directory so the rename stays
        // on one filesystem and replaces the record in a single step.
        let mut tmp =
            tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| StoreError::io(tmp.path().to_path_buf(), e))?;

        let target = dir.join(&self.record_file);
        tmp.persist(&target)
            .map_err(|e| StoreError::io(&target, e.error))?;
        debug!(reference = %path, "wrote record file");
        Ok(())
    }

    /// Create a new reference from record text, failing if one is already
    /// present at this path
    pub fn create(&self, path: &RefPath, text: &str) -> Result<(), StoreError> {
        if self.exists(path) {
            return Err(StoreError::AlreadyExists(path.clone()));
        }
        self.write_raw(path, text)
    }

    /// Enumerate reference paths at or below `prefix` (the whole store
    /// when `None`), in lexicographic order.
    ///
    /// Directories without a record file are organizational folders and
    /// are skipped silently. Each call re-walks the filesystem.
    pub fn list(&self, prefix: Option<&RefPath>) -> Result<Vec<RefPath>, StoreError> {
        let start = match prefix {
            Some(p) => self.dir(p),
            None => self.root.clone(),
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&start).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let at = e.path().map(Path::to_path_buf).unwrap_or_else(|| start.clone());
                StoreError::io(
                    at,
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walk error")),
                )
            })?;
            if !entry.file_type().is_dir() || entry.path() == self.root {
                continue;
            }
            if !entry.path().join(&self.record_file).is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .expect("walked path is under the store root");
            let Some(rel) = rel.to_str() else {
                debug!(path = %entry.path().display(), "skipping non-UTF-8 directory name");
                continue;
            };
            let rel = rel.replace(std::path::MAIN_SEPARATOR, "/");
            paths.push(RefPath::new(&rel)?);
        }

        paths.sort();
        Ok(paths)
    }
}
