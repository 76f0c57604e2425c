//! Attachment materialization
//!
//! Places source files into a reference directory under one of three
//! transfer modes: hard link, copy, or move. Name collisions get a numeric
//! suffix instead of overwriting; per-file failures are collected so one
//! bad source never blocks the rest of the batch.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Rejected transfer mode string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transfer mode `{0}` (expected ln, cp, or mv)")]
pub struct InvalidTransferMode(pub String);

/// How a source attachment file becomes a destination attachment file.
///
/// A per-operation parameter; never persisted per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    /// Hard link (falls back to copy across filesystem boundaries)
    #[serde(rename = "ln")]
    Link,
    /// Byte-for-byte duplicate
    #[serde(rename = "cp")]
    Copy,
    /// Relocate, removing the source
    #[serde(rename = "mv")]
    Move,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Link => "ln",
            Self::Copy => "cp",
            Self::Move => "mv",
        }
    }
}

impl FromStr for TransferMode {
    type Err = InvalidTransferMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ln" => Ok(Self::Link),
            "cp" => Ok(Self::Copy),
            "mv" => Ok(Self::Move),
            other => Err(InvalidTransferMode(other.to_string())),
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one placement actually landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    Linked,
    Copied,
    Moved,
    /// Hard link requested, but source and destination are on different
    /// filesystems; the file was copied instead
    CrossDeviceFallback,
}

/// One successfully placed attachment
#[derive(Debug)]
pub struct Placed {
    pub source: PathBuf,
    /// Final file name inside the destination directory, after any
    /// collision disambiguation
    pub filename: String,
    pub outcome: PlaceOutcome,
}

/// One failed placement
#[derive(Debug)]
pub struct PlacementFailure {
    pub source: PathBuf,
    pub error: io::Error,
}

/// Outcome of one `place` call: partial success list plus per-file failures
#[derive(Debug, Default)]
pub struct PlacementReport {
    pub placed: Vec<Placed>,
    pub failed: Vec<PlacementFailure>,
}

impl PlacementReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Place each source file into `dest_dir` under the given mode.
///
/// The destination directory is created if absent. A failure placing one
/// source is recorded and does not abort the remaining placements.
pub fn place(sources: &[PathBuf], dest_dir: &Path, mode: TransferMode) -> PlacementReport {
    let mut report = PlacementReport::default();

    if let Err(error) = fs::create_dir_all(dest_dir) {
        // Nothing can land; report every source as failed.
        for source in sources {
            report.failed.push(PlacementFailure {
                source: source.clone(),
                error: io::Error::new(
                    error.kind(),
                    format!("cannot create {}: {}", dest_dir.display(), error),
                ),
            });
        }
        return report;
    }

    for source in sources {
        match place_one(source, dest_dir, mode) {
            Ok(placed) => report.placed.push(placed),
            Err(error) => {
                warn!(source = %source.display(), %error, "attachment placement failed");
                report.failed.push(PlacementFailure {
                    source: source.clone(),
                    error,
                });
            }
        }
    }

    report
}

fn place_one(source: &Path, dest_dir: &Path, mode: TransferMode) -> io::Result<Placed> {
    let base = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "source has no usable file name")
        })?;

    let filename = disambiguate(dest_dir, base);
    let dest = dest_dir.join(&filename);

    let outcome = match mode {
        TransferMode::Copy => {
            fs::copy(source, &dest)?;
            PlaceOutcome::Copied
        }
        TransferMode::Move => {
            match fs::rename(source, &dest) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                    fs::copy(source, &dest)?;
                    fs::remove_file(source)?;
                }
                Err(e) => return Err(e),
            }
            PlaceOutcome::Moved
        }
        TransferMode::Link => match fs::hard_link(source, &dest) {
            Ok(()) => PlaceOutcome::Linked,
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                warn!(
                    source = %source.display(),
                    "hard link crosses filesystems; copying instead"
                );
                fs::copy(source, &dest)?;
                PlaceOutcome::CrossDeviceFallback
            }
            Err(e) => return Err(e),
        },
    };

    Ok(Placed {
        source: source.to_path_buf(),
        filename,
        outcome,
    })
}

/// First free name for `base` in `dir`: `name.pdf`, then `name_1.pdf`,
/// `name_2.pdf`, ...
fn disambiguate(dir: &Path, base: &str) -> String {
    if !dir.join(base).exists() {
        return base.to_string();
    }

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };

    let mut n = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Newest regular file in a watch directory, by modification time.
///
/// Backs the "attach whatever I just downloaded" flow: an empty attachment
/// argument resolves to this file.
pub fn latest_in_watch_dir(dir: &Path) -> io::Result<PathBuf> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, entry.path()));
        }
    }

    newest.map(|(_, path)| path).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no files in watch directory {}", dir.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_mode_round_trip() {
        for s in ["ln", "cp", "mv"] {
            assert_eq!(s.parse::<TransferMode>().unwrap().as_str(), s);
        }
        assert!("symlink".parse::<TransferMode>().is_err());
    }

    #[test]
    fn test_copy_places_file() {
        let src_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let source = write_file(src_dir.path(), "paper.pdf", "pdf bytes");

        let report = place(&[source.clone()], dest_dir.path(), TransferMode::Copy);
        assert!(report.is_clean());
        assert_eq!(report.placed[0].filename, "paper.pdf");
        assert_eq!(report.placed[0].outcome, PlaceOutcome::Copied);
        assert!(source.exists());
        assert_eq!(
            fs::read_to_string(dest_dir.path().join("paper.pdf")).unwrap(),
            "pdf bytes"
        );
    }

    #[test]
    fn test_move_removes_source() {
        let src_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let source = write_file(src_dir.path(), "paper.pdf", "pdf bytes");

        let report = place(&[source.clone()], dest_dir.path(), TransferMode::Move);
        assert!(report.is_clean());
        assert!(!source.exists());
        assert!(dest_dir.path().join("paper.pdf").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_link_shares_inode() {
        use std::os::unix::fs::MetadataExt;

        let root = TempDir::new().unwrap();
        let dest = root.path().join("ref");
        let source = write_file(root.path(), "paper.pdf", "pdf bytes");

        let report = place(&[source.clone()], &dest, TransferMode::Link);
        assert!(report.is_clean());
        assert_eq!(report.placed[0].outcome, PlaceOutcome::Linked);

        let src_ino = fs::metadata(&source).unwrap().ino();
        let dest_ino = fs::metadata(dest.join("paper.pdf")).unwrap().ino();
        assert_eq!(src_ino, dest_ino);
    }

    #[test]
    fn test_collision_gets_numeric_suffix() {
        let src_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let first = write_file(src_dir.path(), "paper.pdf", "first");
        let second_dir = src_dir.path().join("other");
        fs::create_dir(&second_dir).unwrap();
        let second = write_file(&second_dir, "paper.pdf", "second");

        let report = place(&[first, second], dest_dir.path(), TransferMode::Copy);
        assert!(report.is_clean());

        let names: Vec<&str> = report.placed.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, vec!["paper.pdf", "paper_1.pdf"]);
        assert_eq!(
            fs::read_to_string(dest_dir.path().join("paper.pdf")).unwrap(),
            "first"
        );
        assert_eq!(
            fs::read_to_string(dest_dir.path().join("paper_1.pdf")).unwrap(),
            "second"
        );
    }

    #[test]
    fn test_missing_source_fails_without_blocking_rest() {
        let src_dir = TempDir::new().unwrap();
        let dest_dir = TempDir::new().unwrap();
        let good = write_file(src_dir.path(), "good.pdf", "ok");
        let missing = src_dir.path().join("missing.pdf");

        let report = place(&[missing, good], dest_dir.path(), TransferMode::Copy);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.placed.len(), 1);
        assert_eq!(report.placed[0].filename, "good.pdf");
    }

    #[test]
    fn test_suffix_goes_before_extension() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "notes.tar.gz", "x");
        assert_eq!(disambiguate(dir.path(), "notes.tar.gz"), "notes.tar_1.gz");

        write_file(dir.path(), "README", "x");
        assert_eq!(disambiguate(dir.path(), "README"), "README_1");
    }

    #[test]
    fn test_latest_in_watch_dir() {
        let dir = TempDir::new().unwrap();
        let old = write_file(dir.path(), "old.pdf", "x");
        let new = write_file(dir.path(), "new.pdf", "y");

        // Make the ordering unambiguous on coarse-mtime filesystems
        let earlier = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
        let file = fs::File::options().write(true).open(&old).unwrap();
        file.set_modified(earlier).unwrap();
        drop(file);

        assert_eq!(latest_in_watch_dir(dir.path()).unwrap(), new);
    }

    #[test]
    fn test_empty_watch_dir_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = latest_in_watch_dir(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
