//! Export aggregation engine
//!
//! Walks the store, selects references with an include/exclude pattern
//! list, and concatenates their record files into one destination file.
//! Matched paths are processed in lexicographic order and the destination
//! is rewritten from scratch, so an export over an unchanged store is
//! byte-identical across runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{expand_tilde, ExportSpec};
use crate::path::RefPath;
use crate::select::{Selector, SelectorError};
use crate::store::{Store, StoreError};

/// Failure of one export specification.
///
/// Each spec fails on its own; other specs in the same run still execute.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of one export specification
#[derive(Debug)]
pub struct ExportReport {
    pub destination: PathBuf,
    /// References aggregated into the destination, in output order
    pub exported: Vec<RefPath>,
    /// References that matched but were corrupt or vanished mid-scan; the
    /// export proceeds without them
    pub skipped: Vec<(RefPath, String)>,
}

/// Run one export specification against the store.
///
/// The destination's parent directories are created as needed and the
/// destination itself is fully overwritten.
pub fn run_export(store: &Store, spec: &ExportSpec) -> Result<ExportReport, ExportError> {
    let selector = Selector::compile(&spec.source)?;
    let destination = expand_tilde(&spec.destination);

    let mut exported = Vec::new();
    let mut skipped = Vec::new();
    let mut parts: Vec<String> = Vec::new();

    for path in store.list(None)? {
        if !selector.is_match(path.as_str()) {
            continue;
        }
        // The store is live; one corrupt or vanished reference must not
        // sink the whole export
        match store.read(&path) {
            Ok(records) => {
                parts.push(imshelf_bibtex::format_records(&records));
                exported.push(path);
            }
            Err(error) => {
                warn!(reference = %path, %error, "skipping unreadable reference");
                skipped.push((path, error.to_string()));
            }
        }
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|source| ExportError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut content = parts.join("\n\n");
    content.push('\n');
    fs::write(&destination, content).map_err(|source| ExportError::Write {
        path: destination.clone(),
        source,
    })?;

    info!(
        destination = %destination.display(),
        exported = exported.len(),
        skipped = skipped.len(),
        "export finished"
    );
    Ok(ExportReport {
        destination,
        exported,
        skipped,
    })
}

/// Run every export specification, in name order.
///
/// One spec's failure (a bad pattern, an unwritable destination) is
/// reported in its slot and does not stop the others.
pub fn run_exports(
    store: &Store,
    exports: &BTreeMap<String, ExportSpec>,
) -> Vec<(String, Result<ExportReport, ExportError>)> {
    exports
        .iter()
        .map(|(name, spec)| {
            let result = run_export(store, spec);
            if let Err(error) = &result {
                warn!(export = %name, %error, "export specification failed");
            }
            (name.clone(), result)
        })
        .collect()
}
