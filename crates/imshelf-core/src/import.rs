//! Bulk import/merge engine
//!
//! Consumes a bibliography export whose records carry a hierarchical
//! collection path (`collection`, `collection1`, ... fields) and an
//! attachment list (`file` field, `;`-delimited absolute paths), and
//! materializes them into the store. Both fields are import-time-only:
//! they are stripped before anything is persisted, and attachment state
//! afterwards is only the files actually present in the reference
//! directory.
//!
//! A record at an already-occupied path is merged, not replaced: imported
//! fields layer onto the existing record, so fields added by hand in the
//! store survive re-imports.

use std::fs;
use std::path::{Path, PathBuf};

use imshelf_bibtex::{parse, ParseError, Record};
use tracing::{info, warn};

use crate::attach::{place, PlaceOutcome, TransferMode};
use crate::path::RefPath;
use crate::store::{Store, StoreError};

/// Failure that aborts an entire import run.
///
/// Only reading or parsing the bulk file is fatal: its contents are small
/// and user-authored, and a partial, corrupted import must not occur.
/// Everything after the parse is per-reference and collected in the
/// [`ImportReport`].
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },
}

/// One reference that could not be written
#[derive(Debug)]
pub struct ImportFailure {
    pub path: String,
    pub error: StoreError,
}

/// Outcome summary of one import run
#[derive(Debug, Default)]
pub struct ImportReport {
    /// References written (created or merged), in processing order
    pub written: Vec<RefPath>,
    /// Attachments successfully placed across all references
    pub attachments: usize,
    /// Non-fatal problems: placement failures, hardlink fallbacks
    pub warnings: Vec<String>,
    /// References skipped because of a store failure
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.failures.is_empty()
    }
}

/// Import a bulk record file into the store.
///
/// Aborts before touching the store if the file does not parse; otherwise
/// processes entries in source order and reports per-reference results.
pub fn import_file(
    store: &Store,
    bulk_file: &Path,
    mode: TransferMode,
) -> Result<ImportReport, ImportError> {
    let text = fs::read_to_string(bulk_file).map_err(|source| ImportError::Read {
        path: bulk_file.to_path_buf(),
        source,
    })?;
    let records = parse(&text).map_err(|source| ImportError::Parse {
        path: bulk_file.to_path_buf(),
        source,
    })?;

    Ok(import_records(store, records, mode))
}

/// Import already-parsed records into the store
pub fn import_records(store: &Store, records: Vec<Record>, mode: TransferMode) -> ImportReport {
    let mut report = ImportReport::default();

    // Group by destination path, preserving first-seen order
    let mut groups: Vec<(RefPath, Vec<Entry>)> = Vec::new();
    for record in records {
        let entry = Entry::extract(record);
        let path = match &entry.destination {
            Ok(path) => path.clone(),
            Err(e) => {
                report.failures.push(ImportFailure {
                    path: e.path.clone(),
                    error: StoreError::InvalidPath(e.clone()),
                });
                continue;
            }
        };
        match groups.iter_mut().find(|(p, _)| *p == path) {
            Some((_, entries)) => entries.push(entry),
            None => groups.push((path, vec![entry])),
        }
    }

    for (path, entries) in groups {
        import_group(store, &path, entries, mode, &mut report);
    }

    info!(
        written = report.written.len(),
        attachments = report.attachments,
        warnings = report.warnings.len(),
        failures = report.failures.len(),
        "import finished"
    );
    report
}

/// One bulk-file record after the collection/file pre-pass
struct Entry {
    record: Record,
    destination: Result<RefPath, crate::path::InvalidPath>,
    files: Vec<PathBuf>,
}

impl Entry {
    /// Strip `collection`/`collectionN` and `file` fields from a record
    /// and resolve its destination path and attachment list
    fn extract(mut record: Record) -> Self {
        let collection = take_collection_path(&mut record);
        let files = take_file_list(&mut record);

        let destination = match collection {
            Some(joined) => RefPath::new(&joined),
            // No collection in the source; file it under a stable
            // catch-all path keyed by the cite key
            None => RefPath::new(&format!("imported/{}", record.key)),
        };

        Self {
            record,
            destination,
            files,
        }
    }
}

/// Collect the `collection`/`collectionN` sibling fields into one nested
/// path: sorted by numeric suffix (absent suffix = 0), values joined with
/// `/`. The numbered-sibling encoding is a flat-field artifact of the
/// source format, so it is resolved here, not in the store.
fn take_collection_path(record: &mut Record) -> Option<String> {
    let mut parts: Vec<(u32, String)> = Vec::new();

    let mut index = 0;
    while index < record.fields.len() {
        match collection_suffix(&record.fields[index].name) {
            Some(n) => {
                let field = record.fields.remove(index);
                parts.push((n, field.value));
            }
            None => index += 1,
        }
    }

    if parts.is_empty() {
        return None;
    }
    parts.sort_by_key(|(n, _)| *n);
    Some(
        parts
            .into_iter()
            .map(|(_, value)| value)
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// `collection` -> 0, `collection3` -> 3, anything else -> None
fn collection_suffix(name: &str) -> Option<u32> {
    let rest = name.to_lowercase();
    let rest = rest.strip_prefix("collection")?;
    if rest.is_empty() {
        Some(0)
    } else {
        rest.parse().ok()
    }
}

/// Split the `file` field on `;`, dropping empty components
fn take_file_list(record: &mut Record) -> Vec<PathBuf> {
    record
        .remove_field("file")
        .map(|list| {
            list.split(';')
                .filter(|part| !part.trim().is_empty())
                .map(|part| PathBuf::from(part.trim()))
                .collect()
        })
        .unwrap_or_default()
}

fn import_group(
    store: &Store,
    path: &RefPath,
    entries: Vec<Entry>,
    mode: TransferMode,
    report: &mut ImportReport,
) {
    // Load whatever is already at the destination; a corrupted existing
    // record cannot be merged into, so the whole group is skipped
    let existing = if store.exists(path) {
        match store.read(path) {
            Ok(records) => records,
            Err(error) => {
                warn!(reference = %path, %error, "cannot merge into existing record");
                report.failures.push(ImportFailure {
                    path: path.to_string(),
                    error,
                });
                return;
            }
        }
    } else {
        Vec::new()
    };

    let incoming_count = entries.len();
    let mut merged = existing;
    let mut sources: Vec<PathBuf> = Vec::new();
    for entry in entries {
        sources.extend(entry.files.iter().cloned());
        merge_record(&mut merged, entry.record, incoming_count);
    }

    // Attachments first; their failures warn but never block the record
    if !sources.is_empty() {
        let placement = place(&sources, &store.dir(path), mode);
        report.attachments += placement.placed.len();
        for placed in &placement.placed {
            if placed.outcome == PlaceOutcome::CrossDeviceFallback {
                report.warnings.push(format!(
                    "{}: hard link to {} crosses filesystems, copied instead",
                    path,
                    placed.source.display()
                ));
            }
        }
        for failure in &placement.failed {
            report.warnings.push(format!(
                "{}: failed to attach {}: {}",
                path,
                failure.source.display(),
                failure.error
            ));
        }
    }

    match store.write(path, &merged) {
        Ok(()) => report.written.push(path.clone()),
        Err(error) => report.failures.push(ImportFailure {
            path: path.to_string(),
            error,
        }),
    }
}

/// Layer an imported record onto the records already at its destination.
///
/// Alignment is by cite key; on a match, imported field values win and
/// old-only fields are retained, with the existing field order kept
/// stable. A reference holding a single record absorbs a single imported
/// record even under a changed cite key (re-imports track upstream key
/// renames). Anything else appends.
fn merge_record(existing: &mut Vec<Record>, incoming: Record, incoming_count: usize) {
    if let Some(target) = existing.iter_mut().find(|r| r.key == incoming.key) {
        layer_fields(target, incoming);
        return;
    }

    if existing.len() == 1 && incoming_count == 1 {
        let target = &mut existing[0];
        target.key = incoming.key.clone();
        layer_fields(target, incoming);
        return;
    }

    existing.push(incoming);
}

fn layer_fields(target: &mut Record, incoming: Record) {
    target.entry_type = incoming.entry_type;
    for field in incoming.fields {
        target.set_field(&field.name, field.value);
    }
}
