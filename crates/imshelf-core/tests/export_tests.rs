//! Export engine integration tests

mod common;

use std::collections::BTreeMap;
use std::fs;

use common::{temp_store, write_file};
use imshelf_core::{import_file, run_export, run_exports, ExportSpec, RefPath, TransferMode};
use tempfile::TempDir;

fn spec(patterns: &[&str], destination: std::path::PathBuf) -> ExportSpec {
    ExportSpec {
        source: patterns.iter().map(|s| s.to_string()).collect(),
        destination,
    }
}

#[test]
fn test_import_then_export_round_trip() {
    let (_dir, store) = temp_store();
    let src = TempDir::new().unwrap();
    let bulk = write_file(
        src.path(),
        "bulk.bib",
        "@article{CsX2024,\n    title = {CS Paper},\n    collection = {cs/x},\n}\n\n\
         @article{MathY2024,\n    title = {Math Paper},\n    collection = {math/y},\n}\n",
    );
    import_file(&store, &bulk, TransferMode::Copy).unwrap();

    let dest = src.path().join("out/cs.bib");
    let report = run_export(&store, &spec(&["/cs/*"], dest.clone())).unwrap();
    assert_eq!(report.exported, vec![RefPath::new("cs/x").unwrap()]);

    let content = fs::read_to_string(&dest).unwrap();
    assert!(content.contains("CsX2024"));
    assert!(!content.contains("MathY2024"));
}

#[test]
fn test_negated_pattern_excludes_reference() {
    let (_dir, store) = temp_store();
    let src = TempDir::new().unwrap();
    let bulk = write_file(
        src.path(),
        "bulk.bib",
        "@article{Pub2024,\n    title = {Public},\n    collection = {cs/x},\n}\n\n\
         @article{Sec2024,\n    title = {Private},\n    collection = {cs/secret},\n}\n",
    );
    import_file(&store, &bulk, TransferMode::Copy).unwrap();

    let dest = src.path().join("cs.bib");
    let report =
        run_export(&store, &spec(&["/cs/*", "!/cs/secret"], dest.clone())).unwrap();
    assert_eq!(report.exported, vec![RefPath::new("cs/x").unwrap()]);
    assert!(!fs::read_to_string(&dest).unwrap().contains("Sec2024"));
}

#[test]
fn test_run_exports_in_name_order_and_isolated() {
    let (_dir, store) = temp_store();
    let src = TempDir::new().unwrap();
    let bulk = write_file(
        src.path(),
        "bulk.bib",
        "@article{A2024,\n    title = {A},\n    collection = {cs/x},\n}\n",
    );
    import_file(&store, &bulk, TransferMode::Copy).unwrap();

    let mut exports = BTreeMap::new();
    exports.insert(
        "broken".to_string(),
        spec(&["/cs/["], src.path().join("broken.bib")),
    );
    exports.insert("all".to_string(), spec(&["**"], src.path().join("all.bib")));

    let results = run_exports(&store, &exports);
    let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["all", "broken"]);
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
    assert!(src.path().join("all.bib").exists());
}

#[test]
fn test_export_into_store_dotdir_is_reexportable() {
    // Exports written inside the store under .exports are organizational
    // files, not references, and can be matched by later specs
    let (dir, store) = temp_store();
    let src = TempDir::new().unwrap();
    let bulk = write_file(
        src.path(),
        "bulk.bib",
        "@article{A2024,\n    title = {A},\n    collection = {cs/x},\n}\n",
    );
    import_file(&store, &bulk, TransferMode::Copy).unwrap();

    let dest = dir.path().join(".exports/all_refs.bib");
    run_export(&store, &spec(&["**"], dest.clone())).unwrap();
    assert!(dest.exists());

    // The .exports directory holds no record file, so the store still
    // enumerates only the real reference
    let listed = store.list(None).unwrap();
    assert_eq!(listed, vec![RefPath::new("cs/x").unwrap()]);
}
