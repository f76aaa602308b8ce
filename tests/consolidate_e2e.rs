//! Folder consolidation tests.
//!
//! These tests verify that:
//! - Files unique to the source move and identical ones are discarded
//! - Conflicting files are reported and both trees survive
//! - A folder-merge hint from a resolved batch drives a real consolidation

use std::fs;
use std::path::Path;
use std::sync::Arc;

use canonry::{
    CandidateRecord, CanonicalDirectory, CanonicalEntity, Consolidator, EntityType, FileClass,
    InMemoryGraph, Provenance, Resolver, ResolverConfig, ReviewLedger,
};
use tempfile::tempdir;

fn write(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![b'x'; len]).unwrap();
}

/// Test the basic two-file scenario: one shared file, one unique file.
#[test]
fn test_unique_file_moves_and_source_is_removed() {
    let root = tempdir().unwrap();
    let source = root.path().join("norton-hosp");
    let destination = root.path().join("norton");
    write(&source.join("x.pdf"), 10);
    write(&source.join("y.pdf"), 20);
    write(&destination.join("x.pdf"), 10);

    let report = Consolidator::new().consolidate(&source, &destination).unwrap();

    assert_eq!(report.moved(), 1);
    assert_eq!(report.identical(), 1);
    assert!(report.conflicts.is_empty());
    assert!(report.source_removed);
    assert!(!source.exists());
    assert_eq!(fs::metadata(destination.join("x.pdf")).unwrap().len(), 10);
    assert_eq!(fs::metadata(destination.join("y.pdf")).unwrap().len(), 20);
}

/// Test that a same-named file of a different size is never overwritten.
#[test]
fn test_conflict_keeps_both_trees() {
    let root = tempdir().unwrap();
    let source = root.path().join("src");
    let destination = root.path().join("dst");
    write(&source.join("records/x.pdf"), 11);
    write(&source.join("records/z.pdf"), 5);
    write(&destination.join("records/x.pdf"), 10);

    let report = Consolidator::new().consolidate(&source, &destination).unwrap();

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].relative_path, Path::new("records").join("x.pdf"));
    assert_eq!(report.conflicts[0].source_size, 11);
    assert_eq!(report.conflicts[0].destination_size, Some(10));
    assert!(!report.source_removed);
    assert_eq!(fs::metadata(source.join("records/x.pdf")).unwrap().len(), 11);
    assert_eq!(fs::metadata(destination.join("records/x.pdf")).unwrap().len(), 10);
    assert!(destination.join("records/z.pdf").exists());

    let classes: Vec<FileClass> = report.entries.iter().map(|e| e.class).collect();
    assert!(classes.contains(&FileClass::Conflict));
    assert!(classes.contains(&FileClass::UniqueToSource));

    let report_path = root.path().join("report.json");
    report.write_json(&report_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["conflicts"][0]["resolution"], "unresolved");
}

/// Test that a resolved batch suggests a folder merge that consolidates cleanly.
#[test]
fn test_folder_hint_from_batch() {
    let root = tempdir().unwrap();
    let canonical_folder = root.path().join("providers/norton");
    let stray_folder = root.path().join("providers/norton-hosp");
    write(&canonical_folder.join("x.pdf"), 10);
    write(&stray_folder.join("x.pdf"), 10);
    write(&stray_folder.join("y.pdf"), 20);

    let mut directory = CanonicalDirectory::new();
    let mut norton = CanonicalEntity::new("Norton Hospital", EntityType::Provider);
    norton
        .attributes
        .insert("folder".to_string(), canonical_folder.display().to_string());
    directory.insert(norton).unwrap();

    let resolver = Resolver::new(ResolverConfig::default(), Arc::new(InMemoryGraph::new()));
    let mut ledger = ReviewLedger::in_memory();
    let outcome = resolver
        .run_batch(
            vec![CandidateRecord::new(
                "Norton Hospital",
                EntityType::Provider,
                Provenance::new("records_pdf", "7"),
            )
            .with_attribute("folder", stray_folder.display().to_string())],
            &mut directory,
            &mut ledger,
        )
        .unwrap();

    assert_eq!(outcome.folder_merges.len(), 1);
    let hint = &outcome.folder_merges[0];
    assert_eq!(hint.canonical_name, "Norton Hospital");
    assert_eq!(hint.source, stray_folder);
    assert_eq!(hint.destination, canonical_folder);

    let dry = Consolidator::new()
        .dry_run(true)
        .consolidate(&hint.source, &hint.destination)
        .unwrap();
    assert!(dry.dry_run);
    assert_eq!(dry.moved(), 1);
    assert!(stray_folder.join("y.pdf").exists());

    let report = Consolidator::new()
        .verify_content(true)
        .consolidate(&hint.source, &hint.destination)
        .unwrap();
    assert!(report.is_clean());
    assert!(report.source_removed);
    assert!(canonical_folder.join("y.pdf").exists());
    assert!(!stray_folder.exists());
}
