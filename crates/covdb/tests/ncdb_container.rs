//! Tests for the NCDB container: schema hashing, members and integrity checks

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use covdb::plugins::ncdb::{
    compute_schema_hash, encode_tree, read_container, read_manifest, write_container, Compression,
    Manifest, NcdbWriteOptions, MAX_SCOPE_DEPTH, MEMBER_ATTRS, MEMBER_COUNTS, MEMBER_MANIFEST,
    MEMBER_SCOPE_TREE, NCDB_FORMAT,
};
use covdb::prelude::*;
use tempfile::TempDir;
use zip::write::FileOptions;

fn single_block(name: &str) -> Database {
    let mut db = Database::new();
    db.create_scope(None, name, None, 1, SourceLanguage::Verilog, ScopeType::Block, ScopeFlags::empty())
        .unwrap();
    db
}

/// A single chain of instances `levels` deep, one hit per level
fn instance_chain(levels: usize) -> Database {
    let mut db = Database::new();
    let mut parent = None;
    for _ in 0..levels {
        let id = db
            .create_instance(parent, "u", None, 1, SourceLanguage::Verilog, None, ScopeFlags::empty())
            .unwrap();
        db.create_next_cover(id, "stmt", CoverData::new(CoverType::StmtBin, 1), None)
            .unwrap();
        parent = Some(id);
    }
    db
}

fn tree_hash(db: &Database) -> String {
    compute_schema_hash(&encode_tree(db).unwrap().bytes)
}

/// Copy every member of `from` into `to`, passing each through `edit`
fn rewrite(from: &Path, to: &Path, edit: impl Fn(&str, Vec<u8>) -> Option<Vec<u8>>) {
    let mut archive = zip::ZipArchive::new(File::open(from).unwrap()).unwrap();
    let mut out = zip::ZipWriter::new(File::create(to).unwrap());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let name = entry.name().to_string();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        if let Some(bytes) = edit(&name, bytes) {
            out.start_file(name, FileOptions::<()>::default()).unwrap();
            out.write_all(&bytes).unwrap();
        }
    }
    out.finish().unwrap();
}

#[test]
fn test_hash_equal_for_identical_structure() {
    assert_eq!(tree_hash(&single_block("top")), tree_hash(&single_block("top")));
}

#[test]
fn test_hash_changes_with_extra_scope() {
    let base = single_block("top");
    let mut extended = single_block("top");
    extended
        .create_scope(None, "other", None, 1, SourceLanguage::Verilog, ScopeType::Block, ScopeFlags::empty())
        .unwrap();
    assert_ne!(tree_hash(&base), tree_hash(&extended));
}

#[test]
fn test_hash_changes_with_name_and_type() {
    let base = tree_hash(&single_block("top"));
    assert_ne!(base, tree_hash(&single_block("tb")));

    let mut retyped = Database::new();
    retyped
        .create_scope(None, "top", None, 1, SourceLanguage::Verilog, ScopeType::Process, ScopeFlags::empty())
        .unwrap();
    assert_ne!(base, tree_hash(&retyped));
}

#[test]
fn test_hash_ignores_counts() {
    let build = |count| {
        let mut db = single_block("top");
        let top = db.find_scope("top").unwrap().unwrap();
        db.create_next_cover(top, "stmt", CoverData::new(CoverType::StmtBin, count), None)
            .unwrap();
        db
    };
    assert_eq!(tree_hash(&build(0)), tree_hash(&build(123_456)));
}

#[test]
fn test_hash_format() {
    let hash = tree_hash(&single_block("top"));
    let hex = hash.strip_prefix("sha256:").unwrap();
    assert_eq!(hex.len(), 64);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_manifest_statistics() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cov.cdb");
    let mut db = single_block("top");
    let top = db.find_scope("top").unwrap().unwrap();
    db.create_next_cover(top, "s1", CoverData::new(CoverType::StmtBin, 4), None)
        .unwrap();
    db.create_next_cover(top, "s2", CoverData::new(CoverType::StmtBin, 0), None)
        .unwrap();
    db.create_history_node(None, "t1", "t1.cdb", HistoryKind::Test)
        .unwrap();

    let written = write_container(&db, &path, &NcdbWriteOptions::default(), &mut ConversionContext::lenient())
        .unwrap();
    let manifest = read_manifest(&path).unwrap();
    assert_eq!(manifest, written);
    assert_eq!(manifest.format, NCDB_FORMAT);
    assert_eq!(manifest.scope_count, 1);
    assert_eq!(manifest.coveritem_count, 2);
    assert_eq!(manifest.test_count, 1);
    assert_eq!(manifest.total_hits, 4);
    assert_eq!(manifest.covered_bins, 1);
    assert_eq!(manifest.path_separator, "/");
    assert_eq!(manifest.schema_hash, tree_hash(&db));
}

#[test]
fn test_manifest_json_keeps_defaults() {
    let manifest = Manifest::default();
    let parsed = Manifest::from_json(&manifest.to_json().unwrap()).unwrap();
    assert_eq!(parsed, manifest);
    assert!(parsed.schema_hash.is_empty());
}

#[test]
fn test_stored_compression_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cov.cdb");
    let options = NcdbWriteOptions {
        compression: Compression::Stored,
        generator: "unit-test".to_string(),
    };
    write_container(&single_block("top"), &path, &options, &mut ConversionContext::lenient()).unwrap();

    assert_eq!(read_manifest(&path).unwrap().generator, "unit-test");
    let db = read_container(&path, &mut ConversionContext::lenient()).unwrap();
    assert_eq!(db.written_by(), "unit-test");
    assert!(db.find_scope("top").unwrap().is_some());
}

#[test]
fn test_attributes_member_only_when_needed() {
    let dir = TempDir::new().unwrap();
    let plain = dir.path().join("plain.cdb");
    let tagged = dir.path().join("tagged.cdb");
    let mut ctx = ConversionContext::lenient();

    let mut db = single_block("top");
    NcdbFormat::new().write(&db, &plain, &mut ctx).unwrap();
    let top = db.find_scope("top").unwrap().unwrap();
    db.scope_mut(top).unwrap().set_attribute("owner", "verif");
    NcdbFormat::new().write(&db, &tagged, &mut ctx).unwrap();

    let has_member = |path: &Path, name: &str| {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let found = archive.file_names().any(|n| n == name);
        found
    };
    assert!(!has_member(&plain, MEMBER_ATTRS));
    assert!(has_member(&tagged, MEMBER_ATTRS));

    let loaded = read_container(&tagged, &mut ctx).unwrap();
    let top = loaded.find_scope("top").unwrap().unwrap();
    assert_eq!(loaded.scope(top).unwrap().attribute("owner"), Some("verif"));
}

#[test]
fn test_tampered_tree_is_rejected() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.cdb");
    let bad = dir.path().join("bad.cdb");
    NcdbFormat::new()
        .write(&single_block("top"), &good, &mut ConversionContext::lenient())
        .unwrap();

    // Same length, different name: decodes fine but no longer matches the hash
    rewrite(&good, &bad, |name, bytes| {
        if name != MEMBER_SCOPE_TREE {
            return Some(bytes);
        }
        let text = bytes.windows(3).position(|w| w == b"top").unwrap();
        let mut bytes = bytes;
        bytes[text..text + 3].copy_from_slice(b"tip");
        Some(bytes)
    });

    let err = read_container(&bad, &mut ConversionContext::lenient()).unwrap_err();
    match err {
        CovError::CorruptContainer { member, message } => {
            assert_eq!(member, MEMBER_MANIFEST);
            assert!(message.contains("schema hash"));
        }
        other => panic!("expected a corrupt container, got {other}"),
    }
}

#[test]
fn test_missing_counts_member() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.cdb");
    let bad = dir.path().join("bad.cdb");
    NcdbFormat::new()
        .write(&single_block("top"), &good, &mut ConversionContext::lenient())
        .unwrap();
    rewrite(&good, &bad, |name, bytes| (name != MEMBER_COUNTS).then_some(bytes));

    let err = read_container(&bad, &mut ConversionContext::lenient()).unwrap_err();
    assert!(matches!(err, CovError::CorruptContainer { ref member, .. } if member == MEMBER_COUNTS));
}

#[test]
fn test_not_a_zip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("junk.cdb");
    std::fs::write(&path, b"definitely not an archive").unwrap();

    let err = read_container(&path, &mut ConversionContext::lenient()).unwrap_err();
    assert!(matches!(err, CovError::ZipError { .. }));
}

#[test]
fn test_deep_hierarchy_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deep.cdb");
    let db = instance_chain(1000);
    let mut ctx = ConversionContext::lenient();
    write_container(&db, &path, &NcdbWriteOptions::default(), &mut ctx).unwrap();

    let restored = read_container(&path, &mut ctx).unwrap();
    assert_eq!(restored.scope_count(), 1000);
    assert_eq!(restored.total_hits(), 1000);
    let leaf = restored.walk().unwrap().pop().unwrap();
    assert_eq!(restored.hier_name(leaf).unwrap().matches('/').count(), 999);
}

#[test]
fn test_hierarchy_beyond_depth_limit_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("too_deep.cdb");
    let db = instance_chain(MAX_SCOPE_DEPTH + 1);

    let err = write_container(&db, &path, &NcdbWriteOptions::default(), &mut ConversionContext::lenient())
        .unwrap_err();
    assert!(matches!(err, CovError::InvalidArgument { .. }));
    assert!(!path.exists());
}
