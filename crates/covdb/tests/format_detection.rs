//! Tests for content-based format detection through the registry

use std::fs::File;
use std::io::Write;
use std::path::Path;

use covdb::plugins::ncdb::{MEMBER_MANIFEST, SQLITE_MAGIC};
use covdb::prelude::*;
use tempfile::TempDir;
use zip::write::FileOptions;

fn write_zip(path: &Path, members: &[(&str, &str)]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, body) in members {
        zip.start_file(*name, FileOptions::<()>::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn test_sqlite_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coverage.cdb");
    let mut bytes = SQLITE_MAGIC.to_vec();
    bytes.resize(4096, 0);
    std::fs::write(&path, bytes).unwrap();

    assert_eq!(default_registry().detect(&path), FormatKind::Sqlite);
}

#[test]
fn test_ncdb_container() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coverage.sqlite");
    NcdbFormat::new()
        .write(&Database::new(), &path, &mut ConversionContext::lenient())
        .unwrap();

    assert_eq!(default_registry().detect(&path), FormatKind::Ncdb);
}

#[test]
fn test_zip_with_foreign_manifest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bundle.zip");
    write_zip(&path, &[(MEMBER_MANIFEST, r#"{"format": "OTHER", "version": "3"}"#)]);

    assert_eq!(default_registry().detect(&path), FormatKind::Unknown);
}

#[test]
fn test_newer_container_is_still_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("future.cdb");
    write_zip(&path, &[(MEMBER_MANIFEST, r#"{"format": "NCDB", "version": "2.0"}"#)]);
    assert_eq!(default_registry().detect(&path), FormatKind::Ncdb);

    // The version is rejected when the container is actually read
    let err = NcdbFormat::new()
        .read(&path, &mut ConversionContext::lenient())
        .unwrap_err();
    assert!(matches!(err, CovError::CorruptContainer { ref member, .. } if member == MEMBER_MANIFEST));
}

#[test]
fn test_manifest_with_mistyped_fields_is_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("odd.cdb");
    write_zip(
        &path,
        &[(MEMBER_MANIFEST, r#"{"format": "NCDB", "version": "1.0", "scope_count": "x"}"#)],
    );
    assert_eq!(default_registry().detect(&path), FormatKind::Ncdb);
}

#[test]
fn test_zip_without_manifest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docs.zip");
    write_zip(&path, &[("readme.txt", "hello"), ("data.csv", "a,b\n1,2\n")]);

    assert_eq!(default_registry().detect(&path), FormatKind::Unknown);
}

#[test]
fn test_json_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coverage.dat");
    JsonFormat::new()
        .write(&Database::new(), &path, &mut ConversionContext::lenient())
        .unwrap();

    assert_eq!(default_registry().detect(&path), FormatKind::Json);
}

#[test]
fn test_unrelated_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("package.json");
    std::fs::write(&path, r#"{"name": "widget", "version": "1.0.0"}"#).unwrap();

    assert_eq!(default_registry().detect(&path), FormatKind::Unknown);
}

#[test]
fn test_nonexistent_path() {
    let dir = TempDir::new().unwrap();
    assert_eq!(
        default_registry().detect(&dir.path().join("missing.cdb")),
        FormatKind::Unknown
    );
}

#[test]
fn test_empty_registry_detects_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coverage.cdb");
    NcdbFormat::new()
        .write(&Database::new(), &path, &mut ConversionContext::lenient())
        .unwrap();

    assert_eq!(FormatRegistry::new().detect(&path), FormatKind::Unknown);
}
