//! Tests for the error taxonomy as surfaced by real operations

use covdb::core::{IntProperty, ObjRef, StrProperty, SCOPE_LEVEL};
use covdb::plugins::ncdb::{decode_counts, varint::decode_varint, StringTable};
use covdb::prelude::*;

fn one_scope() -> (Database, ScopeId) {
    let mut db = Database::new();
    let top = db
        .create_instance(None, "top", None, 1, SourceLanguage::Vhdl, None, ScopeFlags::empty())
        .unwrap();
    (db, top)
}

#[test]
fn test_unsupported_property() {
    let (db, top) = one_scope();
    let err = db
        .int_property(top, SCOPE_LEVEL, IntProperty::NumCrossedCvps)
        .unwrap_err();
    assert!(matches!(err, CovError::UnsupportedProperty { .. }));
    let msg = err.to_string();
    assert!(msg.contains("Unsupported property"));
    assert!(msg.contains("NumCrossedCvps"));
}

#[test]
fn test_property_fallback_after_unsupported() {
    let (mut db, top) = one_scope();
    assert!(db
        .string_property(top, SCOPE_LEVEL, StrProperty::DuSignature)
        .is_err());
    assert_eq!(
        db.string_property(top, SCOPE_LEVEL, StrProperty::ScopeName).unwrap(),
        "top"
    );

    db.set_int_property(top, SCOPE_LEVEL, IntProperty::ScopeWeight, 3)
        .unwrap();
    assert_eq!(db.int_property(top, SCOPE_LEVEL, IntProperty::ScopeWeight).unwrap(), 3);
}

#[test]
fn test_negative_weight_rejected() {
    let (mut db, top) = one_scope();
    let err = db
        .set_int_property(top, SCOPE_LEVEL, IntProperty::ScopeWeight, -1)
        .unwrap_err();
    assert!(matches!(err, CovError::InvalidArgument { .. }));
}

#[test]
fn test_use_after_close() {
    let (mut db, top) = one_scope();
    db.close().unwrap();
    assert!(!db.is_open());

    let err = db
        .create_covergroup(Some(top), "cg", None, 1, SourceLanguage::Vhdl)
        .unwrap_err();
    assert!(matches!(err, CovError::InvalidState { .. }));
    assert!(matches!(db.scope(top), Err(CovError::InvalidState { .. })));
    assert!(matches!(
        db.int_property(ObjRef::Root, SCOPE_LEVEL, IntProperty::NumTests),
        Err(CovError::InvalidState { .. })
    ));
}

#[test]
fn test_truncated_varint() {
    let err = decode_varint(&[0x80, 0x80], 0).unwrap_err();
    match err {
        CovError::TruncatedData { offset, .. } => assert_eq!(offset, 2),
        other => panic!("expected truncated data, got {other}"),
    }
}

#[test]
fn test_truncated_count_array() {
    let mut bytes = vec![0u8, 3];
    bytes.extend_from_slice(&7u32.to_le_bytes());
    let err = decode_counts(&bytes).unwrap_err();
    assert!(matches!(err, CovError::TruncatedData { .. }));
}

#[test]
fn test_truncated_string_table() {
    let mut table = StringTable::new();
    table.add("clock");
    let bytes = table.to_bytes();
    let err = StringTable::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
    assert!(matches!(err, CovError::TruncatedData { .. }));
}

#[test]
fn test_error_messages_name_their_subject() {
    let err = CovError::corrupt("counts.bin", "length mismatch");
    assert_eq!(err.to_string(), "Corrupt container member 'counts.bin': length mismatch");

    let err = CovError::source_read("run7.cdb", "permission denied");
    assert!(err.to_string().contains("run7.cdb"));

    let err = CovError::structural_conflict("top/dut", "INSTANCE", "COVERGROUP");
    assert!(err.to_string().contains("top/dut"));
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: CovError = io.into();
    assert!(matches!(err, CovError::IoError { .. }));
}
