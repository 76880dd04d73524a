//! Tests for the per-dump JSON metadata sidecar

use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use crashlens_core::error::DriverError;
use crashlens_core::symbols::{
    load_metadata,
    metadata_path_for,
    save_metadata,
    try_save_runtime_version,
    try_save_symbol_files,
};
use crashlens_core::types::DumpMetadata;
use tempfile::TempDir;

fn dump_in(dir: &TempDir) -> PathBuf
{
    let dump = dir.path().join("core.1234.dmp");
    std::fs::write(&dump, vec![0u8; 2048]).unwrap();
    dump
}

fn record() -> DumpMetadata
{
    DumpMetadata {
        dump_id: "core.1234".to_string(),
        user_id: "analyst".to_string(),
        file_name: "core.1234.dmp".to_string(),
        size: 2048,
        uploaded_at: Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap(),
        runtime_version: Some("9.0.10".to_string()),
        symbol_files: vec!["libcoreclr.so.dbg".to_string(), "sos/libsosplugin.so".to_string()],
    }
}

#[test]
fn test_round_trip()
{
    let dir = TempDir::new().unwrap();
    let dump = dump_in(&dir);

    save_metadata(&dump, &record()).unwrap();

    assert_eq!(load_metadata(&dump), Some(record()));
    assert!(dir.path().join("core.1234.json").is_file());
    assert!(!dir.path().join("core.1234.json.tmp").exists());
}

#[test]
fn test_json_uses_camel_case_keys()
{
    let dir = TempDir::new().unwrap();
    let dump = dump_in(&dir);
    save_metadata(&dump, &record()).unwrap();

    let text = std::fs::read_to_string(metadata_path_for(&dump)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["dumpId"], "core.1234");
    assert_eq!(value["userId"], "analyst");
    assert_eq!(value["fileName"], "core.1234.dmp");
    assert_eq!(value["runtimeVersion"], "9.0.10");
    assert_eq!(value["symbolFiles"][1], "sos/libsosplugin.so");
    assert!(value.get("dump_id").is_none());
}

#[test]
fn test_optional_fields_may_be_absent()
{
    let dir = TempDir::new().unwrap();
    let dump = dump_in(&dir);
    std::fs::write(
        metadata_path_for(&dump),
        r#"{"dumpId":"core.1234","userId":"u","fileName":"core.1234.dmp","size":1,"uploadedAt":"2026-01-02T03:04:05Z"}"#,
    )
    .unwrap();

    let loaded = load_metadata(&dump).unwrap();
    assert_eq!(loaded.runtime_version, None);
    assert!(loaded.symbol_files.is_empty());
}

#[test]
fn test_missing_or_malformed_sidecar_reads_as_none()
{
    let dir = TempDir::new().unwrap();
    let dump = dump_in(&dir);
    assert_eq!(load_metadata(&dump), None);

    std::fs::write(metadata_path_for(&dump), "{ not json").unwrap();
    assert_eq!(load_metadata(&dump), None);

    std::fs::write(metadata_path_for(&dump), r#"{"dumpId": 7}"#).unwrap();
    assert_eq!(load_metadata(&dump), None);
}

#[test]
fn test_partial_updates_never_create_a_record()
{
    let dir = TempDir::new().unwrap();
    let dump = dump_in(&dir);

    assert!(!try_save_runtime_version(&dump, "8.0.11"));
    assert!(!try_save_symbol_files(&dump, &["libcoreclr.so".to_string()]));
    assert!(!metadata_path_for(&dump).exists());
}

#[test]
fn test_partial_updates_touch_only_their_field()
{
    let dir = TempDir::new().unwrap();
    let dump = dump_in(&dir);
    save_metadata(&dump, &record()).unwrap();

    assert!(try_save_runtime_version(&dump, "10.0.1"));
    let loaded = load_metadata(&dump).unwrap();
    assert_eq!(loaded.runtime_version.as_deref(), Some("10.0.1"));
    assert_eq!(loaded.symbol_files, record().symbol_files);

    assert!(try_save_symbol_files(&dump, &["libclrjit.so".to_string()]));
    let loaded = load_metadata(&dump).unwrap();
    assert_eq!(loaded.symbol_files, vec!["libclrjit.so".to_string()]);
    assert_eq!(loaded.runtime_version.as_deref(), Some("10.0.1"));
    assert_eq!(loaded.uploaded_at, record().uploaded_at);
}

#[test]
fn test_json_dump_cannot_be_overwritten_by_its_sidecar()
{
    let dir = TempDir::new().unwrap();
    let dump = dir.path().join("weird.json");
    std::fs::write(&dump, b"{}").unwrap();

    let err = save_metadata(&dump, &record()).unwrap_err();
    assert!(matches!(err, DriverError::InvalidArgument(_)));
    assert_eq!(std::fs::read(&dump).unwrap(), b"{}");
    assert_eq!(load_metadata(&dump), None);
}

#[test]
fn test_for_dump_sizes_from_filesystem()
{
    let dir = TempDir::new().unwrap();
    let dump = dump_in(&dir);

    let fresh = DumpMetadata::for_dump(&dump, "analyst").unwrap();
    assert_eq!(fresh.dump_id, "core.1234");
    assert_eq!(fresh.file_name, "core.1234.dmp");
    assert_eq!(fresh.size, 2048);
    assert_eq!(fresh.runtime_version, None);
    assert!(DumpMetadata::for_dump(&dir.path().join("absent"), "analyst").is_err());
}
