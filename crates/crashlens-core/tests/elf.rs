//! Tests for ELF usability checks on cached files

use std::path::Path;

use crashlens_core::symbols::is_usable_elf;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf
{
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn elf64(e_type: u8, phnum: u8) -> Vec<u8>
{
    let mut bytes = vec![0u8; 64];
    bytes[..4].copy_from_slice(b"\x7fELF");
    bytes[4] = 2;
    bytes[5] = 1;
    bytes[16] = e_type;
    bytes[56] = phnum;
    bytes
}

#[test]
fn test_synthetic_header_is_usable()
{
    let dir = TempDir::new().unwrap();
    let exec = write(dir.path(), "app", &elf64(2, 1));
    let shared = write(dir.path(), "libcoreclr.so", &elf64(3, 11));

    assert!(is_usable_elf(&exec));
    assert!(is_usable_elf(&shared));
}

#[test]
fn test_trailing_bytes_do_not_matter()
{
    let dir = TempDir::new().unwrap();
    let mut bytes = elf64(3, 4);
    bytes.extend_from_slice(&[0xAB; 4096]);
    assert!(is_usable_elf(&write(dir.path(), "libbig.so", &bytes)));
}

#[test]
fn test_short_files_are_rejected()
{
    let dir = TempDir::new().unwrap();
    let header = elf64(3, 1);

    assert!(!is_usable_elf(&write(dir.path(), "empty.so", b"")));
    assert!(!is_usable_elf(&write(dir.path(), "short.so", &header[..63])));
}

#[test]
fn test_non_elf_content_is_rejected()
{
    let dir = TempDir::new().unwrap();
    let mut html = b"<html><body>404 Not Found</body></html>".to_vec();
    html.resize(128, b' ');

    assert!(!is_usable_elf(&write(dir.path(), "libcoreclr.so", &html)));
}

#[test]
fn test_relocatable_and_headerless_objects_are_rejected()
{
    let dir = TempDir::new().unwrap();

    assert!(!is_usable_elf(&write(dir.path(), "obj.o", &elf64(1, 1))));
    assert!(!is_usable_elf(&write(dir.path(), "libdebug.so.dbg", &elf64(3, 0))));
}

#[test]
fn test_missing_file_is_rejected()
{
    let dir = TempDir::new().unwrap();
    assert!(!is_usable_elf(&dir.path().join("absent.so")));
    assert!(!is_usable_elf(dir.path()));
}
