//! ELF header checks for cached debug companions.
//!
//! A symbol downloader sometimes leaves stub files behind (error pages,
//! truncated transfers, debug-only companions). Only the fixed-size ELF
//! identification header is read, so this is cheap enough to run on every
//! cached module at open time.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use object::elf::{ELFCLASS32, ELFCLASS64, ELFDATA2MSB, ELFMAG, ET_DYN, ET_EXEC};
use tracing::trace;

/// Bytes read from the start of the file; the 64-bit header size.
pub const ELF_HEADER_LEN: usize = 64;

/// `e_ident` indices of the file class and data encoding bytes.
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const E_TYPE_OFFSET: usize = 16;
const E_PHNUM_OFFSET_32: usize = 44;
const E_PHNUM_OFFSET_64: usize = 56;

/// Whether `path` is an ELF executable or shared object with program headers.
///
/// Requirements, all on the first 64 bytes:
/// - the `\x7fELF` magic
/// - class 1 (32-bit) or 2 (64-bit)
/// - type `ET_EXEC` (2) or `ET_DYN` (3)
/// - a nonzero program-header count
///
/// Files shorter than 64 bytes and unreadable files are never usable.
///
/// ## Example
///
/// ```rust
/// use crashlens_core::symbols::elf::is_usable_elf;
///
/// let mut header = [0u8; 64];
/// header[..4].copy_from_slice(b"\x7fELF");
/// header[4] = 2; // 64-bit
/// header[5] = 1; // little endian
/// header[16] = 2; // ET_EXEC
/// header[56] = 1; // one program header
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("libfoo.so");
/// std::fs::write(&path, header)?;
/// assert!(is_usable_elf(&path));
/// # Ok::<(), std::io::Error>(())
/// ```
#[must_use]
pub fn is_usable_elf(path: &Path) -> bool
{
    let mut header = [0u8; ELF_HEADER_LEN];
    let read = File::open(path).and_then(|mut file| file.read_exact(&mut header));
    if let Err(err) = read {
        trace!(path = %path.display(), %err, "not a usable ELF file");
        return false;
    }
    is_usable_elf_header(&header)
}

/// Header-only variant of [`is_usable_elf`].
#[must_use]
pub fn is_usable_elf_header(header: &[u8]) -> bool
{
    if header.len() < ELF_HEADER_LEN || header[..ELFMAG.len()] != ELFMAG {
        return false;
    }

    let phnum_offset = match header[EI_CLASS] {
        ELFCLASS32 => E_PHNUM_OFFSET_32,
        ELFCLASS64 => E_PHNUM_OFFSET_64,
        _ => return false,
    };
    let big_endian = header[EI_DATA] == ELFDATA2MSB;

    let e_type = read_u16(header, E_TYPE_OFFSET, big_endian);
    let e_phnum = read_u16(header, phnum_offset, big_endian);

    matches!(e_type, ET_EXEC | ET_DYN) && e_phnum != 0
}

fn read_u16(bytes: &[u8], offset: usize, big_endian: bool) -> u16
{
    let pair = [bytes[offset], bytes[offset + 1]];
    if big_endian {
        u16::from_be_bytes(pair)
    } else {
        u16::from_le_bytes(pair)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn header(class: u8, e_type: u16, phnum: u16) -> [u8; ELF_HEADER_LEN]
    {
        let mut bytes = [0u8; ELF_HEADER_LEN];
        bytes[..4].copy_from_slice(&ELFMAG);
        bytes[EI_CLASS] = class;
        bytes[EI_DATA] = 1;
        bytes[E_TYPE_OFFSET..E_TYPE_OFFSET + 2].copy_from_slice(&e_type.to_le_bytes());
        let offset = if class == ELFCLASS32 { E_PHNUM_OFFSET_32 } else { E_PHNUM_OFFSET_64 };
        bytes[offset..offset + 2].copy_from_slice(&phnum.to_le_bytes());
        bytes
    }

    #[test]
    fn test_header_checks()
    {
        assert!(is_usable_elf_header(&header(ELFCLASS64, ET_DYN, 9)));
        assert!(is_usable_elf_header(&header(ELFCLASS32, ET_EXEC, 1)));
        assert!(!is_usable_elf_header(&header(ELFCLASS64, ET_DYN, 0)));
        // ET_REL: object files are not loadable
        assert!(!is_usable_elf_header(&header(ELFCLASS64, 1, 3)));
        assert!(!is_usable_elf_header(&header(3, ET_DYN, 3)));
        assert!(!is_usable_elf_header(&header(ELFCLASS64, ET_DYN, 3)[..63]));
    }

    #[test]
    fn test_big_endian_header()
    {
        let mut bytes = [0u8; ELF_HEADER_LEN];
        bytes[..4].copy_from_slice(&ELFMAG);
        bytes[EI_CLASS] = ELFCLASS64;
        bytes[EI_DATA] = ELFDATA2MSB;
        bytes[E_TYPE_OFFSET + 1] = 3;
        bytes[E_PHNUM_OFFSET_64 + 1] = 2;
        assert!(is_usable_elf_header(&bytes));
    }
}
