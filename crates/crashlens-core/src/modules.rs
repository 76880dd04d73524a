//! # Module Catalog
//!
//! Normalizes the two module-listing formats the backend produces into
//! basename → base address maps, and indexes native modules found in a
//! symbol cache directory.
//!
//! - Loaded-module listing (interactive): `[  3] <uuid> 0x<base> <path>`
//! - Verify invocation (one-shot): `<hexAddress> <modulePath>`, parsed by
//!   [`crate::runtime::parse_verify_core_output`]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Address;

/// `.so` or `.so.<digits>[.<digits>…]` at the end of a file name.
static NATIVE_MODULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.so(?:\.\d+)*$").expect("module regex is valid"));

static LISTING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\[\s*\d+\]\s+(?:\S+\s+)?0[xX]([0-9a-fA-F]+)\s+(\S.*?)\s*$").expect("listing regex is valid")
});

/// Extensions of debug companions and managed assemblies, never native modules.
const NON_NATIVE_SUFFIXES: &[&str] = &[".dbg", ".debug", ".dll", ".exe", ".pdb", ".ni.dll", ".winmd"];

/// Basename of a module path (`/usr/lib/libc.so.6` → `libc.so.6`).
#[must_use]
pub fn module_basename(path: &str) -> &str
{
    let trimmed = path.trim().trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Whether a module name looks like a real native shared object.
///
/// ```rust
/// use crashlens_core::modules::is_native_module_name;
///
/// assert!(is_native_module_name("libcoreclr.so"));
/// assert!(is_native_module_name("libstdc++.so.6.0.30"));
/// assert!(is_native_module_name("LIBFOO.SO.1"));
/// assert!(!is_native_module_name("libcoreclr.so.dbg"));
/// assert!(!is_native_module_name("System.Private.CoreLib.dll"));
/// assert!(!is_native_module_name("libfoo.so.1a"));
/// ```
#[must_use]
pub fn is_native_module_name(name: &str) -> bool
{
    let lower = name.to_ascii_lowercase();
    if NON_NATIVE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return false;
    }
    NATIVE_MODULE.is_match(name)
}

/// Keep only native shared objects, dropping debug companions and managed
/// libraries.
#[must_use]
pub fn filter_native_modules(modules: &BTreeMap<String, Address>) -> BTreeMap<String, Address>
{
    modules
        .iter()
        .filter(|(name, _)| is_native_module_name(name))
        .map(|(name, base)| (name.clone(), *base))
        .collect()
}

/// Parse the interactive loaded-module listing into basename → base address.
///
/// Entries with a zero base address are declared but not loaded and are
/// left out. When two entries share a basename the first one wins.
///
/// ```rust
/// use crashlens_core::modules::parse_loaded_module_listing;
///
/// let listing = "[  0] 1C2D3E4F-0000-0000 0x0000555555554000 /usr/bin/app\n\
///                [  1] 9A8B7C6D 0x0000000000000000 /usr/lib/libmissing.so\n\
///                [  2] 5E6F7A8B 0x00007ffff7dd3000 /lib/x86_64-linux-gnu/libc.so.6";
/// let modules = parse_loaded_module_listing(listing);
/// assert_eq!(modules.len(), 2);
/// assert_eq!(modules["libc.so.6"].value(), 0x7fff_f7dd_3000);
/// assert!(!modules.contains_key("libmissing.so"));
/// ```
#[must_use]
pub fn parse_loaded_module_listing(text: &str) -> BTreeMap<String, Address>
{
    let mut modules = BTreeMap::new();
    for line in text.lines() {
        let Some(captures) = LISTING_LINE.captures(line) else {
            continue;
        };
        let Some(base) = Address::parse_hex(&captures[1]) else {
            continue;
        };
        if base.is_zero() {
            continue;
        }
        let name = module_basename(&captures[2]);
        if name.is_empty() {
            continue;
        }
        modules.entry(name.to_string()).or_insert(base);
    }
    modules
}

/// Index native modules stored under a symbol cache directory by basename.
///
/// `.dbg`/`.debug` siblings are skipped; when the same basename appears in
/// several sub-directories the first path in sorted order wins.
#[must_use]
pub fn build_cache_module_index(directory: &Path) -> BTreeMap<String, PathBuf>
{
    let mut index = BTreeMap::new();
    for path in crashlens_utils::fs::walk_files(directory) {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if is_native_module_name(name) {
            index.entry(name.to_string()).or_insert(path);
        }
    }
    index
}
