//! Build script for crashlens-core
//!
//! Checks the toolchain before compilation:
//! - Minimum Rust version (1.75, the workspace `rust-version`)
//! - Target family: dumps are ELF core files and the backend is driven over
//!   Unix pipes, so non-Unix targets only get a warning

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    match rustc_version::version() {
        Ok(found) => {
            let minimum = rustc_version::Version::new(1, 75, 0);
            if found < minimum {
                panic!("crashlens-core requires Rust {minimum} or newer, found {found}");
            }
        }
        // Some build environments hide rustc; don't fail over it
        Err(_) => println!("cargo:warning=could not verify Rust version"),
    }

    // cfg!(unix) here would describe the host, not the target
    let family = std::env::var("CARGO_CFG_TARGET_FAMILY").unwrap_or_default();
    if !family.split(',').any(|f| f == "unix") {
        println!("cargo:warning=crashlens-core is only tested on Unix targets (found family '{family}')");
    }
}
