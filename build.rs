//! This build script copies the `memory.x` file from the crate root into a directory where
//! the linker can always find it at build time, and records the build time as the initial
//! wall-clock reference for the firmware.

use std::{env, fs::File, io::Write, path::PathBuf};

fn main() {
    // Put memory layout in the output directory and ensure it's on the linker search path.
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(include_bytes!("memory.x"))
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());

    // Create rs file with the current local wall-clock time
    File::create(out.join("build_epoch.rs"))
        .unwrap()
        .write_fmt(format_args!(
            "const BUILD_EPOCH: i64 = {:?};",
            chrono::Local::now().naive_local().and_utc().timestamp()
        ))
        .unwrap();

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}
