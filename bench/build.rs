//! Records the toolchain that compiles the benchmark.

use std::error::Error;

#[allow(clippy::print_stdout)]
fn main() -> Result<(), Box<dyn Error>> {
    let meta = rustc_version::version_meta()?;
    println!(
        "cargo:rustc-env=ENVBENCH_RUSTC_VERSION={}",
        meta.short_version_string
    );
    println!("cargo:rerun-if-env-changed=RUSTC");
    Ok(())
}
