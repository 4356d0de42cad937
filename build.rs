//! Build script stamping the compiler version into the binary
//!
//! Exposes `SEIZMEIA_RUSTC_VERSION` to `option_env!`; left unset when
//! `rustc --version` cannot be run.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=RUSTC");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok());

    if let Some(version) = version {
        println!("cargo:rustc-env=SEIZMEIA_RUSTC_VERSION={}", version.trim());
    }
}
