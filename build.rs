//! Build script for sciplan
//!
//! Stamps the binary with the commit, build date, target and profile it was
//! built from. Missing git metadata degrades to "unknown".

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");

    let commit = git(&["rev-parse", "--short=8", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let dirty = git(&["status", "--porcelain"]).is_some_and(|out| !out.is_empty());
    let built = chrono::Utc::now().format("%Y-%m-%d").to_string();

    println!(
        "cargo:rustc-env=SCIPLAN_COMMIT={}{}",
        commit,
        if dirty { "+dirty" } else { "" }
    );
    println!("cargo:rustc-env=SCIPLAN_BUILD_DATE={}", built);
    println!(
        "cargo:rustc-env=SCIPLAN_TARGET={}",
        env::var("TARGET").unwrap_or_else(|_| "unknown".into())
    );
    println!(
        "cargo:rustc-env=SCIPLAN_PROFILE={}",
        env::var("PROFILE").unwrap_or_else(|_| "unknown".into())
    );
}

/// Trimmed stdout of a successful git invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}
