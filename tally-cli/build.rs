use std::path::Path;
use std::process::Command;

const STAMP_VAR: &str = "TALLY_BUILD_SHA";

/// `git describe` of the workspace, or "unknown" outside a checkout.
fn describe(workspace: &Path) -> Option<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let stamp = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!stamp.is_empty()).then_some(stamp)
}

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let workspace = Path::new(&manifest_dir).join("..");

    // packagers without a git checkout set the stamp themselves
    let stamp = std::env::var(STAMP_VAR)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| describe(&workspace))
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env={STAMP_VAR}={stamp}");
    println!("cargo:rerun-if-env-changed={STAMP_VAR}");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");
}
