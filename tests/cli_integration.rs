//! Integration tests for the command-line interface
//!
//! Drives the built binary against temporary target roots and catalogs.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CATALOG: &str = r#"[meta]
name = "cli-test"
phase = "core"

[[patches]]
id = "retries"
description = "Retry the IDE probe"
files = ["app.js"]
marker = "retries: 3"

[[patches.edits]]
[[patches.edits.alternatives]]
type = "literal"
pattern = "retries: 0"
replacement = "retries: 3"

[[patches]]
id = "timeout"
files = ["app.js"]
marker = "timeout: 30000"
version_range = ">=2.0.0"

[[patches.edits]]
[[patches.edits.alternatives]]
type = "literal"
pattern = "timeout: 500"
replacement = "timeout: 30000"
"#;

/// Target root plus a catalog directory beside it.
fn setup() -> (TempDir, TempDir) {
    let target = TempDir::new().unwrap();
    fs::write(
        target.path().join("app.js"),
        "const opts = { retries: 0, timeout: 500 };\n",
    )
    .unwrap();

    let catalogs = TempDir::new().unwrap();
    fs::write(catalogs.path().join("10-core.toml"), CATALOG).unwrap();

    (target, catalogs)
}

fn drift_patcher(args: &[&str], catalogs: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_drift-patcher"))
        .args(args)
        .arg("--catalog")
        .arg(catalogs)
        .env("NO_COLOR", "1")
        .env_remove("DRIFT_PATCHER_CATALOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_apply_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_drift-patcher"))
        .args(["apply", "--help"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let help = stdout(&output);
    assert!(help.contains("--dry-run"));
    assert!(help.contains("--diff"));
    assert!(help.contains("--phase"));
}

#[test]
fn test_apply_then_reapply() {
    let (target, catalogs) = setup();
    let root = target.path().to_str().unwrap();

    let first = drift_patcher(&["apply", root], catalogs.path());
    assert_eq!(first.status.code(), Some(0));
    let out = stdout(&first);
    assert!(out.contains("retries: ok"));
    // No version file, so the version-gated unit is not applicable
    assert!(out.contains("timeout: not applicable"));
    assert_eq!(
        fs::read_to_string(target.path().join("app.js")).unwrap(),
        "const opts = { retries: 3, timeout: 500 };\n"
    );

    let second = drift_patcher(&["apply", root], catalogs.path());
    assert_eq!(second.status.code(), Some(0));
    assert!(stdout(&second).contains("retries: already applied"));
}

#[test]
fn test_dry_run_with_diff_writes_nothing() {
    let (target, catalogs) = setup();
    let root = target.path().to_str().unwrap();

    let output = drift_patcher(&["apply", root, "--dry-run", "--diff"], catalogs.path());
    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("would apply"));
    assert!(out.contains("-const opts = { retries: 0, timeout: 500 };"));
    assert!(out.contains("+const opts = { retries: 3, timeout: 500 };"));
    assert_eq!(
        fs::read_to_string(target.path().join("app.js")).unwrap(),
        "const opts = { retries: 0, timeout: 500 };\n"
    );
}

#[test]
fn test_exit_code_counts_failures() {
    let (target, catalogs) = setup();
    fs::write(target.path().join("app.js"), "const opts = {};\n").unwrap();

    let output = drift_patcher(&["apply", target.path().to_str().unwrap()], catalogs.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("retries"));
}

#[test]
fn test_status_groups_units() {
    let (target, catalogs) = setup();
    fs::write(target.path().join("package.json"), r#"{"version": "2.1.0"}"#).unwrap();
    let catalog = CATALOG.replace(
        "phase = \"core\"",
        "phase = \"core\"\nversion_file = \"package.json\"",
    );
    fs::write(catalogs.path().join("10-core.toml"), catalog).unwrap();
    fs::write(
        target.path().join("app.js"),
        "const opts = { retries: 3, timeout: 500 };\n",
    )
    .unwrap();

    let output = drift_patcher(&["status", target.path().to_str().unwrap()], catalogs.path());
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("APPLIED (1 patches)"));
    assert!(out.contains("PENDING (1 patches)"));
}

#[test]
fn test_verify_reports_mismatch() {
    let (target, catalogs) = setup();
    let root = target.path().to_str().unwrap();

    let before = drift_patcher(&["verify", root], catalogs.path());
    assert_eq!(before.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&before.stderr).contains("retries: MISMATCH"));

    drift_patcher(&["apply", root], catalogs.path());
    let after = drift_patcher(&["verify", root], catalogs.path());
    assert_eq!(after.status.code(), Some(0));
    assert!(stdout(&after).contains("retries: Verified"));
}

#[test]
fn test_list_and_phase_filter() {
    let (_target, catalogs) = setup();

    let output = drift_patcher(&["list"], catalogs.path());
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("core"));
    assert!(out.contains("retries"));
    assert!(out.contains("Retry the IDE probe"));
    assert!(out.contains("[>=2.0.0]"));

    let missing = drift_patcher(&["list", "--phase", "nope"], catalogs.path());
    assert!(!missing.status.success());
}

#[test]
fn test_catalog_from_environment() {
    let (target, catalogs) = setup();

    let output = Command::new(env!("CARGO_BIN_EXE_drift-patcher"))
        .args(["apply", target.path().to_str().unwrap()])
        .env("DRIFT_PATCHER_CATALOG", catalogs.path())
        .env("NO_COLOR", "1")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(fs::read_to_string(target.path().join("app.js"))
        .unwrap()
        .contains("retries: 3"));
}

#[test]
fn test_missing_root_skips_everything() {
    let (target, catalogs) = setup();
    let absent = target.path().join("not-installed");

    let output = drift_patcher(&["apply", absent.to_str().unwrap()], catalogs.path());
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("target root not found"));
}

#[test]
fn test_dry_run_sees_earlier_phases() {
    let target = TempDir::new().unwrap();
    fs::write(target.path().join("app.js"), "start();\n").unwrap();

    let catalogs = TempDir::new().unwrap();
    fs::write(
        catalogs.path().join("10-rename.toml"),
        r#"
[[patches]]
id = "rename"
files = ["app.js"]
marker = "helper("

[[patches.edits]]
[[patches.edits.alternatives]]
type = "literal"
pattern = "start()"
replacement = "helper()"
"#,
    )
    .unwrap();
    fs::write(
        catalogs.path().join("20-flag.toml"),
        r#"
[[patches]]
id = "flag"
files = ["app.js"]
marker = "helper(true)"

[[patches.edits]]
[[patches.edits.alternatives]]
type = "literal"
pattern = "helper()"
replacement = "helper(true)"
"#,
    )
    .unwrap();
    let root = target.path().to_str().unwrap();

    let dry_run = drift_patcher(&["apply", root, "--dry-run"], catalogs.path());
    assert_eq!(dry_run.status.code(), Some(0));
    assert!(stdout(&dry_run).contains("flag: would apply"));

    let status = drift_patcher(&["status", root], catalogs.path());
    assert!(stdout(&status).contains("PENDING (2 patches)"));
    assert!(!stdout(&status).contains("FAILING"));

    let real = drift_patcher(&["apply", root], catalogs.path());
    assert_eq!(real.status.code(), dry_run.status.code());
    assert_eq!(
        fs::read_to_string(target.path().join("app.js")).unwrap(),
        "helper(true);\n"
    );
}
