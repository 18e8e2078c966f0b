//! Orchestration behaviour: idempotence, fail-open tallies, verification,
//! prerequisites and backups.

use super::{run, TargetRoot};
use drift_patcher::{load_from_str, OutcomeReason, RunMode, UnitStatus};

const THREE_UNITS: &str = r#"
[meta]
name = "core"

[[patches]]
id = "gh-101"
files = ["app.js"]
marker = "retries: 3"

[[patches.edits]]
[[patches.edits.alternatives]]
type = "literal"
pattern = "retries: 0"
replacement = "retries: 3"

[[patches]]
id = "gh-102"
files = ["app.js"]
marker = "keepAlive: true"

[[patches.edits]]
[[patches.edits.alternatives]]
type = "literal"
pattern = "keepAlive: false"
replacement = "keepAlive: true"

[[patches.edits.alternatives]]
type = "regex"
pattern = 'keepAlive:\s*0'
replacement = "keepAlive: true"

[[patches.edits.alternatives]]
type = "line"
pattern = "keepAlive = false;"
replacement = "keepAlive = true; /* keepAlive: true */"

[[patches]]
id = "gh-103"
files = ["app.js"]
marker = "timeout: 30000"

[[patches.edits]]
[[patches.edits.alternatives]]
type = "regex"
pattern = 'timeout: \d+'
replacement = "timeout: 30000"
"#;

const APP: &str = "const opts = { retries: 0, keepAlive: false, timeout: 500 };\n";
const DRIFTED_APP: &str = "const opts = { retries: 0, persistent: false, timeout: 500 };\n";

#[test]
fn test_applying_twice_is_identical() {
    let root = TargetRoot::new().with_file("app.js", APP);
    let catalog = load_from_str(THREE_UNITS).unwrap();

    let (first, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(first.applied(), 3);
    let once = root.read("app.js");
    assert_eq!(
        once,
        "const opts = { retries: 3, keepAlive: true, timeout: 30000 };\n"
    );

    let (second, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(second.skipped(), 3);
    assert_eq!(root.read("app.js"), once);
}

#[test]
fn test_already_present_marker_leaves_file_untouched() {
    let patched = "const opts = { retries: 3 };\n";
    let root = TargetRoot::new().with_file("app.js", patched);
    let mut catalog = load_from_str(THREE_UNITS).unwrap();
    catalog.patches.truncate(1);

    let (result, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(result.skipped(), 1);
    assert!(matches!(
        result.outcomes[0].reason,
        OutcomeReason::AlreadyApplied { .. }
    ));
    assert_eq!(root.read("app.js"), patched);
}

#[test]
fn test_failure_does_not_stop_later_units() {
    let root = TargetRoot::new().with_file("app.js", DRIFTED_APP);
    let catalog = load_from_str(THREE_UNITS).unwrap();

    let (result, streamed) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(streamed, vec!["gh-101", "gh-102", "gh-103"]);
    assert_eq!(
        (result.applied(), result.skipped(), result.failed()),
        (2, 0, 1)
    );
    assert_eq!(result.exit_code(), 1);

    assert_eq!(result.outcomes[1].status(), UnitStatus::Failed);
    assert!(matches!(
        result.outcomes[1].reason,
        OutcomeReason::NoPatternMatch {
            edit: 1,
            alternatives: 3,
            ..
        }
    ));
    assert_eq!(
        root.read("app.js"),
        "const opts = { retries: 3, persistent: false, timeout: 30000 };\n"
    );
}

#[test]
fn test_no_alternative_matches_reports_unit() {
    let root = TargetRoot::new().with_file("app.js", DRIFTED_APP);
    let mut catalog = load_from_str(THREE_UNITS).unwrap();
    catalog.patches.retain(|p| p.id == "gh-102");

    let (result, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(result.failed(), 1);
    assert_eq!(result.exit_code(), 1);

    let outcome = &result.outcomes[0];
    assert_eq!(outcome.id, "gh-102");
    let detail = outcome.reason.to_string();
    assert!(detail.contains("none of 3 alternative(s) matched in app.js"));
    assert_eq!(root.read("app.js"), DRIFTED_APP);
}

#[test]
fn test_write_without_marker_fails_verification() {
    let root = TargetRoot::new().with_file("app.js", APP);
    let catalog = load_from_str(
        r#"
[meta]
name = "bad"

[[patches]]
id = "typo"
files = ["app.js"]
marker = "retries: 5"

[[patches.edits]]
[[patches.edits.alternatives]]
type = "literal"
pattern = "retries: 0"
replacement = "retries: 4"
"#,
    )
    .unwrap();

    let (result, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(result.failed(), 1);
    assert!(matches!(
        result.outcomes[0].reason,
        OutcomeReason::VerifyFailed { .. }
    ));
}

#[test]
fn test_dependent_unit_waits_for_prerequisite() {
    let root = TargetRoot::new().with_file("app.js", DRIFTED_APP);
    let catalog = load_from_str(
        r#"
[meta]
name = "deps"

[[patches]]
id = "keepalive"
files = ["app.js"]
marker = "keepAlive: true"

[[patches.edits]]
[[patches.edits.alternatives]]
type = "literal"
pattern = "keepAlive: false"
replacement = "keepAlive: true"

[[patches]]
id = "keepalive-timeout"
files = ["app.js"]
marker = "timeout: 60000"
requires = ["keepalive"]

[[patches.edits]]
[[patches.edits.alternatives]]
type = "regex"
pattern = 'timeout: \d+'
replacement = "timeout: 60000"
"#,
    )
    .unwrap();

    let (result, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(result.failed(), 1);
    assert_eq!(result.skipped(), 1);
    assert_eq!(
        result.outcomes[1].reason.to_string(),
        "prerequisite 'keepalive' not applied"
    );
    assert_eq!(root.read("app.js"), DRIFTED_APP);

    root.write("app.js", APP);
    let (result, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(result.applied(), 2);
}

#[test]
fn test_backup_is_never_overwritten() {
    let root = TargetRoot::new().with_file("app.js", APP);
    let mut catalog = load_from_str(THREE_UNITS).unwrap();
    catalog.meta.backup = true;
    catalog.meta.backup_dir = Some("backups".to_string());

    run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(root.read("backups/app.js"), APP);

    // The install is replaced with a new release; the backup stays the first original
    root.write("app.js", DRIFTED_APP);
    run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(root.read("backups/app.js"), APP);
}

#[test]
fn test_dry_run_reports_without_writing() {
    let root = TargetRoot::new().with_file("app.js", APP);
    let catalog = load_from_str(THREE_UNITS).unwrap();

    let (result, _) = run(root.path(), &catalog, RunMode::Check);
    assert_eq!(result.applied(), 3);
    assert_eq!(root.read("app.js"), APP);

    let first = result.outcomes[0].change.as_ref().unwrap();
    assert_eq!(first.before, APP);

    // Later units see earlier units' shadowed edits
    let last = result.outcomes[2].change.as_ref().unwrap();
    assert!(last.before.contains("retries: 3"));
    assert!(last.after.contains("timeout: 30000"));
}

#[test]
fn test_missing_target_file_is_skipped() {
    let root = TargetRoot::new().with_file("other.js", APP);
    let catalog = load_from_str(THREE_UNITS).unwrap();

    let (result, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(result.skipped(), 3);
    assert_eq!(result.exit_code(), 0);
}
