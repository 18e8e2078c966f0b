//! The shipped TLS probe catalog against current and older bundle shapes.

use super::{run, shipped_catalog, TargetRoot};
use drift_patcher::{load_from_path, OutcomeReason, RunMode, UnitStatus};

const CURRENT_BUNDLE: &str = r#"async function probeIde(port, useTls) {
  const url = `ws://127.0.0.1:${port}`;
  return connect(url);
}
"#;

const OLD_BUNDLE: &str = r#"async function probeIde(ideServerPort, useTls) {
  const url = `ws://localhost:${ideServerPort}`;
  return connect(url);
}
"#;

#[test]
fn test_probe_selects_wss_when_tls_enabled() {
    let root = TargetRoot::new().with_file("cli.js", CURRENT_BUNDLE);
    let catalog = load_from_path(shipped_catalog("tls-probe.toml")).unwrap();

    let (first, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(first.applied(), 1);
    assert_eq!(first.exit_code(), 0);

    let patched = root.read("cli.js");
    assert!(patched.contains(r#"const url = `${useTls ? "wss" : "ws"}://127.0.0.1:${port}`;"#));

    let (second, _) = run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(second.skipped(), 1);
    assert!(matches!(
        second.outcomes[0].reason,
        OutcomeReason::AlreadyApplied { .. }
    ));
    assert_eq!(root.read("cli.js"), patched);
}

#[test]
fn test_older_bundle_uses_fallback() {
    let root = TargetRoot::new().with_file("dist/cli-2.0.1.js", OLD_BUNDLE);
    let catalog = load_from_path(shipped_catalog("tls-probe.toml")).unwrap();

    let (result, _) = run(root.path(), &catalog, RunMode::Apply);
    let outcome = &result.outcomes[0];
    assert_eq!(outcome.status(), UnitStatus::Applied);
    assert!(outcome
        .reason
        .to_string()
        .contains("edit #1 matched via fallback #2"));

    assert!(root
        .read("dist/cli-2.0.1.js")
        .contains(r#"const url = `${useTls ? "wss" : "ws"}://localhost:${ideServerPort}`;"#));
}

#[test]
fn test_original_is_backed_up() {
    let root = TargetRoot::new().with_file("cli.js", CURRENT_BUNDLE);
    let catalog = load_from_path(shipped_catalog("tls-probe.toml")).unwrap();

    run(root.path(), &catalog, RunMode::Apply);
    assert_eq!(
        root.read(".drift-patcher/backups/cli.js"),
        CURRENT_BUNDLE
    );
}
