//! Idempotency gate.
//!
//! Decides from the target's current state alone whether a unit's effect is
//! already present. Nothing is persisted between runs: the target gets
//! reinstalled behind our back, so any recorded history would go stale.

use crate::config::Marker;
use crate::matcher::MatcherError;
use std::path::Path;
use thiserror::Error;

/// What the gate looks at: the root, plus the target text when the unit has one.
#[derive(Debug, Clone, Copy)]
pub struct GateTarget<'a> {
    pub root: &'a Path,
    pub text: Option<&'a str>,
}

#[derive(Error, Debug)]
pub enum GateError {
    #[error("marker needs target file content but the unit has no target")]
    NoTargetText,

    #[error(transparent)]
    Matcher(#[from] MatcherError),
}

/// Whether `marker` is satisfied by the target.
pub fn already_applied(target: GateTarget<'_>, marker: &Marker) -> Result<bool, GateError> {
    match marker {
        Marker::Path { path } => Ok(target.root.join(path).exists()),
        Marker::Text(needle) => {
            let text = target.text.ok_or(GateError::NoTargetText)?;
            Ok(text.contains(needle.as_str()))
        }
        Marker::Spec(spec) => {
            let text = target.text.ok_or(GateError::NoTargetText)?;
            Ok(spec.is_match(text)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchSpec;

    fn with_text(text: &str) -> GateTarget<'_> {
        GateTarget {
            root: Path::new("/nonexistent"),
            text: Some(text),
        }
    }

    #[test]
    fn test_text_marker() {
        let marker = Marker::text("/* drift:gh-12 */");
        assert!(already_applied(with_text("x /* drift:gh-12 */ y"), &marker).unwrap());
        assert!(!already_applied(with_text("x y"), &marker).unwrap());
    }

    #[test]
    fn test_regex_marker() {
        let marker = Marker::Spec(MatchSpec::regex(r"retries:\s*[1-9]"));
        assert!(already_applied(with_text("{ retries: 3 }"), &marker).unwrap());
        assert!(!already_applied(with_text("{ retries: 0 }"), &marker).unwrap());
    }

    #[test]
    fn test_path_marker() {
        let dir = tempfile::tempdir().unwrap();
        let marker = Marker::Path {
            path: "node_modules/ws".to_string(),
        };
        let target = GateTarget {
            root: dir.path(),
            text: None,
        };
        assert!(!already_applied(target, &marker).unwrap());
        std::fs::create_dir_all(dir.path().join("node_modules/ws")).unwrap();
        assert!(already_applied(target, &marker).unwrap());
    }

    #[test]
    fn test_text_marker_without_text() {
        let target = GateTarget {
            root: Path::new("/"),
            text: None,
        };
        assert!(matches!(
            already_applied(target, &Marker::text("x")),
            Err(GateError::NoTargetText)
        ));
    }
}
