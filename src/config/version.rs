//! Version gating for catalogs and units.
//!
//! The target's version is read from a file under the root (a
//! `package.json`, a TOML manifest or a bare VERSION file) and compared
//! against semver requirements like ">=2.0.0, <2.1.0".

use semver::{Version, VersionReq};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub enum VersionError {
    /// Invalid version string (e.g., "not-a-version")
    InvalidVersion { value: String, source: String },
    /// Invalid version requirement (e.g., ">=bad")
    InvalidRequirement { value: String, source: String },
    /// Version file missing or unreadable
    Unreadable { file: String, source: String },
    /// Version file has no recognizable version field
    MissingField { file: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, source } => {
                write!(f, "invalid version '{}': {}", value, source)
            }
            VersionError::InvalidRequirement { value, source } => {
                write!(f, "invalid version requirement '{}': {}", value, source)
            }
            VersionError::Unreadable { file, source } => {
                write!(f, "cannot read version file {}: {}", file, source)
            }
            VersionError::MissingField { file } => {
                write!(f, "no version field in {}", file)
            }
        }
    }
}

impl std::error::Error for VersionError {}

/// Check if a version matches a requirement string
///
/// # Examples
///
/// ```
/// use drift_patcher::config::version::matches_requirement;
///
/// assert!(matches_requirement("2.0.14", Some(">=2.0.0")).unwrap());
/// assert!(!matches_requirement("1.9.0", Some(">=2.0.0")).unwrap());
///
/// // None requirement means "apply to all versions"
/// assert!(matches_requirement("1.0.0", None).unwrap());
/// ```
pub fn matches_requirement(
    version: &str,
    requirement: Option<&str>,
) -> Result<bool, VersionError> {
    let Some(req_str) = requirement else {
        return Ok(true);
    };

    let req_str = req_str.trim();
    if req_str.is_empty() {
        return Ok(true);
    }

    let version = Version::parse(version.trim()).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        source: e.to_string(),
    })?;

    let req = VersionReq::parse(req_str).map_err(|e| VersionError::InvalidRequirement {
        value: req_str.to_string(),
        source: e.to_string(),
    })?;

    Ok(req.matches(&version))
}

/// Read the target version from `version_file` under `root`.
///
/// `.json` files use the top-level `"version"` key, `.toml` files use
/// `package.version` (falling back to a top-level `version`), anything else
/// is taken as the bare version string.
pub fn detect_version(root: &Path, version_file: &str) -> Result<String, VersionError> {
    let path = root.join(version_file);
    let contents = fs::read_to_string(&path).map_err(|e| VersionError::Unreadable {
        file: version_file.to_string(),
        source: e.to_string(),
    })?;

    let unreadable = |source: String| VersionError::Unreadable {
        file: version_file.to_string(),
        source,
    };
    let missing = || VersionError::MissingField {
        file: version_file.to_string(),
    };

    let version = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            let value: serde_json::Value =
                serde_json::from_str(&contents).map_err(|e| unreadable(e.to_string()))?;
            value
                .get("version")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(missing)?
        }
        Some("toml") => {
            let doc = contents
                .parse::<toml_edit::DocumentMut>()
                .map_err(|e| unreadable(e.to_string()))?;
            doc.get("package")
                .and_then(|pkg| pkg.get("version"))
                .or_else(|| doc.get("version"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(missing)?
        }
        _ => {
            let trimmed = contents.trim();
            if trimmed.is_empty() {
                return Err(missing());
            }
            trimmed.to_string()
        }
    };

    Ok(version)
}
