use crate::matcher::MatchSpec;
use crate::process::CommandSpec;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_BACKUP_DIR: &str = ".drift-patcher/backups";

/// One catalog file: a phase of units applied in declaration order.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Catalog {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patches: Vec<PatchUnit>,
    /// File the catalog was loaded from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Catalog {
    /// Phase name: `meta.phase`, else the catalog file stem, else `meta.name`.
    pub fn phase(&self) -> &str {
        if let Some(phase) = self.meta.phase.as_deref() {
            return phase;
        }
        self.source
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(|s| s.to_str())
            .unwrap_or(self.meta.name.as_str())
    }

    pub fn backup_dir(&self) -> &str {
        self.meta
            .backup_dir
            .as_deref()
            .unwrap_or(DEFAULT_BACKUP_DIR)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.patches.is_empty() {
            issues.push(ValidationIssue::EmptyPatchList);
        }

        if let Some(range) = &self.meta.version_range {
            if let Err(e) = semver::VersionReq::parse(range.trim()) {
                issues.push(ValidationIssue::InvalidCombo {
                    patch_id: None,
                    message: format!("meta.version_range '{range}': {e}"),
                });
            }
        }

        let meta_paths = [
            ("meta.backup_dir", self.meta.backup_dir.as_deref()),
            ("meta.version_file", self.meta.version_file.as_deref()),
        ];
        for (field, path) in meta_paths {
            if let Some(path) = path.filter(|p| escapes_root(p)) {
                issues.push(ValidationIssue::PathEscapesRoot {
                    patch_id: None,
                    field,
                    path: path.to_string(),
                });
            }
        }
        for path in self.meta.protected.iter().filter(|p| escapes_root(p)) {
            issues.push(ValidationIssue::PathEscapesRoot {
                patch_id: None,
                field: "meta.protected[]",
                path: path.clone(),
            });
        }

        let mut seen: HashSet<&str> = HashSet::new();

        for patch in &self.patches {
            let id = Some(patch.id.clone());

            if patch.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
            } else if !seen.insert(patch.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId {
                    patch_id: patch.id.clone(),
                });
            }

            for required in &patch.requires {
                // Prerequisites run first, so they must be declared earlier
                if !seen.contains(required.as_str()) || required == &patch.id {
                    issues.push(ValidationIssue::UnknownPrerequisite {
                        patch_id: patch.id.clone(),
                        requires: required.clone(),
                    });
                }
            }

            if patch.files.is_empty() && patch.command.is_none() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: id.clone(),
                    field: "files",
                });
            }
            if patch.files.iter().any(|f| f.trim().is_empty()) {
                issues.push(ValidationIssue::MissingField {
                    patch_id: id.clone(),
                    field: "files[]",
                });
            }
            for file in patch.files.iter().filter(|f| escapes_root(f)) {
                issues.push(ValidationIssue::PathEscapesRoot {
                    patch_id: id.clone(),
                    field: "files[]",
                    path: file.clone(),
                });
            }

            match &patch.marker {
                Marker::Text(text) if text.is_empty() => {
                    issues.push(ValidationIssue::MissingField {
                        patch_id: id.clone(),
                        field: "marker",
                    });
                }
                Marker::Path { path } if path.trim().is_empty() => {
                    issues.push(ValidationIssue::MissingField {
                        patch_id: id.clone(),
                        field: "marker.path",
                    });
                }
                Marker::Path { path } if escapes_root(path) => {
                    issues.push(ValidationIssue::PathEscapesRoot {
                        patch_id: id.clone(),
                        field: "marker.path",
                        path: path.clone(),
                    });
                }
                Marker::Spec(spec) => {
                    if let Err(e) = spec.check() {
                        issues.push(ValidationIssue::InvalidPattern {
                            patch_id: patch.id.clone(),
                            message: format!("marker: {e}"),
                        });
                    }
                }
                _ => {}
            }

            if patch.marker.reads_target() && patch.files.is_empty() {
                issues.push(ValidationIssue::InvalidCombo {
                    patch_id: id.clone(),
                    message: "text marker requires files".to_string(),
                });
            }

            if !patch.edits.is_empty() && patch.files.is_empty() {
                issues.push(ValidationIssue::InvalidCombo {
                    patch_id: id.clone(),
                    message: "edits require files".to_string(),
                });
            }

            if patch.edits.is_empty() && patch.command.is_none() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: id.clone(),
                    field: "edits",
                });
            }

            for (step_idx, step) in patch.edits.iter().enumerate() {
                if step.alternatives.is_empty() {
                    issues.push(ValidationIssue::InvalidCombo {
                        patch_id: id.clone(),
                        message: format!("edit #{} has no alternatives", step_idx + 1),
                    });
                }
                for (alt_idx, alt) in step.alternatives.iter().enumerate() {
                    if let Err(e) = alt.spec.check() {
                        issues.push(ValidationIssue::InvalidPattern {
                            patch_id: patch.id.clone(),
                            message: format!(
                                "edit #{} alternative #{}: {e}",
                                step_idx + 1,
                                alt_idx + 1
                            ),
                        });
                    }
                }
            }

            if let Some(command) = &patch.command {
                if command.program.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        patch_id: id.clone(),
                        field: "command.program",
                    });
                }
                if let Some(cwd) = command.cwd.as_deref().filter(|c| escapes_root(c)) {
                    issues.push(ValidationIssue::PathEscapesRoot {
                        patch_id: id.clone(),
                        field: "command.cwd",
                        path: cwd.to_string(),
                    });
                }
            }

            if let Some(range) = &patch.version_range {
                if let Err(e) = semver::VersionReq::parse(range.trim()) {
                    issues.push(ValidationIssue::InvalidCombo {
                        patch_id: id.clone(),
                        message: format!("version_range '{range}': {e}"),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// True when `path` is absolute or climbs out through `..`.
fn escapes_root(path: &str) -> bool {
    Path::new(path.trim()).components().any(|c| {
        matches!(
            c,
            Component::RootDir | Component::Prefix(_) | Component::ParentDir
        )
    })
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub version_range: Option<String>,
    /// Root-relative file the target version is read from
    #[serde(default)]
    pub version_file: Option<String>,
    #[serde(default)]
    pub backup_dir: Option<String>,
    /// Default for units that do not set `backup`
    #[serde(default)]
    pub backup: bool,
    #[serde(default)]
    pub precondition: Option<Precondition>,
    /// Root-relative paths that must never be patched
    #[serde(default)]
    pub protected: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Precondition {
    /// The process must be able to create files in the target root
    WritableRoot,
}

/// One named, independently runnable change.
#[derive(Debug, Deserialize, Clone)]
pub struct PatchUnit {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Candidate target paths or globs, root-relative, in priority order
    #[serde(default)]
    pub files: Vec<String>,
    pub marker: Marker,
    #[serde(default)]
    pub edits: Vec<EditStep>,
    #[serde(default)]
    pub command: Option<CommandSpec>,
    #[serde(default)]
    pub version_range: Option<String>,
    /// Earlier units that must have landed for this one to run
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub backup: Option<bool>,
}

impl PatchUnit {
    pub fn new(id: impl Into<String>, file: impl Into<String>, marker: Marker) -> Self {
        Self {
            id: id.into(),
            description: None,
            files: vec![file.into()],
            marker,
            edits: Vec::new(),
            command: None,
            version_range: None,
            requires: Vec::new(),
            backup: None,
        }
    }

    pub fn with_edit(mut self, step: EditStep) -> Self {
        self.edits.push(step);
        self
    }

    pub fn requires(mut self, id: impl Into<String>) -> Self {
        self.requires.push(id.into());
        self
    }
}

/// One edit: ordered alternatives, first match wins.
#[derive(Debug, Deserialize, Clone)]
pub struct EditStep {
    #[serde(default)]
    pub replace_all: bool,
    pub alternatives: Vec<Alternative>,
}

impl EditStep {
    pub fn new(alternatives: Vec<Alternative>) -> Self {
        Self {
            replace_all: false,
            alternatives,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Alternative {
    #[serde(flatten)]
    pub spec: MatchSpec,
    pub replacement: String,
    #[serde(default)]
    pub position: Position,
}

impl Alternative {
    pub fn new(spec: MatchSpec, replacement: impl Into<String>) -> Self {
        Self {
            spec,
            replacement: replacement.into(),
            position: Position::Replace,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

/// Where the rendered replacement goes relative to the match.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    Replace,
    Before,
    After,
}

/// Idempotency predicate, also used as the post-write success condition.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Marker {
    /// Literal substring of the target file
    Text(String),
    /// Root-relative path that exists once the unit's effect landed
    Path { path: String },
    Spec(MatchSpec),
}

impl Marker {
    pub fn text(marker: impl Into<String>) -> Self {
        Marker::Text(marker.into())
    }

    /// Whether evaluating the marker needs the target file's content.
    pub fn reads_target(&self) -> bool {
        !matches!(self, Marker::Path { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        patch_id: Option<String>,
        message: String,
    },
    DuplicateId {
        patch_id: String,
    },
    InvalidPattern {
        patch_id: String,
        message: String,
    },
    UnknownPrerequisite {
        patch_id: String,
        requires: String,
    },
    PathEscapesRoot {
        patch_id: Option<String>,
        field: &'static str,
        path: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchList => write!(f, "patch catalog contains no patches"),
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "patch missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { patch_id, message } => match patch_id {
                Some(id) => write!(f, "patch '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch configuration: {message}"),
            },
            ValidationIssue::DuplicateId { patch_id } => {
                write!(f, "patch id '{patch_id}' is declared more than once")
            }
            ValidationIssue::InvalidPattern { patch_id, message } => {
                write!(f, "patch '{patch_id}' has an invalid pattern: {message}")
            }
            ValidationIssue::UnknownPrerequisite { patch_id, requires } => write!(
                f,
                "patch '{patch_id}' requires '{requires}', which is not declared before it"
            ),
            ValidationIssue::PathEscapesRoot {
                patch_id,
                field,
                path,
            } => match patch_id {
                Some(id) => write!(
                    f,
                    "patch '{id}' field '{field}' must be a relative path inside the target root, got '{path}'"
                ),
                None => write!(
                    f,
                    "field '{field}' must be a relative path inside the target root, got '{path}'"
                ),
            },
        }
    }
}
