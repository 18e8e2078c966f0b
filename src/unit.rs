//! Patch unit execution.
//!
//! A unit moves through version gating, prerequisite checks, target
//! resolution, the idempotency gate, its edit steps, an optional external
//! command and finally verification. Every path ends in exactly one
//! [`OutcomeReason`]; errors never cross the unit boundary.

use crate::backup::BackupStore;
use crate::config::{matches_requirement, PatchUnit};
use crate::gate::{already_applied, GateError, GateTarget};
use crate::matcher::DriftHint;
use crate::mutator::{apply_edit, MutationError, TargetStore};
use crate::process::run_command;
use crate::safety::RootGuard;
use crate::verify::{verify, VerifyError};
use globset::GlobBuilder;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Tri-state summary of an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitStatus {
    Applied,
    Skipped,
    Failed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Applied => write!(f, "applied"),
            UnitStatus::Skipped => write!(f, "skipped"),
            UnitStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An edit step that landed through an alternative other than the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    /// 1-based edit step
    pub edit: usize,
    /// 1-based alternative within the step
    pub alternative: usize,
}

/// Why a unit ended where it did.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeReason {
    Applied {
        file: Option<PathBuf>,
        fallbacks: Vec<Fallback>,
    },

    TargetMissing {
        candidates: Vec<String>,
    },
    AlreadyApplied {
        file: Option<PathBuf>,
    },
    NotApplicable {
        reason: String,
    },
    PrerequisiteNotApplied {
        prerequisite: String,
    },

    NoPatternMatch {
        file: PathBuf,
        /// 1-based edit step
        edit: usize,
        alternatives: usize,
        hint: Option<DriftHint>,
    },
    InvalidPattern {
        message: String,
    },
    Io {
        path: PathBuf,
        message: String,
    },
    WriteFailed {
        file: PathBuf,
        message: String,
    },
    VerifyFailed {
        file: Option<PathBuf>,
    },
    ExternalProcess {
        message: String,
    },
    UnsafePath {
        message: String,
    },
}

impl OutcomeReason {
    pub fn status(&self) -> UnitStatus {
        match self {
            OutcomeReason::Applied { .. } => UnitStatus::Applied,
            OutcomeReason::TargetMissing { .. }
            | OutcomeReason::AlreadyApplied { .. }
            | OutcomeReason::NotApplicable { .. }
            | OutcomeReason::PrerequisiteNotApplied { .. } => UnitStatus::Skipped,
            OutcomeReason::NoPatternMatch { .. }
            | OutcomeReason::InvalidPattern { .. }
            | OutcomeReason::Io { .. }
            | OutcomeReason::WriteFailed { .. }
            | OutcomeReason::VerifyFailed { .. }
            | OutcomeReason::ExternalProcess { .. }
            | OutcomeReason::UnsafePath { .. } => UnitStatus::Failed,
        }
    }

    /// Whether a dependent unit may build on this one.
    pub fn has_landed(&self) -> bool {
        matches!(
            self,
            OutcomeReason::Applied { .. } | OutcomeReason::AlreadyApplied { .. }
        )
    }
}

impl fmt::Display for OutcomeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeReason::Applied { file, fallbacks } => {
                match file {
                    Some(file) => write!(f, "applied to {}", file.display())?,
                    None => write!(f, "applied")?,
                }
                for fb in fallbacks {
                    write!(
                        f,
                        " (edit #{} matched via fallback #{})",
                        fb.edit, fb.alternative
                    )?;
                }
                Ok(())
            }
            OutcomeReason::TargetMissing { candidates } if candidates.is_empty() => {
                write!(f, "target root not found")
            }
            OutcomeReason::TargetMissing { candidates } => {
                write!(f, "no target file found (tried {})", candidates.join(", "))
            }
            OutcomeReason::AlreadyApplied { file: Some(file) } => {
                write!(f, "already applied to {}", file.display())
            }
            OutcomeReason::AlreadyApplied { file: None } => write!(f, "already applied"),
            OutcomeReason::NotApplicable { reason } => write!(f, "not applicable: {reason}"),
            OutcomeReason::PrerequisiteNotApplied { prerequisite } => {
                write!(f, "prerequisite '{prerequisite}' not applied")
            }
            OutcomeReason::NoPatternMatch {
                file,
                edit,
                alternatives,
                hint,
            } => {
                write!(
                    f,
                    "edit #{edit}: none of {alternatives} alternative(s) matched in {}",
                    file.display()
                )?;
                if let Some(hint) = hint {
                    write!(f, "; {hint}")?;
                }
                Ok(())
            }
            OutcomeReason::InvalidPattern { message } => write!(f, "invalid pattern: {message}"),
            OutcomeReason::Io { path, message } => {
                write!(f, "I/O error on {}: {message}", path.display())
            }
            OutcomeReason::WriteFailed { file, message } => {
                write!(f, "write to {} failed: {message}", file.display())
            }
            OutcomeReason::VerifyFailed { file: Some(file) } => {
                write!(f, "marker missing from {} after write", file.display())
            }
            OutcomeReason::VerifyFailed { file: None } => {
                write!(f, "marker missing after external step")
            }
            OutcomeReason::ExternalProcess { message } => {
                write!(f, "external step failed: {message}")
            }
            OutcomeReason::UnsafePath { message } => write!(f, "unsafe target path: {message}"),
        }
    }
}

/// Target content before and after a unit ran, kept for diff display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub id: String,
    pub reason: OutcomeReason,
    pub change: Option<FileChange>,
}

impl PatchOutcome {
    pub fn new(id: impl Into<String>, reason: OutcomeReason) -> Self {
        Self {
            id: id.into(),
            reason,
            change: None,
        }
    }

    pub fn status(&self) -> UnitStatus {
        self.reason.status()
    }
}

/// Everything a unit needs from its surrounding run.
#[derive(Debug, Clone, Copy)]
pub struct UnitContext<'a> {
    pub guard: &'a RootGuard,
    /// Detected target version, if the catalog names a version file
    pub version: Option<&'a str>,
    /// Catalog-wide version requirement
    pub catalog_range: Option<&'a str>,
    pub backups: &'a BackupStore,
    pub backup_by_default: bool,
    pub capture_diffs: bool,
}

struct Target {
    path: PathBuf,
    /// Root-relative, for display
    display: PathBuf,
}

/// Run one unit against `store`. `prior` holds the outcomes of units that
/// already ran in this phase.
pub fn run_unit(
    unit: &PatchUnit,
    ctx: &UnitContext<'_>,
    store: &mut dyn TargetStore,
    prior: &[PatchOutcome],
) -> PatchOutcome {
    let _span = tracing::debug_span!("unit", id = %unit.id).entered();

    match drive(unit, ctx, store, prior) {
        Ok((reason, change)) => PatchOutcome {
            id: unit.id.clone(),
            reason,
            change,
        },
        Err(reason) => {
            tracing::debug!(status = %reason.status(), %reason, "unit stopped");
            PatchOutcome::new(&unit.id, reason)
        }
    }
}

fn drive(
    unit: &PatchUnit,
    ctx: &UnitContext<'_>,
    store: &mut dyn TargetStore,
    prior: &[PatchOutcome],
) -> Result<(OutcomeReason, Option<FileChange>), OutcomeReason> {
    check_version(ctx, ctx.catalog_range)?;
    check_version(ctx, unit.version_range.as_deref())?;
    check_prerequisites(unit, prior)?;

    let target = if unit.files.is_empty() {
        None
    } else {
        Some(resolve_target(&unit.files, ctx.guard)?)
    };
    let target_path = target.as_ref().map(|t| t.path.as_path());
    let display = target.as_ref().map(|t| t.display.clone());

    let before = match target_path {
        Some(path) => Some(read(store, path)?),
        None => None,
    };

    let gate = GateTarget {
        root: ctx.guard.root(),
        text: before.as_deref(),
    };
    if already_applied(gate, &unit.marker).map_err(|e| gate_failure(e, unit))? {
        return Ok((OutcomeReason::AlreadyApplied { file: display }, None));
    }

    if let Some(target) = &target {
        if !unit.edits.is_empty() && !store.is_shadow() && unit.backup.unwrap_or(ctx.backup_by_default)
        {
            ctx.backups
                .ensure(&target.path)
                .map_err(|e| OutcomeReason::Io {
                    path: ctx.backups.backup_path(&target.path),
                    message: e.to_string(),
                })?;
        }
    }

    let mut fallbacks = Vec::new();
    if let Some(target) = &target {
        for (idx, step) in unit.edits.iter().enumerate() {
            let mutation = apply_edit(store, &target.path, step).map_err(|e| match e {
                MutationError::NoMatch { hint } => OutcomeReason::NoPatternMatch {
                    file: target.display.clone(),
                    edit: idx + 1,
                    alternatives: step.alternatives.len(),
                    hint,
                },
                MutationError::Matcher(e) => OutcomeReason::InvalidPattern {
                    message: e.to_string(),
                },
                MutationError::Read { path, source } => OutcomeReason::Io {
                    path,
                    message: source.to_string(),
                },
                MutationError::Edit(e) => OutcomeReason::WriteFailed {
                    file: target.display.clone(),
                    message: e.to_string(),
                },
            })?;
            if mutation.alternative > 0 {
                tracing::info!(
                    edit = idx + 1,
                    fallback = mutation.alternative + 1,
                    "matched via fallback"
                );
                fallbacks.push(Fallback {
                    edit: idx + 1,
                    alternative: mutation.alternative + 1,
                });
            }
        }
    }

    if let Some(command) = &unit.command {
        if store.is_shadow() {
            // Nothing to verify against without running it
            tracing::debug!(command = %command.display(), "external step not run in check mode");
            return Ok((
                OutcomeReason::Applied {
                    file: display,
                    fallbacks,
                },
                None,
            ));
        }
        run_command(command, ctx.guard.root()).map_err(|e| OutcomeReason::ExternalProcess {
            message: e.to_string(),
        })?;
    }

    let verified = verify(&*store, ctx.guard.root(), target_path, &unit.marker).map_err(|e| {
        match e {
            VerifyError::Read { path, source } => OutcomeReason::Io {
                path,
                message: source.to_string(),
            },
            VerifyError::Gate(e) => gate_failure(e, unit),
        }
    })?;
    if !verified {
        return Err(OutcomeReason::VerifyFailed { file: display });
    }

    let change = match (target_path, before) {
        (Some(path), Some(before)) if ctx.capture_diffs => Some(FileChange {
            path: display.clone().unwrap_or_else(|| path.to_path_buf()),
            before,
            after: read(store, path)?,
        }),
        _ => None,
    };

    Ok((
        OutcomeReason::Applied {
            file: display,
            fallbacks,
        },
        change,
    ))
}

fn check_version(ctx: &UnitContext<'_>, range: Option<&str>) -> Result<(), OutcomeReason> {
    let Some(range) = range.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(());
    };
    let Some(version) = ctx.version else {
        return Err(OutcomeReason::NotApplicable {
            reason: format!("version_range {range} set but target version is unknown"),
        });
    };
    match matches_requirement(version, Some(range)) {
        Ok(true) => Ok(()),
        Ok(false) => Err(OutcomeReason::NotApplicable {
            reason: format!("target version {version} does not satisfy {range}"),
        }),
        Err(e) => Err(OutcomeReason::NotApplicable {
            reason: e.to_string(),
        }),
    }
}

fn check_prerequisites(unit: &PatchUnit, prior: &[PatchOutcome]) -> Result<(), OutcomeReason> {
    for required in &unit.requires {
        let landed = prior
            .iter()
            .find(|o| &o.id == required)
            .is_some_and(|o| o.reason.has_landed());
        if !landed {
            return Err(OutcomeReason::PrerequisiteNotApplied {
                prerequisite: required.clone(),
            });
        }
    }
    Ok(())
}

fn read(store: &dyn TargetStore, path: &Path) -> Result<String, OutcomeReason> {
    store.read(path).map_err(|e| OutcomeReason::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn gate_failure(err: GateError, unit: &PatchUnit) -> OutcomeReason {
    match err {
        GateError::NoTargetText => OutcomeReason::TargetMissing {
            candidates: unit.files.clone(),
        },
        GateError::Matcher(e) => OutcomeReason::InvalidPattern {
            message: format!("marker: {e}"),
        },
    }
}

fn is_glob(candidate: &str) -> bool {
    candidate.contains(['*', '?', '[', '{'])
}

/// First candidate that names an existing file; globs expand to their
/// sorted matches.
fn resolve_target(files: &[String], guard: &RootGuard) -> Result<Target, OutcomeReason> {
    for candidate in files {
        let found = if is_glob(candidate) {
            first_glob_match(candidate, guard)?
        } else {
            let path = guard.root().join(candidate);
            path.is_file().then_some(path)
        };

        if let Some(path) = found {
            let canonical = guard
                .validate_path(&path)
                .map_err(|e| OutcomeReason::UnsafePath {
                    message: e.to_string(),
                })?;
            let display = canonical
                .strip_prefix(guard.root())
                .unwrap_or(&canonical)
                .to_path_buf();
            let shown = display.display();
            tracing::debug!(target = %shown, "resolved target");
            return Ok(Target {
                path: canonical,
                display,
            });
        }
    }

    Err(OutcomeReason::TargetMissing {
        candidates: files.to_vec(),
    })
}

fn first_glob_match(pattern: &str, guard: &RootGuard) -> Result<Option<PathBuf>, OutcomeReason> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| OutcomeReason::InvalidPattern {
            message: format!("files glob '{pattern}': {e}"),
        })?
        .compile_matcher();

    let root = guard.root();
    let mut hits: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !guard.is_protected(entry.path()))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .is_ok_and(|rel| matcher.is_match(rel))
        })
        .map(|entry| entry.into_path())
        .collect();
    hits.sort();

    Ok(hits.into_iter().next())
}
