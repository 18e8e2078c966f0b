//! Runs a catalog's units in order against one target root.
//!
//! The run is fail-open: a failed unit is recorded and the next one starts
//! anyway. Outcomes are streamed to a [`Reporter`] as each unit finishes, and
//! the process exit status is the number of failures.

use crate::backup::BackupStore;
use crate::config::{detect_version, Catalog, Precondition};
use crate::mutator::{DiskStore, ShadowStore, TargetStore};
use crate::safety::{RootGuard, SafetyError};
use crate::unit::{run_unit, OutcomeReason, PatchOutcome, UnitContext, UnitStatus};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest value an exit status can carry.
const MAX_EXIT_CODE: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Write changes to disk
    #[default]
    Apply,
    /// Evaluate against an in-memory overlay; nothing is written and
    /// external commands are not run
    Check,
}

/// Receives outcomes as they happen.
pub trait Reporter {
    fn phase_started(&mut self, _phase: &str, _units: usize) {}

    fn unit_finished(&mut self, outcome: &PatchOutcome);
}

impl<F> Reporter for F
where
    F: FnMut(&PatchOutcome),
{
    fn unit_finished(&mut self, outcome: &PatchOutcome) {
        self(outcome)
    }
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("target root {} is not writable: {source}", .root.display())]
    RootNotWritable { root: PathBuf, source: io::Error },

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

/// Ordered outcomes of one phase.
#[derive(Debug, Clone, Default)]
pub struct OrchestrationRun {
    pub phase: String,
    pub outcomes: Vec<PatchOutcome>,
}

impl OrchestrationRun {
    pub fn count(&self, status: UnitStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status() == status)
            .count()
    }

    pub fn applied(&self) -> usize {
        self.count(UnitStatus::Applied)
    }

    pub fn skipped(&self) -> usize {
        self.count(UnitStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(UnitStatus::Failed)
    }

    pub fn exit_code(&self) -> i32 {
        exit_code(self.failed())
    }
}

/// Exit status for `failed` failures, clamped to what the OS can report.
pub fn exit_code(failed: usize) -> i32 {
    failed.min(MAX_EXIT_CODE) as i32
}

pub struct Orchestrator<'c> {
    root: PathBuf,
    catalog: &'c Catalog,
    mode: RunMode,
    capture_diffs: bool,
}

impl<'c> Orchestrator<'c> {
    pub fn new(root: impl Into<PathBuf>, catalog: &'c Catalog) -> Self {
        Self {
            root: root.into(),
            catalog,
            mode: RunMode::Apply,
            capture_diffs: false,
        }
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Keep before/after content of applied units for diff display.
    pub fn capture_diffs(mut self, capture: bool) -> Self {
        self.capture_diffs = capture;
        self
    }

    /// Run every unit in catalog order against a store chosen by the mode.
    ///
    /// Only a failed catalog precondition aborts the phase; everything that
    /// goes wrong inside a unit becomes that unit's outcome.
    pub fn run(&self, reporter: &mut dyn Reporter) -> Result<OrchestrationRun, OrchestratorError> {
        let mut store: Box<dyn TargetStore> = match self.mode {
            RunMode::Apply => Box::new(DiskStore),
            RunMode::Check => Box::new(ShadowStore::new()),
        };
        self.run_with(store.as_mut(), reporter)
    }

    /// Like [`Orchestrator::run`], but against a caller-owned store.
    ///
    /// Passing the same [`ShadowStore`] to every phase of a dry run lets
    /// later phases see the edits earlier phases would have made.
    pub fn run_with(
        &self,
        store: &mut dyn TargetStore,
        reporter: &mut dyn Reporter,
    ) -> Result<OrchestrationRun, OrchestratorError> {
        let phase = self.catalog.phase().to_string();
        let _span = tracing::info_span!("phase", %phase).entered();
        reporter.phase_started(&phase, self.catalog.patches.len());

        let mut run = OrchestrationRun {
            phase,
            outcomes: Vec::with_capacity(self.catalog.patches.len()),
        };

        if !self.root.is_dir() {
            tracing::warn!(root = %self.root.display(), "target root not found; skipping phase");
            for unit in &self.catalog.patches {
                let outcome = PatchOutcome::new(
                    &unit.id,
                    OutcomeReason::TargetMissing {
                        candidates: Vec::new(),
                    },
                );
                reporter.unit_finished(&outcome);
                run.outcomes.push(outcome);
            }
            return Ok(run);
        }

        if self.mode == RunMode::Apply {
            self.check_precondition()?;
        }

        let meta = &self.catalog.meta;
        let mut protected = meta.protected.clone();
        protected.push(self.catalog.backup_dir().to_string());
        let guard = RootGuard::new(&self.root, &protected)?;
        let backups = BackupStore::new(guard.root(), self.catalog.backup_dir());

        let version = meta
            .version_file
            .as_deref()
            .and_then(|file| match detect_version(guard.root(), file) {
                Ok(version) => {
                    tracing::debug!(%version, file, "detected target version");
                    Some(version)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not determine target version");
                    None
                }
            });

        let ctx = UnitContext {
            guard: &guard,
            version: version.as_deref(),
            catalog_range: meta.version_range.as_deref(),
            backups: &backups,
            backup_by_default: meta.backup,
            capture_diffs: self.capture_diffs,
        };

        for unit in &self.catalog.patches {
            let outcome = run_unit(unit, &ctx, store, &run.outcomes);
            reporter.unit_finished(&outcome);
            run.outcomes.push(outcome);
        }

        tracing::info!(
            applied = run.applied(),
            skipped = run.skipped(),
            failed = run.failed(),
            "phase finished"
        );

        Ok(run)
    }

    fn check_precondition(&self) -> Result<(), OrchestratorError> {
        match self.catalog.meta.precondition {
            Some(Precondition::WritableRoot) => probe_writable(&self.root),
            None => Ok(()),
        }
    }
}

fn probe_writable(root: &Path) -> Result<(), OrchestratorError> {
    tempfile::tempfile_in(root)
        .map(drop)
        .map_err(|source| OrchestratorError::RootNotWritable {
            root: root.to_path_buf(),
            source,
        })
}
