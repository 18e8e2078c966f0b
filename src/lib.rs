//! Drift Patcher: keeps a catalog of small source patches applied to a
//! third-party application that changes from release to release.
//!
//! Each catalog entry (a *unit*) names candidate target files, one or more
//! edit steps with ordered fallback patterns, and a marker that proves the
//! unit's effect is present. Runs are idempotent, fail-open and report a
//! tri-state outcome per unit.
//!
//! # Architecture
//!
//! All file changes compile down to a single primitive: [`Edit`], a verified
//! byte-span replacement. Intelligence lives in locating the span (the
//! [`matcher`] module), not in applying it.
//!
//! # Safety
//!
//! - All edits verify expected before-text before applying
//! - Atomic file writes (tempfile + fsync + rename)
//! - Target root boundary enforcement
//! - Idempotency derived from file content, never from stored state
//!
//! # Example
//!
//! ```no_run
//! use drift_patcher::{load_from_path, Orchestrator};
//! use drift_patcher::unit::PatchOutcome;
//!
//! let catalog = load_from_path("patches/tls-probe.toml").unwrap();
//! let run = Orchestrator::new("/opt/app", &catalog)
//!     .run(&mut |o: &PatchOutcome| println!("{}: {}", o.id, o.reason))
//!     .unwrap();
//! std::process::exit(run.exit_code());
//! ```

pub mod backup;
pub mod cache;
pub mod config;
pub mod edit;
pub mod gate;
pub mod intercept;
pub mod matcher;
pub mod mutator;
pub mod orchestrator;
pub mod process;
pub mod report;
pub mod safety;
pub mod unit;
pub mod verify;

// Re-exports
pub use config::{
    load_from_path, load_from_str, matches_requirement, Catalog, ConfigError, PatchUnit,
    VersionError,
};
pub use edit::{Edit, EditError, EditResult, EditVerification};
pub use matcher::{find_match, MatchSpec, MatcherError};
pub use orchestrator::{OrchestrationRun, Orchestrator, OrchestratorError, Reporter, RunMode};
pub use safety::{RootGuard, SafetyError};
pub use unit::{OutcomeReason, PatchOutcome, UnitStatus};
