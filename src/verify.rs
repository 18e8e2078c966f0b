//! Post-write verification.
//!
//! After a unit's edits land, the file is read back and the unit's marker
//! must be present. The same marker serves as the idempotency gate on the
//! next run, so a unit is only reported applied when that run would skip it.

use crate::config::Marker;
use crate::gate::{already_applied, GateError, GateTarget};
use crate::mutator::TargetStore;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("cannot re-read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Re-read `path` through `store` (when given) and check `marker`.
pub fn verify(
    store: &dyn TargetStore,
    root: &Path,
    path: Option<&Path>,
    marker: &Marker,
) -> Result<bool, VerifyError> {
    let text = match path {
        Some(path) if marker.reads_target() => {
            Some(store.read(path).map_err(|source| VerifyError::Read {
                path: path.to_path_buf(),
                source,
            })?)
        }
        _ => None,
    };

    let target = GateTarget {
        root,
        text: text.as_deref(),
    };
    Ok(already_applied(target, marker)?)
}
