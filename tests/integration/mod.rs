//! Integration tests for the patch engine and the interceptor.
//!
//! Each test builds a throwaway target root with the files a catalog expects,
//! runs the orchestrator over it and inspects both the outcomes and the
//! resulting file content.

mod interceptor;
mod scenarios;
mod tls_probe;

use drift_patcher::{Catalog, OrchestrationRun, Orchestrator, PatchOutcome, RunMode};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A disposable target install.
pub struct TargetRoot {
    dir: TempDir,
}

impl TargetRoot {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn with_file(self, rel: &str, content: &str) -> Self {
        self.write(rel, content);
        self
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel)).unwrap()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Run `catalog` against `root`, collecting streamed outcome ids.
pub fn run(root: &Path, catalog: &Catalog, mode: RunMode) -> (OrchestrationRun, Vec<String>) {
    let mut streamed = Vec::new();
    let run = Orchestrator::new(root, catalog)
        .mode(mode)
        .capture_diffs(true)
        .run(&mut |o: &PatchOutcome| streamed.push(o.id.clone()))
        .unwrap();
    (run, streamed)
}

pub fn shipped_catalog(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("patches").join(name)
}
