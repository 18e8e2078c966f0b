use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use drift_patcher::config::{discover, load_from_path, Catalog};
use drift_patcher::mutator::{DiskStore, ShadowStore, TargetStore};
use drift_patcher::orchestrator::{exit_code, OrchestrationRun, Orchestrator, RunMode};
use drift_patcher::report::{ConsoleReporter, StatusBoard, StatusGroup};
use drift_patcher::safety::expand_home;
use drift_patcher::unit::PatchOutcome;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const CATALOG_ENV: &str = "DRIFT_PATCHER_CATALOG";
const DEFAULT_CATALOG_DIR: &str = "patches";

#[derive(Parser)]
#[command(name = "drift-patcher")]
#[command(about = "Keep a catalog of source patches applied to a drifting third-party install", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Selection {
    /// Catalog file or directory of catalogs (default: $DRIFT_PATCHER_CATALOG, then ./patches)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Only run the named phase
    #[arg(short, long)]
    phase: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patches to a target root
    Apply {
        /// Root directory of the target install
        root: PathBuf,

        #[command(flatten)]
        selection: Selection,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Show which patches are applied, pending, skipped or failing
    Status {
        root: PathBuf,

        #[command(flatten)]
        selection: Selection,
    },

    /// Verify every applicable patch is present
    Verify {
        root: PathBuf,

        #[command(flatten)]
        selection: Selection,
    },

    /// List patches and their version constraints
    List {
        #[command(flatten)]
        selection: Selection,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Apply {
            root,
            selection,
            dry_run,
            diff,
        } => cmd_apply(&root, &selection, dry_run, diff)?,
        Commands::Status { root, selection } => cmd_status(&root, &selection)?,
        Commands::Verify { root, selection } => cmd_verify(&root, &selection)?,
        Commands::List { selection } => cmd_list(&selection)?,
    };

    std::process::exit(code)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Catalog location: explicit flag, then the environment, then ./patches.
fn catalog_location(selection: &Selection) -> PathBuf {
    if let Some(path) = &selection.catalog {
        return expand_home(path);
    }
    if let Ok(path) = env::var(CATALOG_ENV) {
        if !path.trim().is_empty() {
            return expand_home(Path::new(&path));
        }
    }
    PathBuf::from(DEFAULT_CATALOG_DIR)
}

fn load_catalogs(selection: &Selection) -> Result<Vec<Catalog>> {
    let location = catalog_location(selection);
    let files = discover(&location)?;

    let mut catalogs = Vec::with_capacity(files.len());
    for file in files {
        catalogs.push(load_from_path(&file)?);
    }

    if let Some(phase) = &selection.phase {
        catalogs.retain(|c| c.phase() == phase);
        if catalogs.is_empty() {
            anyhow::bail!("no catalog in {} has phase '{}'", location.display(), phase);
        }
    }

    Ok(catalogs)
}

/// Store shared by every phase of one invocation, so a dry run of phase N
/// sees the edits phases before it would have made.
fn store_for(mode: RunMode) -> Box<dyn TargetStore> {
    match mode {
        RunMode::Apply => Box::new(DiskStore),
        RunMode::Check => Box::new(ShadowStore::new()),
    }
}

fn run_phase(
    root: &Path,
    catalog: &Catalog,
    mode: RunMode,
    capture_diffs: bool,
    store: &mut dyn TargetStore,
    reporter: &mut dyn drift_patcher::Reporter,
) -> Option<OrchestrationRun> {
    match Orchestrator::new(root, catalog)
        .mode(mode)
        .capture_diffs(capture_diffs)
        .run_with(store, reporter)
    {
        Ok(run) => Some(run),
        Err(e) => {
            eprintln!("{} phase {}: {}", "✗".red(), catalog.phase(), e);
            None
        }
    }
}

fn cmd_apply(root: &Path, selection: &Selection, dry_run: bool, show_diff: bool) -> Result<i32> {
    let root = expand_home(root);
    let catalogs = load_catalogs(selection)?;
    let mode = if dry_run { RunMode::Check } else { RunMode::Apply };

    println!("Target: {}", root.display());
    println!();

    let mut reporter = ConsoleReporter::new(dry_run, show_diff);
    let mut store = store_for(mode);
    let mut aborted_phases = 0;

    for catalog in &catalogs {
        let run = run_phase(
            &root,
            catalog,
            mode,
            show_diff,
            store.as_mut(),
            &mut reporter,
        );
        if run.is_none() {
            aborted_phases += 1;
        }
        println!();
    }

    reporter.print_summary();
    Ok(exit_code(reporter.failed() + aborted_phases))
}

fn cmd_status(root: &Path, selection: &Selection) -> Result<i32> {
    let root = expand_home(root);
    let catalogs = load_catalogs(selection)?;

    println!("{}", "Patch Status Report".bold());
    println!("Target: {}", root.display());
    println!();

    let mut board = StatusBoard::new();
    let mut store = ShadowStore::new();
    for catalog in &catalogs {
        run_phase(&root, catalog, RunMode::Check, false, &mut store, &mut board);
    }
    board.print();

    Ok(0)
}

fn cmd_verify(root: &Path, selection: &Selection) -> Result<i32> {
    let root = expand_home(root);
    let catalogs = load_catalogs(selection)?;

    println!("{}", "Verifying patches...".bold());
    println!("Target: {}", root.display());
    println!();

    let mut verified = 0;
    let mut mismatch = 0;
    let mut skipped = 0;
    let mut store = ShadowStore::new();

    for catalog in &catalogs {
        let mut tally = |outcome: &PatchOutcome| match StatusGroup::of(&outcome.reason) {
            StatusGroup::Applied => {
                println!("{} {}: Verified", "✓".green(), outcome.id);
                verified += 1;
            }
            StatusGroup::Pending => {
                eprintln!("{} {}: MISMATCH", "✗".red(), outcome.id);
                eprintln!("  Expected: patch already applied");
                eprintln!("  Found: patch not yet applied");
                mismatch += 1;
            }
            StatusGroup::Failing => {
                eprintln!("{} {}: MISMATCH", "✗".red(), outcome.id);
                eprintln!("  Error: {}", outcome.reason);
                mismatch += 1;
            }
            StatusGroup::Skipped => {
                println!("{} {}: {}", "⊘".cyan(), outcome.id, outcome.reason);
                skipped += 1;
            }
        };
        let run = run_phase(&root, catalog, RunMode::Check, false, &mut store, &mut tally);
        if run.is_none() {
            mismatch += 1;
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} verified", format!("{}", verified).green());
    println!("  {} mismatch", format!("{}", mismatch).red());
    println!("  {} skipped", format!("{}", skipped).cyan());

    Ok(exit_code(mismatch))
}

fn cmd_list(selection: &Selection) -> Result<i32> {
    let catalogs = load_catalogs(selection)?;

    for catalog in &catalogs {
        let source = catalog
            .source
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("{} {}", catalog.phase().bold(), source.dimmed());
        if let Some(range) = &catalog.meta.version_range {
            println!("  versions: {range}");
        }

        for unit in &catalog.patches {
            let range = unit
                .version_range
                .as_deref()
                .map(|r| format!(" [{r}]"))
                .unwrap_or_default();
            println!("  - {}{}", unit.id.bold(), range.cyan());
            if let Some(description) = &unit.description {
                println!("      {description}");
            }
            if !unit.files.is_empty() {
                println!("      files: {}", unit.files.join(", ").dimmed());
            }
            if let Some(command) = &unit.command {
                println!("      runs: {}", command.display().dimmed());
            }
            if !unit.requires.is_empty() {
                println!("      requires: {}", unit.requires.join(", "));
            }
        }
        println!();
    }

    Ok(0)
}

