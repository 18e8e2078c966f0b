//! Console rendering of outcomes.

use crate::orchestrator::Reporter;
use crate::unit::{OutcomeReason, PatchOutcome, UnitStatus};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::path::Path;

/// Streams one line per unit as it finishes, then a tri-count summary.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    dry_run: bool,
    show_diff: bool,
    applied: usize,
    skipped: usize,
    failed: usize,
}

impl ConsoleReporter {
    pub fn new(dry_run: bool, show_diff: bool) -> Self {
        Self {
            dry_run,
            show_diff,
            ..Self::default()
        }
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn print_summary(&self) {
        println!("{}", "Summary:".bold());
        println!("  {} applied", format!("{}", self.applied).green());
        println!("  {} skipped", format!("{}", self.skipped).yellow());
        println!("  {} failed", format!("{}", self.failed).red());
    }
}

impl Reporter for ConsoleReporter {
    fn phase_started(&mut self, phase: &str, units: usize) {
        println!("Phase {} ({} units)", phase.bold(), units);
        if self.dry_run {
            println!("{}", "  [DRY RUN - nothing is written]".cyan());
        }
    }

    fn unit_finished(&mut self, outcome: &PatchOutcome) {
        match outcome.status() {
            UnitStatus::Applied => {
                self.applied += 1;
                let verb = if self.dry_run { "would apply" } else { "ok" };
                println!(
                    "{} {}: {} - {}",
                    "✓".green(),
                    outcome.id,
                    verb,
                    outcome.reason
                );
                if self.show_diff {
                    if let Some(change) = &outcome.change {
                        if change.before != change.after {
                            display_diff(&change.path, &change.before, &change.after);
                        }
                    }
                }
            }
            UnitStatus::Skipped => {
                self.skipped += 1;
                println!("{} {}: {}", "⊙".yellow(), outcome.id, outcome.reason);
            }
            UnitStatus::Failed => {
                self.failed += 1;
                eprintln!("{} {}: {}", "✗".red(), outcome.id, outcome.reason);
            }
        }
    }
}

/// Print a unified-style diff between two versions of a file.
pub fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for group in diff.grouped_ops(2) {
        for op in group {
            for change in diff.iter_changes(&op) {
                let line = match change.tag() {
                    ChangeTag::Delete => format!("-{change}").red(),
                    ChangeTag::Insert => format!("+{change}").green(),
                    ChangeTag::Equal => format!(" {change}").normal(),
                };
                print!("{line}");
                if change.missing_newline() {
                    println!();
                }
            }
        }
    }
}

/// Where a unit lands in the `status` view of a dry-run evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusGroup {
    /// Marker already present
    Applied,
    /// Would apply cleanly
    Pending,
    Skipped,
    /// Would fail if applied now
    Failing,
}

impl StatusGroup {
    pub fn of(reason: &OutcomeReason) -> Self {
        match reason {
            OutcomeReason::AlreadyApplied { .. } => StatusGroup::Applied,
            OutcomeReason::Applied { .. } => StatusGroup::Pending,
            other if other.status() == UnitStatus::Failed => StatusGroup::Failing,
            _ => StatusGroup::Skipped,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusGroup::Applied => "APPLIED",
            StatusGroup::Pending => "PENDING",
            StatusGroup::Skipped => "SKIPPED",
            StatusGroup::Failing => "FAILING",
        }
    }
}

/// Collects dry-run outcomes and prints them grouped.
#[derive(Debug, Default)]
pub struct StatusBoard {
    entries: Vec<(StatusGroup, String, String)>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, group: StatusGroup) -> usize {
        self.entries.iter().filter(|(g, _, _)| *g == group).count()
    }

    /// Units whose marker is missing: pending or failing.
    pub fn mismatches(&self) -> usize {
        self.count(StatusGroup::Pending) + self.count(StatusGroup::Failing)
    }

    pub fn print(&self) {
        for group in [
            StatusGroup::Applied,
            StatusGroup::Pending,
            StatusGroup::Skipped,
            StatusGroup::Failing,
        ] {
            let members: Vec<_> = self.entries.iter().filter(|(g, _, _)| *g == group).collect();
            if members.is_empty() {
                continue;
            }
            let (symbol, label) = match group {
                StatusGroup::Applied => ("✓".green(), group.label().green().bold()),
                StatusGroup::Pending => ("⊙".yellow(), group.label().yellow().bold()),
                StatusGroup::Skipped => ("⊘".cyan(), group.label().cyan().bold()),
                StatusGroup::Failing => ("✗".red(), group.label().red().bold()),
            };
            println!("{symbol} {label} ({} patches)", members.len());
            for (_, id, detail) in members {
                println!("  - {} ({})", id, detail.dimmed());
            }
            println!();
        }
    }
}

impl Reporter for StatusBoard {
    fn unit_finished(&mut self, outcome: &PatchOutcome) {
        self.entries.push((
            StatusGroup::of(&outcome.reason),
            outcome.id.clone(),
            outcome.reason.to_string(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_groups() {
        let applied = OutcomeReason::AlreadyApplied { file: None };
        let pending = OutcomeReason::Applied {
            file: Some(PathBuf::from("cli.js")),
            fallbacks: vec![],
        };
        let missing = OutcomeReason::TargetMissing {
            candidates: vec!["cli.js".to_string()],
        };
        let failing = OutcomeReason::VerifyFailed { file: None };

        assert_eq!(StatusGroup::of(&applied), StatusGroup::Applied);
        assert_eq!(StatusGroup::of(&pending), StatusGroup::Pending);
        assert_eq!(StatusGroup::of(&missing), StatusGroup::Skipped);
        assert_eq!(StatusGroup::of(&failing), StatusGroup::Failing);
    }

    #[test]
    fn test_board_counts_mismatches() {
        let mut board = StatusBoard::new();
        board.unit_finished(&PatchOutcome::new(
            "a",
            OutcomeReason::AlreadyApplied { file: None },
        ));
        board.unit_finished(&PatchOutcome::new(
            "b",
            OutcomeReason::Applied {
                file: None,
                fallbacks: vec![],
            },
        ));
        board.unit_finished(&PatchOutcome::new(
            "c",
            OutcomeReason::InvalidPattern {
                message: "bad".to_string(),
            },
        ));

        assert_eq!(board.count(StatusGroup::Applied), 1);
        assert_eq!(board.mismatches(), 2);
    }

    #[test]
    fn test_console_reporter_tallies() {
        colored::control::set_override(false);
        let mut reporter = ConsoleReporter::new(false, false);
        reporter.unit_finished(&PatchOutcome::new(
            "x",
            OutcomeReason::NoPatternMatch {
                file: PathBuf::from("cli.js"),
                edit: 1,
                alternatives: 3,
                hint: None,
            },
        ));
        assert_eq!(reporter.failed(), 1);
    }
}
