//! Console rendering for the CLI.

use colored::*;
use serde::Serialize;
use std::path::Path;

use crate::error::StateError;
use crate::migrator::Outcome;
use crate::model::{Event, MigrationScript};
use crate::state::ReconciledState;

/// Column-aligned plain text table.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.to_vec())];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

fn event_rows<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<Vec<String>> {
    events
        .into_iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                e.kind.to_string(),
                e.filename.clone(),
                e.applied_by.clone(),
                e.applied_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect()
}

const EVENT_HEADERS: [&str; 5] = ["id", "type", "filename", "applied_by", "applied_at"];

/// Applied migrations, versioned first.
pub fn print_history(state: &ReconciledState) {
    println!("{}", "Migration history:".cyan().bold());
    let applied = state.applied.versioned.iter().chain(state.applied.repeatable.iter());
    let rows = event_rows(applied);
    if rows.is_empty() {
        println!("  {} No migrations applied yet", "○".dimmed());
    } else {
        println!("{}", render_table(&EVENT_HEADERS, &rows));
    }
}

pub fn print_unapplied(state: &ReconciledState) {
    println!("{}", "Unapplied migrations:".cyan().bold());
    let pending: Vec<&MigrationScript> = state
        .unapplied_versioned
        .iter()
        .chain(state.unapplied_repeatable.iter())
        .collect();
    if pending.is_empty() {
        println!("  {} None", "✓".green());
    }
    for script in pending {
        println!("  {} {} ({})", "→".cyan(), script.filename.yellow(), script.kind);
    }
    for filename in &state.orphaned_repeatable {
        println!(
            "  {} {} was applied but is no longer on disk",
            "!".yellow(),
            filename.yellow()
        );
    }
}

pub fn print_history_and_unapplied(state: &ReconciledState) {
    print_history(state);
    println!();
    print_unapplied(state);
}

/// Warning for a migration directory without any scripts, which is
/// usually a mistyped path.
pub fn empty_catalog_warning(state: &ReconciledState, directory: &Path) -> Option<String> {
    state
        .catalog
        .is_empty()
        .then(|| format!("No migration files found in {}", directory.display()))
}

/// Message for a migrate run that applied nothing.
pub fn nothing_applied_message(state: &ReconciledState) -> String {
    if state.is_up_to_date() {
        return "All migrations are already applied".to_string();
    }
    let pending = state.unapplied_versioned.len() + state.unapplied_repeatable.len();
    format!(
        "Nothing applied, {} {} still pending",
        pending,
        if pending == 1 { "migration" } else { "migrations" }
    )
}

/// Full raw history, including undone and superseded events.
pub fn print_events(events: &[Event]) {
    println!("{}", "Event history:".cyan().bold());
    println!("{}", render_table(&EVENT_HEADERS, &event_rows(events)));
}

/// Reconciliation problems, with drift diffs coloured.
pub fn print_state_errors(errors: &[StateError], fatal: bool) {
    let label = if fatal { "Error:".red().bold() } else { "Warning:".yellow().bold() };
    for error in errors {
        match error {
            StateError::Drift { filename, diff } => {
                println!(
                    "{} migration {} has been modified since it was applied",
                    label,
                    filename.yellow()
                );
                for line in diff.lines() {
                    if line.starts_with("- ") {
                        println!("    {}", line.red());
                    } else if line.starts_with("+ ") {
                        println!("    {}", line.green());
                    } else {
                        println!("    {}", line.dimmed());
                    }
                }
            }
            other => println!("{} {}", label, other),
        }
    }
}

/// Summary of a mutating command.
pub fn print_outcome(outcome: &Outcome, verb: &str) {
    let applied = outcome.applied();
    let planned = outcome.plan.len();
    let noun = if applied == 1 { "migration" } else { "migrations" };

    for (event, item) in outcome.report.committed.iter().zip(outcome.plan.iter()) {
        match &item.reverts {
            Some(reverted) => println!(
                "  {} {} (reverts {})",
                "✓".green(),
                event.filename,
                reverted.dimmed()
            ),
            None => println!("  {} {}", "✓".green(), event.filename),
        }
    }

    match &outcome.report.failure {
        None => println!(
            "{}",
            format!("All done! {} {} {}", verb, applied, noun).green().bold()
        ),
        Some(failure) => {
            println!("  {} {}", "✗".red(), failure.filename);
            println!(
                "{}",
                format!(
                    "Stopped after {} of {} {}: {} failed and was rolled back",
                    applied,
                    planned,
                    if planned == 1 { "migration" } else { "migrations" },
                    failure.filename
                )
                .red()
                .bold()
            );
        }
    }
}

#[derive(Serialize)]
struct StateReport<'a> {
    applied_versioned: &'a [Event],
    applied_repeatable: &'a [Event],
    unapplied_versioned: &'a [MigrationScript],
    unapplied_repeatable: &'a [MigrationScript],
    orphaned_repeatable: &'a [String],
    errors: Vec<String>,
}

pub fn state_json(state: &ReconciledState, include_unapplied: bool) -> serde_json::Result<String> {
    let report = StateReport {
        applied_versioned: &state.applied.versioned,
        applied_repeatable: &state.applied.repeatable,
        unapplied_versioned: if include_unapplied { &state.unapplied_versioned } else { &[] },
        unapplied_repeatable: if include_unapplied { &state.unapplied_repeatable } else { &[] },
        orphaned_repeatable: &state.orphaned_repeatable,
        errors: state.errors.iter().map(ToString::to_string).collect(),
    };
    serde_json::to_string_pretty(&report)
}

pub fn events_json(events: &[Event]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(events)
}
