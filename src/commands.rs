//! CLI command handlers.
//!
//! Each handler connects, runs one operation through the library and
//! prints the result. Failures are returned to `main`, which owns the exit
//! code.

use anyhow::{Context, Result, bail};
use colored::*;

use crate::cli::{Commands, OutputFormat};
use crate::config::Config;
use crate::error::Error;
use crate::migrator::{Migrator, Outcome};
use crate::output;
use crate::state::ReconciledState;
use crate::store::{EventStore, PgStore};

/// Run a parsed command against the configured database.
pub async fn execute(command: Commands, config: &Config, format: OutputFormat) -> Result<()> {
    let mut store = PgStore::connect(&config.connection, &config.schema, config.ssl)
        .await
        .context("Failed to connect to the database")?;

    match command {
        Commands::Migrate { napply } => migrate(store, config, napply).await,
        Commands::Undo { nundo } => undo(store, config, nundo).await,
        Commands::Baseline { filename } => baseline(store, config, filename.as_deref()).await,
        Commands::Info => info(store, config, format, true).await,
        Commands::Status => info(store, config, format, false).await,
        Commands::Validate => validate(store, config).await,
        Commands::Audit => audit(&mut store, format).await,
        Commands::GetAppliedScript { filename } => get_applied_script(store, config, &filename).await,
        Commands::Drop => {
            print!("Dropping the tables, schema and migration history table... ");
            store.drop_all().await?;
            println!("{}", "done!".green());
            Ok(())
        }
    }
}

async fn migrate(mut store: PgStore, config: &Config, napply: Option<usize>) -> Result<()> {
    store.ensure_initialised().await?;
    let mut migrator = Migrator::new(store, &config.path);
    let outcome = abort_if_invalid(migrator.migrate(napply).await)?;

    if outcome.plan.is_empty() {
        let state = outcome.state?;
        match output::empty_catalog_warning(&state, &config.path) {
            Some(warning) => println!("{} {}", "Warning:".yellow().bold(), warning),
            None if state.is_up_to_date() => {
                println!("{}", output::nothing_applied_message(&state).green())
            }
            None => println!("{}", output::nothing_applied_message(&state).yellow()),
        }
        return Ok(());
    }
    finish(outcome, "Applied")
}

async fn undo(store: PgStore, config: &Config, nundo: usize) -> Result<()> {
    let mut migrator = Migrator::new(store, &config.path);
    let outcome = abort_if_invalid(migrator.undo(nundo).await)?;
    finish(outcome, "Performed undo of")
}

async fn baseline(mut store: PgStore, config: &Config, target: Option<&str>) -> Result<()> {
    store.ensure_initialised().await?;
    let mut migrator = Migrator::new(store, &config.path);
    let outcome = abort_if_invalid(migrator.baseline(target).await)?;

    let target = outcome.plan.items.last().map(|item| item.filename().to_string());
    finish(outcome, "(Shadow)-applied")?;
    if let Some(target) = target {
        println!("Baselined to {}", target.yellow());
    }
    Ok(())
}

/// Show reconciliation errors in full before aborting on them.
fn abort_if_invalid(result: crate::Result<Outcome>) -> Result<Outcome> {
    match result {
        Err(Error::InvalidState(errors)) => {
            output::print_state_errors(&errors, true);
            bail!("Migration history is in a bad state, aborting.")
        }
        other => Ok(other?),
    }
}

/// Print the summary and the refreshed state; fail if the run stopped
/// early or the state could not be read back.
fn finish(outcome: Outcome, verb: &str) -> Result<()> {
    output::print_outcome(&outcome, verb);
    println!();
    match &outcome.state {
        Ok(state) => output::print_history_and_unapplied(state),
        Err(e) => println!(
            "{} could not reload the migration history: {}",
            "Warning:".yellow().bold(),
            e
        ),
    }

    if let Some(failure) = outcome.report.failure {
        return Err(failure.error).with_context(|| format!("Migration {} failed", failure.filename));
    }
    outcome.state.context("Failed to reload migration state")?;
    Ok(())
}

fn warn_if_empty(state: &ReconciledState, config: &Config) {
    if let Some(warning) = output::empty_catalog_warning(state, &config.path) {
        println!("{} {}", "Warning:".yellow().bold(), warning);
    }
}

/// Report a missing schema or table instead of failing. Returns whether
/// the history can be read.
async fn check_initialised(store: &mut PgStore) -> Result<bool> {
    let schema_exists = store.schema_exists().await?;
    if !schema_exists {
        println!("Schema {} does not exist", store.schema().yellow());
        return Ok(false);
    }
    if !store.table_exists().await? {
        println!("Migration table has not been initialised. Run migrate to begin.");
        return Ok(false);
    }
    Ok(true)
}

async fn info(
    mut store: PgStore,
    config: &Config,
    format: OutputFormat,
    include_unapplied: bool,
) -> Result<()> {
    if !check_initialised(&mut store).await? {
        return Ok(());
    }
    let state = Migrator::new(store, &config.path).load_state().await?;

    match format {
        OutputFormat::Json => println!("{}", output::state_json(&state, include_unapplied)?),
        OutputFormat::Text => {
            warn_if_empty(&state, config);
            output::print_state_errors(&state.errors, false);
            if include_unapplied {
                output::print_history_and_unapplied(&state);
            } else {
                output::print_history(&state);
            }
        }
    }
    Ok(())
}

async fn validate(mut store: PgStore, config: &Config) -> Result<()> {
    if !check_initialised(&mut store).await? {
        bail!("Nothing to validate");
    }
    let state = Migrator::new(store, &config.path).load_state().await?;
    warn_if_empty(&state, config);

    if !state.is_valid() {
        output::print_state_errors(&state.errors, true);
        state.ensure_valid()?;
    }
    println!("{}", "✓ Validation passed".green().bold());
    println!();
    output::print_history_and_unapplied(&state);
    Ok(())
}

async fn audit(store: &mut PgStore, format: OutputFormat) -> Result<()> {
    if !check_initialised(store).await? {
        return Ok(());
    }
    let events = store.read_all().await?;
    match format {
        OutputFormat::Json => println!("{}", output::events_json(&events)?),
        OutputFormat::Text => output::print_events(&events),
    }
    Ok(())
}

async fn get_applied_script(mut store: PgStore, config: &Config, filename: &str) -> Result<()> {
    if !check_initialised(&mut store).await? {
        return Ok(());
    }
    let state = Migrator::new(store, &config.path).load_state().await?;

    match state.applied.script_for(filename) {
        Some(script) => println!("{}", script),
        None => bail!(
            "Script for {} not found, use the audit command to check all applied migrations",
            filename
        ),
    }
    Ok(())
}
