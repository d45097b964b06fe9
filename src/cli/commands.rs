//! Command handlers for the CLI interface
//!
//! Each handler wires resolved configuration into the application layer:
//! `run` drives a full batch through the orchestrator while the console
//! display consumes progress events, and `config` manages the persisted
//! configuration file.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::models::{Item, ItemOutcome};
use crate::app::progress;
use crate::app::{
    read_links, write_links, BatchConfig, BatchOrchestrator, BatchReport, HfStore, YtDlpFetcher,
};
use crate::config::{self, FileConfig, Settings};
use crate::constants::files;
use crate::errors::{AppError, Result};

use super::args::{ConfigAction, ConfigArgs, GlobalArgs, RunArgs};
use super::display::{DisplayConfig, ProgressDisplay};

/// Handle the run command: fetch, upload and purge a batch of items
pub async fn handle_run(global: &GlobalArgs, args: RunArgs) -> Result<()> {
    let settings = resolve_settings(global, &args)?;
    settings.validate()?;

    let link_file = args
        .links_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(files::LINK_FILE));
    let from_link_file = args.urls.is_empty();
    let urls = if from_link_file {
        if !link_file.exists() {
            return Err(AppError::NoItems {
                link_file: link_file.display().to_string(),
            });
        }
        read_links(&link_file)?
    } else {
        args.urls.clone()
    };
    if urls.is_empty() {
        return Err(AppError::NoItems {
            link_file: link_file.display().to_string(),
        });
    }
    let items: Vec<Item> = urls
        .into_iter()
        .enumerate()
        .map(|(index, url)| Item::new(url, index))
        .collect();
    info!("{} item(s) queued, output kind {}", items.len(), settings.output_kind);

    std::fs::create_dir_all(&settings.download_dir)?;

    let fetcher = Arc::new(YtDlpFetcher::discover()?);
    let store = Arc::new(HfStore::new(&settings)?);
    let (events, mut receiver) = progress::channel();
    let orchestrator = BatchOrchestrator::new(
        settings,
        BatchConfig::default(),
        fetcher,
        store,
        events,
    );

    // Ctrl-C requests cooperative cancellation; the in-flight item finishes
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancellation requested, finishing the current item");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let worker = tokio::spawn(async move { orchestrator.run(items).await });

    let mut display = ProgressDisplay::new(DisplayConfig {
        enable_progress_bars: !global.quiet,
        ..Default::default()
    });
    display.run(&mut receiver).await;

    let report = worker
        .await
        .map_err(|e| AppError::generic(format!("batch task failed: {e}")))??;

    if from_link_file {
        rewrite_link_file(&link_file, &report);
    }
    print_report(&report);
    Ok(())
}

/// Keep only the items that did not complete, so a later run resumes
/// where this one left off
fn rewrite_link_file(link_file: &std::path::Path, report: &BatchReport) {
    let remaining: Vec<String> = report
        .outcomes
        .iter()
        .filter(|(_, outcome)| !matches!(outcome, ItemOutcome::Done | ItemOutcome::Skipped))
        .map(|(item, _)| item.url.clone())
        .collect();
    match write_links(link_file, &remaining) {
        Ok(()) => info!(
            "rewrote {} with {} remaining item(s)",
            link_file.display(),
            remaining.len()
        ),
        Err(e) => warn!("could not rewrite {}: {}", link_file.display(), e),
    }
}

fn print_report(report: &BatchReport) {
    for (item, outcome) in &report.outcomes {
        println!("{item}: {outcome}");
    }
    println!(
        "Totals: {} item(s): {} done, {} skipped, {} failed, {} cancelled",
        report.total(),
        report.done,
        report.skipped,
        report.failed,
        report.cancelled
    );
}

/// Handle configuration management commands
pub async fn handle_config(global: &GlobalArgs, args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Init { force } => {
            let path = config::default_config_path()
                .ok_or_else(|| AppError::generic("could not determine the user config directory"))?;
            if path.exists() && !force {
                println!(
                    "Configuration file already exists: {} (use --force to overwrite)",
                    path.display()
                );
                return Ok(());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, config::default_config_content())?;
            println!("Wrote configuration file: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let settings = resolve_settings(global, &RunArgs::default())?;
            println!("{}", settings.summary());
            Ok(())
        }
    }
}

/// Resolve settings from all four tiers, dropping a configured cookies
/// file that does not exist on disk
fn resolve_settings(global: &GlobalArgs, args: &RunArgs) -> Result<Settings> {
    let file = FileConfig::load(global.config.clone())?;
    let env = config::environment();
    let mut settings = config::resolve(&args.overrides(), &env, &file);

    if let Some(path) = settings.cookies.clone() {
        if !path.exists() {
            warn!(
                "cookies file {} not found, continuing without it",
                path.display()
            );
            settings.cookies = None;
        }
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::FailureKind;

    #[test]
    fn link_file_rewrite_keeps_unfinished_items() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("link.txt");

        let mut report = BatchReport::default();
        report.record(Item::new("https://a", 0), ItemOutcome::Done);
        report.record(
            Item::new("https://b", 1),
            ItemOutcome::Failed(FailureKind::Network),
        );
        report.record(Item::new("https://c", 2), ItemOutcome::Skipped);
        report.record(Item::new("https://d", 3), ItemOutcome::Cancelled);

        rewrite_link_file(&path, &report);
        let remaining = read_links(&path).unwrap();
        assert_eq!(remaining, vec!["https://b", "https://d"]);
    }
}
