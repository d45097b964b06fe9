//! Batch orchestration: the transfer state machine over an item list
//!
//! One item is in flight at a time. Cross-item concurrency would buy
//! nothing here: courtesy rate limiting already caps effective speed, and
//! the sequential shape keeps the working directory diffing sound.
//! Cancellation is cooperative and checked between items only; an
//! in-flight fetch runs to completion once started.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Settings;
use crate::constants::{batch, detect};
use crate::errors::Result;

use super::fetcher::{FetchOptions, MediaFetcher};
use super::models::{BatchReport, FailureKind, Item, ItemOutcome};
use super::progress::{EventSender, Progress};
use super::store::ArtifactStore;
use super::transfer::{run_item, TransferContext};

/// Orchestrator timing knobs, separated from `Settings` so tests can
/// shrink the waits without touching resolved configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Batch-wide pause after a rate-limit signal
    pub rate_limit_cooldown: Duration,
    /// Settle time before the post-fetch snapshot
    pub detect_grace_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            rate_limit_cooldown: batch::RATE_LIMIT_COOLDOWN,
            detect_grace_delay: detect::GRACE_DELAY,
        }
    }
}

/// Sequences the transfer state machine over an ordered item list
pub struct BatchOrchestrator {
    settings: Settings,
    config: BatchConfig,
    fetcher: Arc<dyn MediaFetcher>,
    store: Arc<dyn ArtifactStore>,
    events: EventSender,
    cancel: Arc<AtomicBool>,
}

impl BatchOrchestrator {
    pub fn new(
        settings: Settings,
        config: BatchConfig,
        fetcher: Arc<dyn MediaFetcher>,
        store: Arc<dyn ArtifactStore>,
        events: EventSender,
    ) -> Self {
        Self {
            settings,
            config,
            fetcher,
            store,
            events,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag; setting it stops the batch cleanly between items
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run the batch to completion (normal, cancelled or exhausted).
    ///
    /// Item-scoped failures never unwind this loop; only a setup failure
    /// (the repository cannot be ensured) is propagated.
    pub async fn run(&self, items: Vec<Item>) -> Result<BatchReport> {
        self.store.ensure_repository().await?;

        let options = FetchOptions::from_settings(&self.settings);
        let total = items.len();
        let mut report = BatchReport::default();
        // "Already uploaded" keys are scoped to this run, not the process
        let mut uploaded: HashSet<std::path::PathBuf> = HashSet::new();

        for item in items {
            if self.cancel.load(Ordering::SeqCst) {
                info!("{item}: cancelled before start");
                self.finish_item(&mut report, item, ItemOutcome::Cancelled, total);
                continue;
            }

            self.events.emit(Progress::ItemStarted {
                index: item.index,
                total,
                url: item.url.clone(),
            });

            let ctx = TransferContext {
                settings: &self.settings,
                options: &options,
                fetcher: self.fetcher.as_ref(),
                store: self.store.as_ref(),
                events: &self.events,
                grace_delay: self.config.detect_grace_delay,
            };
            let outcome = run_item(&item, &ctx, &mut uploaded).await;

            let rate_limited = outcome == ItemOutcome::Failed(FailureKind::RateLimited);
            self.finish_item(&mut report, item, outcome, total);

            if rate_limited {
                // Cool the whole batch down; the failed item is not
                // retried within this run
                let seconds = self.config.rate_limit_cooldown.as_secs();
                warn!("rate limited; suspending batch for {seconds}s");
                self.events.emit(Progress::CooldownStarted { seconds });
                tokio::time::sleep(self.config.rate_limit_cooldown).await;
            }
        }

        self.events.emit(Progress::BatchDone {
            done: report.done,
            skipped: report.skipped,
            failed: report.failed,
            cancelled: report.cancelled,
        });
        info!(
            "batch finished: {} done, {} skipped, {} failed, {} cancelled",
            report.done, report.skipped, report.failed, report.cancelled
        );
        Ok(report)
    }

    fn finish_item(
        &self,
        report: &mut BatchReport,
        item: Item,
        outcome: ItemOutcome,
        total: usize,
    ) {
        let index = item.index;
        report.record(item, outcome);
        self.events.emit(Progress::ItemFinished { index, outcome });
        // Cancelled items never ran, so they do not advance the bar
        if outcome != ItemOutcome::Cancelled {
            self.events.emit(Progress::OverallProgress {
                fraction: round2(report.completed() as f64 / total as f64),
            });
        }
    }
}

/// Round a fraction to two decimal places for display arithmetic
fn round2(fraction: f64) -> f64 {
    (fraction * 100.0).round() / 100.0
}
