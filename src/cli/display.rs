//! Console progress rendering for batch runs
//!
//! Consumes the typed event stream produced by the orchestrator and
//! renders two indicatif bars: overall batch completion and the current
//! item's fetch progress. Events are applied idempotently, so a later
//! overall-progress value always supersedes an earlier one. When stderr
//! is not a terminal the display falls back to plain line output.

use std::time::Duration;

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use tracing::debug;

use crate::app::models::TransferState;
use crate::app::progress::{EventReceiver, Progress};
use crate::constants::progress as progress_consts;

const OVERALL_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}";
const ITEM_TEMPLATE: &str = "  [{bar:40.green/dim}] {pos}% {msg}";
const MAX_URL_WIDTH: usize = 48;

/// Configuration for the console display
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    /// Enable visual progress bars (disabled in quiet mode)
    pub enable_progress_bars: bool,
    /// How often pending events are coalesced into one redraw
    pub update_interval: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            update_interval: progress_consts::POLL_INTERVAL,
        }
    }
}

/// Renders batch progress on the console until the batch finishes
pub struct ProgressDisplay {
    config: DisplayConfig,
    is_terminal: bool,
    multi: Option<MultiProgress>,
    overall: Option<ProgressBar>,
    item: Option<ProgressBar>,
    current_url: String,
}

impl ProgressDisplay {
    pub fn new(config: DisplayConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        Self {
            config,
            is_terminal,
            multi: None,
            overall: None,
            item: None,
            current_url: String::new(),
        }
    }

    fn bars_enabled(&self) -> bool {
        self.config.enable_progress_bars && self.is_terminal
    }

    /// Consume events until the batch reports completion or every
    /// producer is gone. Pending events are coalesced per update tick.
    pub async fn run(&mut self, receiver: &mut EventReceiver) {
        self.start();
        loop {
            let Some(first) = receiver.recv().await else {
                break;
            };
            let mut finished = self.apply(&first.progress);
            tokio::time::sleep(self.config.update_interval).await;
            for event in receiver.drain() {
                finished |= self.apply(&event.progress);
            }
            if finished {
                break;
            }
        }
        self.finish();
    }

    fn start(&mut self) {
        if !self.bars_enabled() {
            return;
        }
        let multi = MultiProgress::new();

        let overall = multi.add(ProgressBar::new(100));
        overall.set_style(bar_style(OVERALL_TEMPLATE));
        overall.set_message("starting");
        overall.enable_steady_tick(Duration::from_millis(120));

        let item = multi.add(ProgressBar::new(100));
        item.set_style(bar_style(ITEM_TEMPLATE));

        self.multi = Some(multi);
        self.overall = Some(overall);
        self.item = Some(item);
        debug!("progress display started");
    }

    /// Apply one event; returns true once the batch is done
    fn apply(&mut self, progress: &Progress) -> bool {
        match progress {
            Progress::ItemStarted { index, total, url } => {
                self.current_url = truncate(url, MAX_URL_WIDTH);
                let line = format!("[{}/{}] {}", index + 1, total, self.current_url);
                if let Some(item) = &self.item {
                    item.set_position(0);
                    item.set_message(format!("{} (fetching)", self.current_url));
                    if let Some(overall) = &self.overall {
                        overall.set_message(line);
                    }
                } else {
                    self.println(&line);
                }
            }
            Progress::StateChanged { state, .. } => {
                if let Some(item) = &self.item {
                    item.set_message(format!("{} ({})", self.current_url, state));
                    if matches!(*state, TransferState::Uploading | TransferState::Purging) {
                        item.set_position(100);
                    }
                }
            }
            Progress::FetchProgress { percent, speed, .. } => {
                if let Some(item) = &self.item {
                    item.set_position(percent.round() as u64);
                    let rate = speed
                        .map(|s| format!(" {}/s", HumanBytes(s as u64)))
                        .unwrap_or_default();
                    item.set_message(format!("{} (fetching{rate})", self.current_url));
                }
            }
            Progress::Converting { .. } => {
                if let Some(item) = &self.item {
                    item.set_message(format!("{} (converting)", self.current_url));
                }
            }
            Progress::ArtifactUploaded { remote_url, .. } => {
                self.println(&format!("Uploaded: {remote_url}"));
            }
            Progress::ItemFinished { index, outcome } => {
                if self.item.is_none() {
                    self.println(&format!("[{}] {}", index + 1, outcome));
                }
            }
            Progress::OverallProgress { fraction } => {
                if let Some(overall) = &self.overall {
                    overall.set_position((fraction * 100.0).round() as u64);
                }
            }
            Progress::CooldownStarted { seconds } => {
                self.println(&format!(
                    "Rate limited; pausing for {} before the next item",
                    human_duration(*seconds)
                ));
            }
            Progress::Warning { message } => {
                self.println(&format!("Warning: {message}"));
            }
            Progress::Error { index, message } => {
                self.println(&format!("[{}] error: {}", index + 1, message));
            }
            Progress::BatchDone {
                done,
                skipped,
                failed,
                cancelled,
            } => {
                self.println(&format!(
                    "Batch finished: {done} done, {skipped} skipped, {failed} failed, {cancelled} cancelled"
                ));
                return true;
            }
        }
        false
    }

    /// Print a line without garbling active bars
    fn println(&self, line: &str) {
        match &self.multi {
            Some(multi) => {
                // Suspend keeps bar redraws from interleaving with the line
                multi.suspend(|| eprintln!("{line}"));
            }
            None => eprintln!("{line}"),
        }
    }

    fn finish(&mut self) {
        if let Some(item) = self.item.take() {
            item.finish_and_clear();
        }
        if let Some(overall) = self.overall.take() {
            overall.finish_and_clear();
        }
        self.multi = None;
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

fn human_duration(seconds: u64) -> String {
    if seconds % 60 == 0 && seconds >= 60 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::progress;

    #[test]
    fn truncate_preserves_short_urls() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("0123456789", 8), "01234...");
    }

    #[test]
    fn human_duration_prefers_minutes() {
        assert_eq!(human_duration(300), "5m");
        assert_eq!(human_duration(45), "45s");
        assert_eq!(human_duration(90), "90s");
    }

    #[tokio::test]
    async fn display_terminates_on_batch_done() {
        let (tx, mut rx) = progress::channel();
        tx.emit(Progress::ItemStarted {
            index: 0,
            total: 1,
            url: "https://example.com/a".into(),
        });
        tx.emit(Progress::OverallProgress { fraction: 1.0 });
        tx.emit(Progress::BatchDone {
            done: 1,
            skipped: 0,
            failed: 0,
            cancelled: 0,
        });

        let mut display = ProgressDisplay::new(DisplayConfig {
            enable_progress_bars: false,
            update_interval: Duration::from_millis(1),
        });
        display.run(&mut rx).await;
    }

    #[tokio::test]
    async fn display_terminates_when_producers_drop() {
        let (tx, mut rx) = progress::channel();
        tx.emit(Progress::OverallProgress { fraction: 0.5 });
        drop(tx);

        let mut display = ProgressDisplay::new(DisplayConfig {
            enable_progress_bars: false,
            update_interval: Duration::from_millis(1),
        });
        display.run(&mut rx).await;
    }
}
