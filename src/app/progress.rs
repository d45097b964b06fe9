//! Progress event channel
//!
//! A FIFO, multi-producer single-consumer conduit between the worker side
//! of a batch run and whatever reports it (console display, tests).
//! Producers never block: the channel grows unbounded and a send to a
//! departed consumer is silently dropped. The consumer either awaits
//! events or drains whatever is pending on a fixed poll interval, applying
//! them idempotently (a later overall-progress value supersedes an earlier
//! one for display purposes).

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::trace;

use super::models::{ItemOutcome, TransferState};

/// One typed event on the progress conduit
#[derive(Debug, Clone)]
pub enum Progress {
    /// An item left the pending state
    ItemStarted {
        index: usize,
        total: usize,
        url: String,
    },
    /// The item's transfer attempt changed state
    StateChanged { index: usize, state: TransferState },
    /// Incremental fetch progress, forwarded unchanged from the tool
    FetchProgress {
        index: usize,
        /// Percent complete of the current download, 0.0–100.0
        percent: f64,
        /// Current transfer rate in bytes/sec, when reported
        speed: Option<f64>,
        /// Estimated seconds remaining, when reported
        eta: Option<u64>,
    },
    /// Download finished, external conversion step running
    Converting { index: usize },
    /// One artifact reached the remote store
    ArtifactUploaded { index: usize, remote_url: String },
    /// An item reached a terminal state
    ItemFinished { index: usize, outcome: ItemOutcome },
    /// Completed items over total items, rounded to two decimals
    OverallProgress { fraction: f64 },
    /// The batch is pausing after a rate-limit signal
    CooldownStarted { seconds: u64 },
    /// Non-fatal condition worth surfacing (e.g. a failed purge)
    Warning { message: String },
    /// Item-scoped error surfaced alongside the final report
    Error { index: usize, message: String },
    /// Terminal batch summary
    BatchDone {
        done: usize,
        skipped: usize,
        failed: usize,
        cancelled: usize,
    },
}

/// A progress event with its enqueue timestamp
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub at: DateTime<Utc>,
    pub progress: Progress,
}

/// Producer handle; cheap to clone across the worker side
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl EventSender {
    /// Enqueue an event without blocking. A closed consumer is not an
    /// error: progress reporting must never fail the transfer itself.
    pub fn emit(&self, progress: Progress) {
        let event = ProgressEvent {
            at: Utc::now(),
            progress,
        };
        if self.tx.send(event).is_err() {
            trace!("progress consumer gone, dropping event");
        }
    }
}

/// Consumer handle, held by exactly one reporting surface
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl EventReceiver {
    /// Await the next event; `None` once every producer is dropped
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Collect everything currently pending without waiting.
    /// Enqueue order is preserved.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Create a connected sender/receiver pair
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}
