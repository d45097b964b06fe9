//! Transfer state machine: one item through Fetch → Detect → Upload → Purge
//!
//! Drives a single item end to end and classifies every way the pipeline
//! can go sideways without halting the batch: a throttling signal is
//! reported upward so the orchestrator can cool down, other fetch errors
//! abandon only this item, a missing artifact is a skip rather than a
//! failure, an upload error is scoped to one artifact, and a failed purge
//! is merely a warning because the upload is already durable.
//!
//! The local copy of an artifact is deleted strictly after its upload call
//! returned success, and a per-run "already uploaded" set guarantees no
//! resolved path is handed to the store twice.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::errors::FetchError;

use super::fetcher::{FetchEvent, FetchOptions, MediaFetcher};
use super::models::{FailureKind, Item, ItemOutcome, TransferState};
use super::progress::{EventSender, Progress};
use super::snapshot::{self, DirSnapshot};
use super::store::{path_in_repo, ArtifactStore};

/// Shared collaborators for transfers within one batch run
pub struct TransferContext<'a> {
    pub settings: &'a Settings,
    pub options: &'a FetchOptions,
    pub fetcher: &'a dyn MediaFetcher,
    pub store: &'a dyn ArtifactStore,
    pub events: &'a EventSender,
    /// Settle time before the post-fetch snapshot
    pub grace_delay: Duration,
}

impl<'a> TransferContext<'a> {
    fn state(&self, item: &Item, state: TransferState) {
        self.events.emit(Progress::StateChanged {
            index: item.index,
            state,
        });
    }
}

/// Drive one item to a terminal state.
///
/// `uploaded` is the per-run idempotency set, keyed by resolved absolute
/// path and owned by the orchestrator.
pub async fn run_item(
    item: &Item,
    ctx: &TransferContext<'_>,
    uploaded: &mut HashSet<PathBuf>,
) -> ItemOutcome {
    // Fetching
    ctx.state(item, TransferState::Fetching);
    let before = match DirSnapshot::capture(&ctx.settings.download_dir) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            ctx.events.emit(Progress::Error {
                index: item.index,
                message: format!("cannot snapshot working directory: {e}"),
            });
            ctx.state(item, TransferState::Failed);
            return ItemOutcome::Failed(FailureKind::Network);
        }
    };

    if let Err(e) = fetch_with_forwarding(item, ctx).await {
        ctx.events.emit(Progress::Error {
            index: item.index,
            message: e.to_string(),
        });
        ctx.state(item, TransferState::Failed);
        let kind = if e.is_rate_limited() {
            FailureKind::RateLimited
        } else {
            FailureKind::Network
        };
        return ItemOutcome::Failed(kind);
    }

    // Detecting: the fetch may have soft-skipped, so always look at what
    // actually landed on disk
    ctx.state(item, TransferState::Detecting);
    tokio::time::sleep(ctx.grace_delay).await;
    let after = match DirSnapshot::capture(&ctx.settings.download_dir) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            ctx.events.emit(Progress::Error {
                index: item.index,
                message: format!("cannot snapshot working directory: {e}"),
            });
            ctx.state(item, TransferState::Failed);
            return ItemOutcome::Failed(FailureKind::Network);
        }
    };

    let candidates = snapshot::new_artifacts(&before, &after);
    let artifacts = snapshot::matching_artifacts(candidates, &ctx.settings.output_kind);
    if artifacts.is_empty() {
        info!("{item}: no matching artifact produced, skipping");
        ctx.state(item, TransferState::Skipped);
        return ItemOutcome::Skipped;
    }
    debug!("{item}: {} artifact(s) detected", artifacts.len());

    // Uploading + Purging, artifact by artifact, in detection order
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for artifact in &artifacts {
        if uploaded.contains(&artifact.path) {
            debug!("{item}: {} already uploaded this run", artifact.file_name());
            continue;
        }

        ctx.state(item, TransferState::Uploading);
        let destination = path_in_repo(&ctx.settings.path_prefix, &artifact.file_name());
        match ctx.store.upload(&artifact.path, &destination).await {
            Ok(remote_url) => {
                uploaded.insert(artifact.path.clone());
                succeeded += 1;
                ctx.events.emit(Progress::ArtifactUploaded {
                    index: item.index,
                    remote_url,
                });

                // Purge only after the upload call returned success; the
                // remote copy is durable, so a failed delete is a warning
                ctx.state(item, TransferState::Purging);
                if let Err(e) = std::fs::remove_file(&artifact.path) {
                    warn!("{item}: could not delete {}: {e}", artifact.file_name());
                    ctx.events.emit(Progress::Warning {
                        message: format!(
                            "could not delete local file {}: {e}",
                            artifact.file_name()
                        ),
                    });
                }
            }
            Err(e) => {
                // Scoped to this artifact; siblings still get their turn
                failed += 1;
                warn!("{item}: upload of {} failed: {e}", artifact.file_name());
                ctx.events.emit(Progress::Error {
                    index: item.index,
                    message: format!("upload of {} failed: {e}", artifact.file_name()),
                });
            }
        }
    }

    if succeeded == 0 && failed > 0 {
        ctx.state(item, TransferState::Failed);
        return ItemOutcome::Failed(FailureKind::Upload);
    }
    ctx.state(item, TransferState::Done);
    ItemOutcome::Done
}

/// Run the fetch while forwarding its progress events onto the channel
async fn fetch_with_forwarding(
    item: &Item,
    ctx: &TransferContext<'_>,
) -> Result<(), FetchError> {
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel();
    let events = ctx.events.clone();
    let index = item.index;
    let forwarder = tokio::spawn(async move {
        while let Some(event) = fetch_rx.recv().await {
            match event {
                FetchEvent::Progress {
                    percent,
                    speed,
                    eta,
                } => events.emit(Progress::FetchProgress {
                    index,
                    percent,
                    speed,
                    eta,
                }),
                FetchEvent::Converting => events.emit(Progress::Converting { index }),
            }
        }
    });

    let result = ctx.fetcher.fetch(&item.url, ctx.options, fetch_tx).await;
    // Sender dropped inside fetch; forwarder drains whatever is left
    let _ = forwarder.await;
    result
}
