//! Core application logic for Tube Archiver
//!
//! This module contains the main pipeline components: the media fetcher,
//! artifact detection, the remote store client, the per-item transfer
//! state machine, and the batch orchestrator that sequences it all.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tube_archiver::app::{
//!     BatchConfig, BatchOrchestrator, HfStore, Item, YtDlpFetcher, progress,
//! };
//! use tube_archiver::config::Settings;
//!
//! # async fn example(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Arc::new(YtDlpFetcher::discover()?);
//! let store = Arc::new(HfStore::new(&settings)?);
//! let (events, _receiver) = progress::channel();
//!
//! let orchestrator =
//!     BatchOrchestrator::new(settings, BatchConfig::default(), fetcher, store, events);
//! let items = vec![Item::new("https://example.com/watch?v=abc", 0)];
//!
//! let report = orchestrator.run(items).await?;
//! println!("{} item(s) archived", report.done);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod fetcher;
pub mod links;
pub mod models;
pub mod progress;
pub mod snapshot;
pub mod store;
pub mod transfer;

// Re-export main public API
pub use batch::{BatchConfig, BatchOrchestrator};
pub use fetcher::{FetchEvent, FetchOptions, MediaFetcher, YtDlpFetcher};
pub use links::{read_links, write_links};
pub use models::{
    BatchReport, FailureKind, Item, ItemOutcome, OutputKind, RepoKind, TransferState,
};
pub use progress::{EventReceiver, EventSender, Progress, ProgressEvent};
pub use snapshot::{Artifact, DirSnapshot};
pub use store::{ArtifactStore, HfStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let item = Item::new("https://example.com/a", 0);
        assert_eq!(item.to_string(), "[1] https://example.com/a");
        assert_eq!(OutputKind::AudioLossy.extension(), "mp3");
    }
}
