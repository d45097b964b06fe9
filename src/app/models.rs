//! Core data models for the transfer pipeline
//!
//! Defines the immutable inputs (items, output kinds, repository kinds),
//! the per-item state machine vocabulary, and the final batch report.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One source reference queued for transfer, plus its position in the
/// batch (used for numbering and overall-progress arithmetic)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Source URL consumed by the fetch tool
    pub url: String,
    /// Zero-based position in the requested batch
    pub index: usize,
}

impl Item {
    pub fn new(url: impl Into<String>, index: usize) -> Self {
        Self {
            url: url.into(),
            index,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.index + 1, self.url)
    }
}

/// Requested output kind for every item in a run.
///
/// Each kind implies exactly one accepted output extension; artifact
/// detection uses it to ignore leftover intermediate containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Highest-quality MP4 video
    Video,
    /// Lossy audio transcode (mp3)
    AudioLossy,
    /// Lossless audio transcode (wav)
    AudioLossless,
    /// Best original audio stream, no conversion (m4a)
    AudioOriginal,
}

impl OutputKind {
    /// The single file extension accepted by artifact detection
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Video => "mp4",
            OutputKind::AudioLossy => "mp3",
            OutputKind::AudioLossless => "wav",
            OutputKind::AudioOriginal => "m4a",
        }
    }

    /// Human-readable label for run summaries
    pub fn label(&self) -> &'static str {
        match self {
            OutputKind::Video => "MP4",
            OutputKind::AudioLossy => "MP3",
            OutputKind::AudioLossless => "WAV",
            OutputKind::AudioOriginal => "M4A",
        }
    }
}

impl Default for OutputKind {
    fn default() -> Self {
        OutputKind::Video
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" | "video" => Ok(OutputKind::Video),
            "mp3" => Ok(OutputKind::AudioLossy),
            "wav" => Ok(OutputKind::AudioLossless),
            "m4a" | "original" => Ok(OutputKind::AudioOriginal),
            other => Err(format!(
                "unknown output kind '{other}' (expected mp4, mp3, wav or m4a)"
            )),
        }
    }
}

/// Remote repository kind on the Hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Dataset,
    Model,
    Space,
}

impl RepoKind {
    /// API name as used in Hub endpoint paths
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoKind::Dataset => "dataset",
            RepoKind::Model => "model",
            RepoKind::Space => "space",
        }
    }

    /// URL path segment prefixing the repo id in content URLs.
    /// Models live at the root of the Hub namespace.
    pub fn url_prefix(&self) -> &'static str {
        match self {
            RepoKind::Dataset => "datasets/",
            RepoKind::Model => "",
            RepoKind::Space => "spaces/",
        }
    }
}

impl Default for RepoKind {
    fn default() -> Self {
        RepoKind::Dataset
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dataset" => Ok(RepoKind::Dataset),
            "model" => Ok(RepoKind::Model),
            "space" => Ok(RepoKind::Space),
            other => Err(format!(
                "unknown repo type '{other}' (expected dataset, model or space)"
            )),
        }
    }
}

/// States a transfer attempt moves through for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Pending,
    Fetching,
    Detecting,
    Uploading,
    Purging,
    Done,
    Skipped,
    Failed,
}

impl TransferState {
    /// Whether no further transition can occur from this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Done | TransferState::Skipped | TransferState::Failed
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferState::Pending => "pending",
            TransferState::Fetching => "fetching",
            TransferState::Detecting => "detecting",
            TransferState::Uploading => "uploading",
            TransferState::Purging => "purging",
            TransferState::Done => "done",
            TransferState::Skipped => "skipped",
            TransferState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why an item ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Throttling signal from the fetch layer; batch cools down
    RateLimited,
    /// Other fetch-layer failure; batch continues
    Network,
    /// Every discovered artifact failed to upload
    Upload,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::RateLimited => "rate limited",
            FailureKind::Network => "network error",
            FailureKind::Upload => "upload error",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// All discovered artifacts completed upload and purge (individual
    /// artifact failures do not revoke a partial success)
    Done,
    /// The fetch produced no matching artifact
    Skipped,
    /// Terminal failure, see [`FailureKind`]
    Failed(FailureKind),
    /// Cancellation was requested before this item started
    Cancelled,
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemOutcome::Done => f.write_str("done"),
            ItemOutcome::Skipped => f.write_str("skipped (no artifact produced)"),
            ItemOutcome::Failed(kind) => write!(f, "failed ({kind})"),
            ItemOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Final accounting for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Per-item outcomes in batch order
    pub outcomes: Vec<(Item, ItemOutcome)>,
}

impl BatchReport {
    /// Record one terminal outcome
    pub fn record(&mut self, item: Item, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Done => self.done += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
            ItemOutcome::Cancelled => self.cancelled += 1,
        }
        self.outcomes.push((item, outcome));
    }

    /// Items that reached any terminal state other than `Cancelled`
    pub fn completed(&self) -> usize {
        self.done + self.skipped + self.failed
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}
