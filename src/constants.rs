//! Application constants for tube_archiver
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names recognized as configuration overrides
pub mod env {
    /// Hugging Face access token
    pub const HF_TOKEN: &str = "HF_TOKEN";

    /// Destination repository identifier (e.g. "user/archive")
    pub const HF_REPO_ID: &str = "HF_REPO_ID";

    /// Repository kind: dataset, model or space
    pub const HF_REPO_TYPE: &str = "HF_REPO_TYPE";

    /// Branch / revision to commit uploads to
    pub const HF_BRANCH: &str = "HF_BRANCH";

    /// Path prefix inside the repository
    pub const HF_PATH_PREFIX: &str = "HF_PATH_PREFIX";

    /// Netscape cookies file passed through to the fetch tool
    pub const YT_COOKIES: &str = "YT_COOKIES";

    /// Courtesy byte-rate cap (bytes per second)
    pub const YT_RATELIMIT: &str = "YT_RATELIMIT";

    /// Minimum randomized sleep between downloads (seconds)
    pub const YT_SLEEP_INTERVAL: &str = "YT_SLEEP_INTERVAL";

    /// Maximum randomized sleep between downloads (seconds)
    pub const YT_MAX_SLEEP_INTERVAL: &str = "YT_MAX_SLEEP_INTERVAL";

    /// Sleep between individual HTTP requests (seconds)
    pub const YT_SLEEP_REQUESTS: &str = "YT_SLEEP_REQUESTS";
}

/// Hugging Face Hub endpoints and URL construction
pub mod hub {
    /// Hub API and content base URL
    pub const BASE_URL: &str = "https://huggingface.co";

    /// Repository creation endpoint (relative to base)
    pub const CREATE_REPO_PATH: &str = "/api/repos/create";

    /// Default repository kind when none is configured
    pub const DEFAULT_REPO_TYPE: &str = "dataset";

    /// Default branch when none is configured
    pub const DEFAULT_BRANCH: &str = "main";
}

/// Defaults handed to the external fetch tool
pub mod downloader {
    /// Name of the fetch binary looked up on PATH
    pub const FETCH_BINARY: &str = "yt-dlp";

    /// Courtesy byte-rate cap (~2 MB/s)
    pub const DEFAULT_RATELIMIT: u64 = 2_000_000;

    /// Minimum randomized sleep between downloads (seconds)
    pub const DEFAULT_SLEEP_INTERVAL: f64 = 2.0;

    /// Maximum randomized sleep between downloads (seconds)
    pub const DEFAULT_MAX_SLEEP_INTERVAL: f64 = 5.0;

    /// Sleep between individual HTTP requests (seconds)
    pub const DEFAULT_SLEEP_REQUESTS: f64 = 0.5;

    /// Retry count for whole-file fetches, delegated to the tool
    pub const RETRIES: u32 = 10;

    /// Retry count for individual fragments
    pub const FRAGMENT_RETRIES: u32 = 10;

    /// Concurrent fragment downloads
    pub const CONCURRENT_FRAGMENTS: u32 = 4;

    /// HTTP chunk size hint (10 MB)
    pub const HTTP_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

    /// Maximum output file name length
    pub const TRIM_FILE_NAME: u32 = 240;

    /// Default width of the autonumber prefix in output names
    pub const DEFAULT_AUTONUMBER_WIDTH: u8 = 5;

    /// Exit code yt-dlp uses when some items were skipped under
    /// --ignore-errors; the run as a whole still produced output
    pub const SOFT_FAILURE_EXIT_CODE: i32 = 101;
}

/// Artifact detection
pub mod detect {
    use super::Duration;

    /// Settle time before the post-fetch snapshot, so the external
    /// converter can finish flushing its output to disk
    pub const GRACE_DELAY: Duration = Duration::from_millis(500);
}

/// Batch orchestration
pub mod batch {
    use super::Duration;

    /// Pause applied to the whole batch after a rate-limit signal
    pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(300);
}

/// Progress reporting
pub mod progress {
    use super::Duration;

    /// Consumer drain interval for the event channel
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
}

/// File and directory names
pub mod files {
    /// Transient staging directory for fetched artifacts
    pub const DOWNLOAD_DIR: &str = "downloads";

    /// Newline-delimited default item source
    pub const LINK_FILE: &str = "link.txt";

    /// Project-local configuration file name
    pub const LOCAL_CONFIG_FILE: &str = "tube-archiver.toml";

    /// Directory name under the user config dir
    pub const CONFIG_DIR: &str = "tube-archiver";
}

/// Process exit codes for non-interactive invocations
pub mod exit {
    /// Batch completed, including partial per-item failures
    pub const SUCCESS: i32 = 0;

    /// No items resolved from arguments or the link file
    pub const NO_ITEMS: i32 = 1;

    /// Required configuration missing or unrecoverable setup error
    pub const CONFIG: i32 = 2;
}

// Re-export commonly used constants for convenience
pub use batch::RATE_LIMIT_COOLDOWN;
pub use detect::GRACE_DELAY;
pub use downloader::{DEFAULT_RATELIMIT, FETCH_BINARY};
pub use files::{DOWNLOAD_DIR, LINK_FILE};
pub use hub::BASE_URL as HUB_BASE_URL;
pub use progress::POLL_INTERVAL;
