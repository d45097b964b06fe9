//! Error types for tube_archiver
//!
//! This module defines error types for all components of the application.
//! The taxonomy follows the failure model of the transfer pipeline: fatal
//! configuration problems abort before any item starts, fetch failures are
//! scoped to one item, upload failures are scoped to one artifact, and a
//! failed local purge is only ever a warning because the upload is already
//! durable by the time purging begins.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration resolution errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required field empty after resolving all precedence tiers
    #[error(
        "Missing required configuration: {field}. Set it via CLI flag, environment or the config file"
    )]
    Incomplete { field: &'static str },

    /// Configuration file could not be read
    #[error("Failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML
    #[error("Invalid configuration format in {path}")]
    InvalidFormat {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Explicitly specified config file does not exist
    #[error("Specified config file not found: {path}")]
    NotFound { path: PathBuf },
}

/// Fetch-layer errors, classified from the external tool's behaviour
#[derive(Error, Debug)]
pub enum FetchError {
    /// The remote endpoint signalled throttling (HTTP 429/403 or an
    /// explicit "too many requests"); the batch should cool down
    #[error("Fetch rate limited: {detail}")]
    RateLimited { detail: String },

    /// Any other fetch failure; the item is abandoned, the batch continues
    #[error("Fetch failed: {detail}")]
    Network { detail: String },

    /// The fetch binary could not be found on PATH
    #[error("Fetch tool '{binary}' not found on PATH")]
    ToolNotFound { binary: String },

    /// The fetch process could not be spawned or its output read
    #[error("Failed to run fetch tool")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Classify raw error output from the fetch tool.
    ///
    /// HTTP 429 and an explicit "too many requests" are unambiguous
    /// throttling signals. HTTP 403 is treated the same way: for this
    /// workload it is far more often bot-throttling than a genuine
    /// authorization failure, and a spurious five-minute cooldown is the
    /// cheaper mistake.
    pub fn classify(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let lowered = detail.to_lowercase();
        if lowered.contains("429")
            || lowered.contains("too many requests")
            || lowered.contains("http error 403")
        {
            FetchError::RateLimited { detail }
        } else {
            FetchError::Network { detail }
        }
    }

    /// Whether this failure should pause the whole batch
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }
}

/// Remote store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// HTTP transport failure talking to the Hub
    #[error("Hub request failed")]
    Http(#[from] reqwest::Error),

    /// Repository creation rejected
    #[error("Failed to ensure repository {repo_id}: HTTP {status}")]
    RepoCreation { repo_id: String, status: u16 },

    /// Upload call rejected for one artifact
    #[error("Upload of {path} rejected: HTTP {status}: {detail}")]
    UploadRejected {
        path: PathBuf,
        status: u16,
        detail: String,
    },

    /// Local artifact could not be read for upload
    #[error("Failed to read artifact {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Remote store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// No items could be resolved from arguments or the link file
    #[error("No items to process: supply URLs on the command line or in {link_file}")]
    NoItems { link_file: String },

    /// Generic application error with context
    #[error("{message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Fetch(_) => "fetch",
            AppError::Store(_) => "store",
            AppError::Io(_) => "io",
            AppError::NoItems { .. } => "input",
            AppError::Generic { .. } => "generic",
        }
    }

    /// Process exit code for a non-interactive invocation
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::NoItems { .. } => crate::constants::exit::NO_ITEMS,
            _ => crate::constants::exit::CONFIG,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;
