//! Configuration resolution for tube_archiver
//!
//! Settings are resolved once per run from four precedence tiers, highest
//! wins: explicit invocation argument > process environment > persisted
//! config file > built-in default. Resolution itself is total: a missing,
//! empty or unparseable value at one tier simply falls through to the next.
//! Only [`Settings::validate`] can reject the result, and only for the two
//! fields a run cannot proceed without (token and repository id).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::models::{OutputKind, RepoKind};
use crate::constants::{downloader, env as env_keys, files, hub};
use crate::errors::ConfigError;

/// Courtesy rate limits, passed through to the fetch tool unmodified
#[derive(Debug, Clone, PartialEq)]
pub struct CourtesyLimits {
    /// Byte-rate cap in bytes per second
    pub ratelimit: u64,
    /// Minimum randomized sleep between downloads (seconds)
    pub sleep_interval: f64,
    /// Maximum randomized sleep between downloads (seconds)
    pub max_sleep_interval: f64,
    /// Sleep between individual HTTP requests (seconds)
    pub sleep_requests: f64,
}

impl Default for CourtesyLimits {
    fn default() -> Self {
        Self {
            ratelimit: downloader::DEFAULT_RATELIMIT,
            sleep_interval: downloader::DEFAULT_SLEEP_INTERVAL,
            max_sleep_interval: downloader::DEFAULT_MAX_SLEEP_INTERVAL,
            sleep_requests: downloader::DEFAULT_SLEEP_REQUESTS,
        }
    }
}

/// Immutable resolved settings for one run.
///
/// Built once by [`resolve`]; never mutated afterwards, only replaced
/// wholesale on reconfiguration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Requested output kind for every item
    pub output_kind: OutputKind,
    /// Transient staging directory for fetched artifacts
    pub download_dir: PathBuf,
    /// Destination repository identifier
    pub repo_id: String,
    /// Destination repository kind
    pub repo_kind: RepoKind,
    /// Branch / revision uploads are committed to
    pub branch: String,
    /// Path prefix inside the repository (may be empty)
    pub path_prefix: String,
    /// Authentication token for the remote store
    pub token: String,
    /// Optional cookies file handed to the fetch tool
    pub cookies: Option<PathBuf>,
    /// Width of the autonumber prefix in output file names (1–5)
    pub autonumber_width: u8,
    /// Courtesy rate limits
    pub limits: CourtesyLimits,
}

impl Settings {
    /// Check the fields a run cannot proceed without.
    ///
    /// Reported to the caller rather than raised during resolution so the
    /// CLI can map it to its own exit code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_empty() {
            return Err(ConfigError::Incomplete { field: "hf.token" });
        }
        if self.repo_id.is_empty() {
            return Err(ConfigError::Incomplete { field: "hf.repo_id" });
        }
        Ok(())
    }

    /// Multi-line run summary with the token redacted
    pub fn summary(&self) -> String {
        format!(
            "Output    : {}\n\
             Local     : {} (transient)\n\
             Cookies   : {}\n\
             HF repo   : {} ({})\n\
             HF branch : {}\n\
             HF prefix : {}\n\
             Token     : {}",
            self.output_kind,
            self.download_dir.display(),
            self.cookies
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not used)".to_string()),
            self.repo_id,
            self.repo_kind,
            self.branch,
            if self.path_prefix.is_empty() {
                "(root)"
            } else {
                &self.path_prefix
            },
            if self.token.is_empty() {
                "(missing)"
            } else {
                "(set)"
            },
        )
    }
}

/// Invocation-tier overrides, the highest precedence tier.
///
/// Populated from CLI flags; every field optional.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_kind: Option<OutputKind>,
    pub download_dir: Option<PathBuf>,
    pub repo_id: Option<String>,
    pub repo_kind: Option<RepoKind>,
    pub branch: Option<String>,
    pub path_prefix: Option<String>,
    pub token: Option<String>,
    pub cookies: Option<PathBuf>,
    pub autonumber_width: Option<u8>,
    pub ratelimit: Option<u64>,
    pub sleep_interval: Option<f64>,
    pub max_sleep_interval: Option<f64>,
    pub sleep_requests: Option<f64>,
}

/// `[hf]` section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HfSection {
    pub token: Option<String>,
    pub repo_id: Option<String>,
    pub repo_type: Option<String>,
    pub branch: Option<String>,
    pub path_prefix: Option<String>,
}

/// `[cookies]` section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CookiesSection {
    pub path: Option<String>,
}

/// `[downloader]` section of the config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderSection {
    pub ratelimit: Option<u64>,
    pub sleep_interval: Option<f64>,
    pub max_sleep_interval: Option<f64>,
    pub sleep_requests: Option<f64>,
}

/// File-tier configuration as persisted on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub hf: HfSection,
    pub cookies: CookiesSection,
    pub downloader: DownloaderSection,
}

impl FileConfig {
    /// Load the file tier. A missing default-location file yields the
    /// empty tier; an explicitly requested file must exist and parse.
    pub fn load(path_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = match path_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                path
            }
            None => match find_config_file() {
                Some(path) => path,
                None => {
                    debug!("no config file found, using empty file tier");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::InvalidFormat {
            path: path.clone(),
            source,
        })?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }
}

/// Find the config file in standard locations
pub fn find_config_file() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from(files::LOCAL_CONFIG_FILE)];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(files::CONFIG_DIR).join("config.toml"));
    }

    for path in candidates {
        if path.exists() {
            debug!("Found config file: {}", path.display());
            return Some(path);
        }
    }
    None
}

/// Default config file path for the current user
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(files::CONFIG_DIR).join("config.toml"))
}

/// Generate commented default configuration content for `config init`
pub fn default_config_content() -> String {
    format!(
        r#"# tube_archiver configuration
# Precedence per field: CLI flag > environment > this file > built-in default.

[hf]
# Hugging Face access token (or set HF_TOKEN)
token = ""
# Destination repository, e.g. "user/archive" (or set HF_REPO_ID)
repo_id = ""
# dataset, model or space
repo_type = "{repo_type}"
branch = "{branch}"
# Path prefix inside the repository, e.g. "mp3/"
path_prefix = ""

[cookies]
# Netscape-format cookies file handed to the fetch tool (or set YT_COOKIES)
path = ""

[downloader]
# Courtesy limits, passed through to the fetch tool unmodified
ratelimit = {ratelimit}
sleep_interval = {sleep_interval}
max_sleep_interval = {max_sleep_interval}
sleep_requests = {sleep_requests}
"#,
        repo_type = hub::DEFAULT_REPO_TYPE,
        branch = hub::DEFAULT_BRANCH,
        ratelimit = downloader::DEFAULT_RATELIMIT,
        sleep_interval = downloader::DEFAULT_SLEEP_INTERVAL,
        max_sleep_interval = downloader::DEFAULT_MAX_SLEEP_INTERVAL,
        sleep_requests = downloader::DEFAULT_SLEEP_REQUESTS,
    )
}

/// Capture the process environment as the ENV tier
pub fn environment() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Resolve settings from the four precedence tiers.
///
/// Pure and total: every field falls back down the chain, and the result
/// is only rejected later by [`Settings::validate`].
pub fn resolve(
    overrides: &Overrides,
    env: &HashMap<String, String>,
    file: &FileConfig,
) -> Settings {
    let repo_kind = overrides
        .repo_kind
        .or_else(|| parse_tier(env.get(env_keys::HF_REPO_TYPE)))
        .or_else(|| parse_tier(file.hf.repo_type.as_ref()))
        .unwrap_or_default();

    let limits = CourtesyLimits {
        ratelimit: overrides
            .ratelimit
            .or_else(|| parse_tier(env.get(env_keys::YT_RATELIMIT)))
            .or(file.downloader.ratelimit)
            .unwrap_or(downloader::DEFAULT_RATELIMIT),
        sleep_interval: overrides
            .sleep_interval
            .or_else(|| parse_tier(env.get(env_keys::YT_SLEEP_INTERVAL)))
            .or(file.downloader.sleep_interval)
            .unwrap_or(downloader::DEFAULT_SLEEP_INTERVAL),
        max_sleep_interval: overrides
            .max_sleep_interval
            .or_else(|| parse_tier(env.get(env_keys::YT_MAX_SLEEP_INTERVAL)))
            .or(file.downloader.max_sleep_interval)
            .unwrap_or(downloader::DEFAULT_MAX_SLEEP_INTERVAL),
        sleep_requests: overrides
            .sleep_requests
            .or_else(|| parse_tier(env.get(env_keys::YT_SLEEP_REQUESTS)))
            .or(file.downloader.sleep_requests)
            .unwrap_or(downloader::DEFAULT_SLEEP_REQUESTS),
    };

    let cookies = overrides.cookies.clone().or_else(|| {
        pick_str(
            None,
            env.get(env_keys::YT_COOKIES),
            file.cookies.path.as_ref(),
            "",
        )
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
    });

    Settings {
        output_kind: overrides.output_kind.clone().unwrap_or_default(),
        download_dir: overrides
            .download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(files::DOWNLOAD_DIR)),
        repo_id: pick_str(
            overrides.repo_id.as_ref(),
            env.get(env_keys::HF_REPO_ID),
            file.hf.repo_id.as_ref(),
            "",
        )
        .unwrap_or_default(),
        repo_kind,
        branch: pick_str(
            overrides.branch.as_ref(),
            env.get(env_keys::HF_BRANCH),
            file.hf.branch.as_ref(),
            hub::DEFAULT_BRANCH,
        )
        .unwrap_or_else(|| hub::DEFAULT_BRANCH.to_string()),
        path_prefix: pick_str(
            overrides.path_prefix.as_ref(),
            env.get(env_keys::HF_PATH_PREFIX),
            file.hf.path_prefix.as_ref(),
            "",
        )
        .unwrap_or_default(),
        token: pick_str(
            overrides.token.as_ref(),
            env.get(env_keys::HF_TOKEN),
            file.hf.token.as_ref(),
            "",
        )
        .unwrap_or_default(),
        cookies,
        autonumber_width: overrides
            .autonumber_width
            .filter(|w| (1..=5).contains(w))
            .unwrap_or(downloader::DEFAULT_AUTONUMBER_WIDTH),
        limits,
    }
}

/// Take the first tier whose value is present and non-empty after trimming
fn pick_str(
    invocation: Option<&String>,
    env: Option<&String>,
    file: Option<&String>,
    default: &str,
) -> Option<String> {
    for tier in [invocation, env, file] {
        if let Some(value) = tier {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    if default.is_empty() {
        Some(String::new())
    } else {
        Some(default.to_string())
    }
}

/// Parse a string tier value; failure falls through to the next tier
fn parse_tier<T: std::str::FromStr>(value: Option<&String>) -> Option<T> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse().ok()
    })
}
