//! Fetch capability: the external media downloader seam
//!
//! The pipeline consumes the fetch step as an opaque capability: given a
//! URL and options it emits ordered progress events, writes zero or more
//! files under the configured directory, and returns normally even when
//! it skipped an unavailable item internally. The production
//! implementation drives a `yt-dlp` subprocess; tests substitute mocks
//! through the [`MediaFetcher`] trait.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::{CourtesyLimits, Settings};
use crate::constants::downloader;
use crate::errors::{FetchError, FetchResult};

use super::models::OutputKind;

/// Post-fetch conversion requested from the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postprocess {
    /// Merge/remux into a video container (mp4)
    RemuxVideo { container: String },
    /// Extract and transcode the audio stream
    ExtractAudio { codec: String },
    /// Keep whatever the selected format produced
    None,
}

/// Options handed to the fetch capability for every item in a run
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Format selector string, tool syntax
    pub format: String,
    /// Destination path template, tool syntax
    pub output_template: String,
    /// Whether playlist expansion is allowed
    pub playlist: bool,
    /// Concurrency-of-fragments hint
    pub concurrent_fragments: u32,
    /// Whole-file retry count, delegated to the tool
    pub retries: u32,
    /// Per-fragment retry count
    pub fragment_retries: u32,
    /// Per-chunk size hint in bytes
    pub http_chunk_size: u64,
    /// Maximum output file name length
    pub trim_file_name: u32,
    /// Courtesy rate limits, passed through unmodified
    pub limits: CourtesyLimits,
    /// Optional credential (cookies) file
    pub cookies: Option<PathBuf>,
    /// Requested conversion
    pub postprocess: Postprocess,
}

impl FetchOptions {
    /// Derive fetch options from the resolved settings.
    ///
    /// Format selectors and conversion choices are fixed per output kind;
    /// quality policy is not configurable here.
    pub fn from_settings(settings: &Settings) -> Self {
        let (format, postprocess) = match &settings.output_kind {
            OutputKind::Video => (
                "bestvideo[ext=mp4][vcodec*=avc]/bestvideo[vcodec*=avc]+bestaudio[ext=m4a]/\
                 best[ext=mp4]/best"
                    .to_string(),
                Postprocess::RemuxVideo {
                    container: "mp4".to_string(),
                },
            ),
            OutputKind::AudioLossy => (
                "bestaudio/best".to_string(),
                Postprocess::ExtractAudio {
                    codec: "mp3".to_string(),
                },
            ),
            OutputKind::AudioLossless => (
                "bestaudio/best".to_string(),
                Postprocess::ExtractAudio {
                    codec: "wav".to_string(),
                },
            ),
            OutputKind::AudioOriginal => (
                "bestaudio[ext=m4a]/bestaudio/best".to_string(),
                Postprocess::None,
            ),
        };

        let output_template = format!(
            "{}/%(autonumber)0{}d - %(title)s [%(id)s].%(ext)s",
            settings.download_dir.display(),
            settings.autonumber_width,
        );

        Self {
            format,
            output_template,
            playlist: true,
            concurrent_fragments: downloader::CONCURRENT_FRAGMENTS,
            retries: downloader::RETRIES,
            fragment_retries: downloader::FRAGMENT_RETRIES,
            http_chunk_size: downloader::HTTP_CHUNK_SIZE,
            trim_file_name: downloader::TRIM_FILE_NAME,
            limits: settings.limits.clone(),
            cookies: settings.cookies.clone(),
            postprocess,
        }
    }
}

/// Incremental event emitted by a running fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// Download progress line
    Progress {
        /// Percent complete, 0.0–100.0
        percent: f64,
        /// Transfer rate in bytes/sec, when the tool reported one
        speed: Option<f64>,
        /// Estimated seconds remaining, when reported
        eta: Option<u64>,
    },
    /// Download finished, conversion step running
    Converting,
}

/// The consumed fetch capability.
///
/// `fetch` is long-running; it must emit progress onto `events` as it
/// goes, write its output under the directory encoded in the options,
/// and return `Ok` for per-item soft skips the tool absorbed itself.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        events: mpsc::UnboundedSender<FetchEvent>,
    ) -> FetchResult<()>;
}

/// Production fetcher driving a `yt-dlp` subprocess
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary: PathBuf,
}

impl YtDlpFetcher {
    /// Locate the fetch binary on PATH
    pub fn discover() -> FetchResult<Self> {
        let binary =
            which::which(downloader::FETCH_BINARY).map_err(|_| FetchError::ToolNotFound {
                binary: downloader::FETCH_BINARY.to_string(),
            })?;
        debug!("using fetch binary at {}", binary.display());
        Ok(Self { binary })
    }

    /// Use an explicit binary path (tests, unusual installs)
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Build the full argument vector for one invocation
    fn command_args(url: &str, options: &FetchOptions) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-warnings".into(),
            "--ignore-errors".into(),
            "-o".into(),
            options.output_template.clone(),
            "--trim-filenames".into(),
            options.trim_file_name.to_string(),
            "--retries".into(),
            options.retries.to_string(),
            "--fragment-retries".into(),
            options.fragment_retries.to_string(),
            "--concurrent-fragments".into(),
            options.concurrent_fragments.to_string(),
            "--http-chunk-size".into(),
            options.http_chunk_size.to_string(),
            "--limit-rate".into(),
            options.limits.ratelimit.to_string(),
            "--sleep-interval".into(),
            options.limits.sleep_interval.to_string(),
            "--max-sleep-interval".into(),
            options.limits.max_sleep_interval.to_string(),
            "--sleep-requests".into(),
            options.limits.sleep_requests.to_string(),
        ];

        if !options.playlist {
            args.push("--no-playlist".into());
        }
        if let Some(cookies) = &options.cookies {
            args.push("--cookies".into());
            args.push(cookies.display().to_string());
        }

        args.push("-f".into());
        args.push(options.format.clone());

        match &options.postprocess {
            Postprocess::RemuxVideo { container } => {
                args.push("--merge-output-format".into());
                args.push(container.clone());
                args.push("--remux-video".into());
                args.push(container.clone());
                args.push("--embed-metadata".into());
            }
            Postprocess::ExtractAudio { codec } => {
                args.push("-x".into());
                args.push("--audio-format".into());
                args.push(codec.clone());
                args.push("--audio-quality".into());
                args.push("0".into());
                args.push("--embed-metadata".into());
            }
            Postprocess::None => {}
        }

        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        events: mpsc::UnboundedSender<FetchEvent>,
    ) -> FetchResult<()> {
        let args = Self::command_args(url, options);
        debug!("spawning {} with {} args", self.binary.display(), args.len());

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Network {
                detail: "fetch tool stdout unavailable".to_string(),
            })?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::Network {
                detail: "fetch tool stderr unavailable".to_string(),
            })?;

        let parser = ProgressParser::new();
        let events_for_stdout = events.clone();
        let stdout_task = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(event) = parser.parse_line(&line) {
                    // Receiver may be gone; progress must not fail the fetch
                    let _ = events_for_stdout.send(event);
                }
            }
            Ok::<(), std::io::Error>(())
        };
        let stderr_task = async {
            let mut buffer = String::new();
            stderr.read_to_string(&mut buffer).await?;
            Ok::<String, std::io::Error>(buffer)
        };

        let (stdout_result, stderr_output) = tokio::join!(stdout_task, stderr_task);
        stdout_result?;
        let stderr_output = stderr_output?;

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }
        if status.code() == Some(downloader::SOFT_FAILURE_EXIT_CODE) {
            // Some items were skipped under --ignore-errors; whatever was
            // produced is still on disk for detection
            warn!("fetch tool reported soft failures for {url}");
            return Ok(());
        }

        let detail = if stderr_output.trim().is_empty() {
            format!("fetch tool exited with {status}")
        } else {
            stderr_output.trim().to_string()
        };
        Err(FetchError::classify(detail))
    }
}

/// Parser for the tool's `--newline` progress output
struct ProgressParser {
    download: Regex,
}

impl ProgressParser {
    fn new() -> Self {
        // e.g. "[download]  42.7% of 10.00MiB at 1.23MiB/s ETA 00:05"
        let download = Regex::new(
            r"^\[download\]\s+(?P<pct>\d+(?:\.\d+)?)%(?:.*?\bat\s+(?P<speed>\S+))?(?:.*?\bETA\s+(?P<eta>[\d:]+))?",
        )
        .expect("static regex");
        Self { download }
    }

    fn parse_line(&self, line: &str) -> Option<FetchEvent> {
        if let Some(caps) = self.download.captures(line) {
            let percent = caps.name("pct")?.as_str().parse().ok()?;
            let speed = caps.name("speed").and_then(|m| parse_rate(m.as_str()));
            let eta = caps.name("eta").and_then(|m| parse_clock(m.as_str()));
            return Some(FetchEvent::Progress {
                percent,
                speed,
                eta,
            });
        }
        if line.starts_with("[ExtractAudio]")
            || line.starts_with("[Merger]")
            || line.starts_with("[VideoRemuxer]")
            || line.starts_with("[VideoConvertor]")
        {
            return Some(FetchEvent::Converting);
        }
        None
    }
}

/// Parse a rate like "1.23MiB/s" into bytes per second
fn parse_rate(value: &str) -> Option<f64> {
    let value = value.trim().trim_end_matches("/s");
    let unit_start = value.find(|c: char| c.is_alphabetic())?;
    let number: f64 = value[..unit_start].parse().ok()?;
    let multiplier = match &value[unit_start..] {
        "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(number * multiplier)
}

/// Parse a clock value like "05", "01:23" or "1:02:03" into seconds
fn parse_clock(value: &str) -> Option<u64> {
    let mut seconds: u64 = 0;
    for part in value.split(':') {
        seconds = seconds * 60 + part.parse::<u64>().ok()?;
    }
    Some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::RepoKind;

    fn settings(kind: OutputKind) -> Settings {
        Settings {
            output_kind: kind,
            download_dir: PathBuf::from("downloads"),
            repo_id: "user/archive".into(),
            repo_kind: RepoKind::Dataset,
            branch: "main".into(),
            path_prefix: String::new(),
            token: "hf_test".into(),
            cookies: None,
            autonumber_width: 3,
            limits: CourtesyLimits::default(),
        }
    }

    #[test]
    fn video_options_request_mp4_remux() {
        let options = FetchOptions::from_settings(&settings(OutputKind::Video));
        assert!(options.format.starts_with("bestvideo[ext=mp4][vcodec*=avc]"));
        assert_eq!(
            options.postprocess,
            Postprocess::RemuxVideo {
                container: "mp4".into()
            }
        );
        assert!(options.output_template.contains("%(autonumber)03d"));
    }

    #[test]
    fn audio_original_skips_conversion() {
        let options = FetchOptions::from_settings(&settings(OutputKind::AudioOriginal));
        assert_eq!(options.format, "bestaudio[ext=m4a]/bestaudio/best");
        assert_eq!(options.postprocess, Postprocess::None);
    }

    #[test]
    fn command_args_carry_courtesy_limits() {
        let options = FetchOptions::from_settings(&settings(OutputKind::AudioLossy));
        let args = YtDlpFetcher::command_args("https://example.com/v", &options);

        let limit_pos = args.iter().position(|a| a == "--limit-rate").unwrap();
        assert_eq!(args[limit_pos + 1], "2000000");
        assert!(args.contains(&"--sleep-requests".to_string()));
        assert!(args.contains(&"-x".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/v");
    }

    #[test]
    fn command_args_include_cookies_when_present() {
        let mut base = settings(OutputKind::Video);
        base.cookies = Some(PathBuf::from("cookies.txt"));
        let options = FetchOptions::from_settings(&base);
        let args = YtDlpFetcher::command_args("u", &options);

        let pos = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[pos + 1], "cookies.txt");
    }

    #[test]
    fn progress_line_parses_percent_speed_and_eta() {
        let parser = ProgressParser::new();
        let event = parser
            .parse_line("[download]  42.7% of 10.00MiB at 1.00MiB/s ETA 00:05")
            .unwrap();
        assert_eq!(
            event,
            FetchEvent::Progress {
                percent: 42.7,
                speed: Some(1024.0 * 1024.0),
                eta: Some(5),
            }
        );
    }

    #[test]
    fn progress_line_tolerates_unknown_fields() {
        let parser = ProgressParser::new();
        let event = parser
            .parse_line("[download] 100% of 3.50MiB at Unknown B/s ETA Unknown")
            .unwrap();
        assert!(matches!(
            event,
            FetchEvent::Progress {
                percent,
                speed: None,
                ..
            } if (percent - 100.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn converter_lines_map_to_converting() {
        let parser = ProgressParser::new();
        assert_eq!(
            parser.parse_line("[ExtractAudio] Destination: downloads/a.mp3"),
            Some(FetchEvent::Converting)
        );
        assert_eq!(parser.parse_line("[youtube] abc: Downloading webpage"), None);
    }

    #[test]
    fn rate_and_clock_parsing() {
        assert_eq!(parse_rate("512KiB/s"), Some(512.0 * 1024.0));
        assert_eq!(parse_rate("Unknown"), None);
        assert_eq!(parse_clock("01:23"), Some(83));
        assert_eq!(parse_clock("1:02:03"), Some(3723));
        assert_eq!(parse_clock("Unknown"), None);
    }
}
