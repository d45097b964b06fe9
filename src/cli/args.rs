//! Command-line argument parsing for Tube Archiver
//!
//! This module defines the CLI structure using clap derive macros. The
//! `run` subcommand accepts every configuration key as a flag so that
//! command-line values can override the environment and the config file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::models::{OutputKind, RepoKind};
use crate::config::Overrides;

/// Tube Archiver - fetch media and archive it on the Hugging Face Hub
#[derive(Parser, Debug)]
#[command(
    name = "tube-archiver",
    version,
    about = "Fetch media with yt-dlp and archive it on the Hugging Face Hub",
    long_about = "A pipeline tool that downloads media items with yt-dlp, detects the \
produced files, uploads them to a Hugging Face Hub repository and removes the local \
copies once the upload is confirmed."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, upload and purge a batch of media items
    Run(RunArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Media URLs to archive; reads link.txt when omitted
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Read URLs from this file instead of link.txt
    #[arg(long, value_name = "FILE")]
    pub links_file: Option<PathBuf>,

    /// Output kind: mp4, mp3, wav or m4a
    #[arg(short = 'f', long)]
    pub format: Option<OutputKind>,

    /// Local staging directory for fetched files
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Destination repository id (owner/name)
    #[arg(long, value_name = "REPO")]
    pub repo_id: Option<String>,

    /// Repository kind: dataset, model or space
    #[arg(long, value_name = "TYPE")]
    pub repo_type: Option<RepoKind>,

    /// Target branch in the repository
    #[arg(long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Path prefix inside the repository
    #[arg(long, value_name = "PREFIX")]
    pub path_prefix: Option<String>,

    /// Hub access token (prefer HF_TOKEN or the config file)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Cookies file passed through to the fetch tool
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Autonumber width in file names (1-5)
    #[arg(long, value_name = "N")]
    pub numbering: Option<u8>,

    /// Download rate cap in bytes per second
    #[arg(long, value_name = "BYTES")]
    pub limit_rate: Option<u64>,

    /// Minimum sleep between downloads, in seconds
    #[arg(long, value_name = "SECS")]
    pub sleep_interval: Option<f64>,

    /// Maximum sleep between downloads, in seconds
    #[arg(long, value_name = "SECS")]
    pub max_sleep_interval: Option<f64>,

    /// Sleep between metadata requests, in seconds
    #[arg(long, value_name = "SECS")]
    pub sleep_requests: Option<f64>,
}

impl RunArgs {
    /// Command-line values as the highest-precedence configuration tier
    pub fn overrides(&self) -> Overrides {
        Overrides {
            output_kind: self.format.clone(),
            download_dir: self.download_dir.clone(),
            repo_id: self.repo_id.clone(),
            repo_kind: self.repo_type.clone(),
            branch: self.branch.clone(),
            path_prefix: self.path_prefix.clone(),
            token: self.token.clone(),
            cookies: self.cookies.clone(),
            autonumber_width: self.numbering,
            ratelimit: self.limit_rate,
            sleep_interval: self.sleep_interval,
            max_sleep_interval: self.max_sleep_interval,
            sleep_requests: self.sleep_requests,
        }
    }
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented starter configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the resolved configuration (token redacted)
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_map_to_overrides() {
        let args = RunArgs {
            format: Some(OutputKind::AudioLossy),
            repo_id: Some("user/archive".to_string()),
            numbering: Some(3),
            limit_rate: Some(500_000),
            ..RunArgs::default()
        };

        let overrides = args.overrides();
        assert_eq!(overrides.output_kind, Some(OutputKind::AudioLossy));
        assert_eq!(overrides.repo_id.as_deref(), Some("user/archive"));
        assert_eq!(overrides.autonumber_width, Some(3));
        assert_eq!(overrides.ratelimit, Some(500_000));
        assert!(overrides.token.is_none());
    }

    #[test]
    fn urls_parse_as_positionals() {
        let cli = Cli::parse_from([
            "tube-archiver",
            "run",
            "https://example.com/a",
            "https://example.com/b",
            "--repo-id",
            "user/archive",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.urls.len(), 2);
                assert_eq!(args.repo_id.as_deref(), Some("user/archive"));
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_log_level() {
        let quiet = Cli::parse_from(["tube-archiver", "-q", "config", "show"]);
        assert_eq!(quiet.log_level(), tracing::Level::ERROR);

        let verbose = Cli::parse_from(["tube-archiver", "-v", "config", "show"]);
        assert_eq!(verbose.log_level(), tracing::Level::INFO);

        let default = Cli::parse_from(["tube-archiver", "config", "show"]);
        assert_eq!(default.log_level(), tracing::Level::WARN);
    }
}
