//! Tube Archiver CLI application
//!
//! Command-line interface for archiving media to the Hugging Face Hub:
//! fetch with yt-dlp, stage locally, upload, purge after confirmed upload.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tube_archiver::cli::{handle_config, handle_run, Cli, Commands};
use tube_archiver::errors::Result;

#[tokio::main]
async fn main() {
    // Exit codes: 0 = batch completed, 1 = no items, 2 = config/setup error
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging(&cli);

    info!("Tube Archiver v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run(args) => handle_run(&cli.global, args).await,
        Commands::Config(args) => handle_config(&cli.global, args).await,
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("tube_archiver={}", log_level).parse().unwrap());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
