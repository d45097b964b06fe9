//! Command-line interface components
//!
//! This module contains CLI-specific code for the Tube Archiver
//! application: argument parsing, command handlers and the console
//! progress display.

pub mod args;
pub mod commands;
pub mod display;

pub use args::{Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, RunArgs};
pub use commands::{handle_config, handle_run};
pub use display::{DisplayConfig, ProgressDisplay};
