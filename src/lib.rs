//! Tube Archiver Library
//!
//! A pipeline tool that fetches media items with yt-dlp, stages them in a
//! local transient directory, uploads the produced files to a Hugging Face
//! Hub repository and purges the local copies once the upload is confirmed.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_accessible() {
        // Test that our constants are accessible
        assert_eq!(constants::files::LINK_FILE, "link.txt");
        assert_eq!(constants::env::HF_TOKEN, "HF_TOKEN");
        assert_eq!(constants::exit::NO_ITEMS, 1);
    }

    #[test]
    fn test_error_types() {
        // Test that our error types work correctly
        let config_error = errors::ConfigError::Incomplete { field: "hf.token" };
        let app_error = AppError::Config(config_error);

        assert_eq!(app_error.category(), "config");
        assert_eq!(app_error.exit_code(), 2);
    }
}
