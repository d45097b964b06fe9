//! Link list file handling
//!
//! One URL per line, blank lines ignored, order preserved. The same
//! reader serves the default `link.txt` and any explicitly given file.

use std::io;
use std::path::Path;

use tracing::debug;

/// Read URLs from a link file, trimming whitespace and skipping blanks
pub fn read_links(path: &Path) -> io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let links: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    debug!("read {} link(s) from {}", links.len(), path.display());
    Ok(links)
}

/// Write URLs back to a link file, one per line with a trailing newline
pub fn write_links(path: &Path, links: &[String]) -> io::Result<()> {
    let mut content = links.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    std::fs::write(path, content)
}
