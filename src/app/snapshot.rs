//! Artifact detection through directory snapshots
//!
//! The fetch tool does not hand back the path of its final output: the
//! download, any intermediate container and the converted result all just
//! appear in the working directory. Detection therefore diffs a snapshot
//! taken immediately before the fetch against one taken after it returns,
//! and keeps only regular files whose extension matches the single
//! extension implied by the requested output kind. Candidates are ordered
//! by modification time ascending, since a fetch may emit an intermediate
//! file before its final converted file.
//!
//! Callers are expected to wait a short grace period before the second
//! snapshot (see [`crate::constants::detect::GRACE_DELAY`]) so the
//! external converter can finish flushing to disk.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::models::OutputKind;

/// A filesystem entry observed to be new since the fetch began
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Resolved path of the file on local disk
    pub path: PathBuf,
    /// Lowercased extension, empty when the file has none
    pub extension: String,
    /// Modification time, used only for ordering
    pub modified: SystemTime,
}

impl Artifact {
    /// File name component, or the whole path when it has none
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A set of resolved paths captured at a point in time.
///
/// Used only as a diffing tool within one item's transfer; never persisted.
#[derive(Debug, Clone, Default)]
pub struct DirSnapshot {
    paths: HashSet<PathBuf>,
}

impl DirSnapshot {
    /// Capture the current entries of `dir`.
    ///
    /// Entries that vanish between listing and resolution are ignored:
    /// the fetch tool renames its partial files while we look.
    pub fn capture(dir: &Path) -> io::Result<Self> {
        let mut paths = HashSet::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            match entry.path().canonicalize() {
                Ok(resolved) => {
                    paths.insert(resolved);
                }
                Err(e) => {
                    debug!("skipping vanished entry {:?}: {}", entry.path(), e);
                }
            }
        }
        Ok(Self { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths present in `after` but not in `self`
    fn new_paths<'a>(&'a self, after: &'a DirSnapshot) -> impl Iterator<Item = &'a PathBuf> {
        after.paths.iter().filter(move |p| !self.paths.contains(*p))
    }
}

/// Identify the new regular files between two snapshots, ordered by
/// modification time ascending (oldest-produced first)
pub fn new_artifacts(before: &DirSnapshot, after: &DirSnapshot) -> Vec<Artifact> {
    let mut artifacts: Vec<Artifact> = before
        .new_paths(after)
        .filter_map(|path| {
            let meta = match fs::metadata(path) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("cannot stat new entry {}: {}", path.display(), e);
                    return None;
                }
            };
            if !meta.is_file() {
                return None;
            }
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some(Artifact {
                path: path.clone(),
                extension,
                modified,
            })
        })
        .collect();

    artifacts.sort_by_key(|a| a.modified);
    artifacts
}

/// Restrict candidates to the single extension implied by the requested
/// output kind, guarding against leftover intermediate containers
pub fn matching_artifacts(artifacts: Vec<Artifact>, kind: &OutputKind) -> Vec<Artifact> {
    let wanted = kind.extension();
    let (matched, rejected): (Vec<_>, Vec<_>) = artifacts
        .into_iter()
        .partition(|a| a.extension == wanted);

    for artifact in &rejected {
        debug!(
            "ignoring non-matching artifact {} (wanted .{})",
            artifact.file_name(),
            wanted
        );
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "data").unwrap();
        path
    }

    #[test]
    fn diff_finds_only_new_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "old.mp3");

        let before = DirSnapshot::capture(dir.path()).unwrap();
        touch(dir.path(), "new.mp3");
        let after = DirSnapshot::capture(dir.path()).unwrap();

        let artifacts = new_artifacts(&before, &after);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].file_name(), "new.mp3");
        assert_eq!(artifacts[0].extension, "mp3");
    }

    #[test]
    fn diff_ignores_new_directories() {
        let dir = TempDir::new().unwrap();
        let before = DirSnapshot::capture(dir.path()).unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        let after = DirSnapshot::capture(dir.path()).unwrap();

        assert!(new_artifacts(&before, &after).is_empty());
    }

    #[test]
    fn artifacts_ordered_by_modification_time() {
        let dir = TempDir::new().unwrap();
        let before = DirSnapshot::capture(dir.path()).unwrap();

        let first = touch(dir.path(), "first.mp4");
        let second = touch(dir.path(), "second.mp4");
        // Force distinct mtimes regardless of filesystem resolution
        let early = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000);
        let late = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(2_000);
        File::open(&second).unwrap().set_modified(early).unwrap();
        File::open(&first).unwrap().set_modified(late).unwrap();

        let after = DirSnapshot::capture(dir.path()).unwrap();
        let artifacts = new_artifacts(&before, &after);
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].file_name(), "second.mp4");
        assert_eq!(artifacts[1].file_name(), "first.mp4");
    }

    #[test]
    fn filtering_drops_intermediate_containers() {
        let dir = TempDir::new().unwrap();
        let before = DirSnapshot::capture(dir.path()).unwrap();
        touch(dir.path(), "song.webm");
        touch(dir.path(), "song.mp3");
        let after = DirSnapshot::capture(dir.path()).unwrap();

        let matched = matching_artifacts(new_artifacts(&before, &after), &OutputKind::AudioLossy);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].file_name(), "song.mp3");
    }

    #[test]
    fn extension_match_is_case_insensitive_on_disk() {
        let dir = TempDir::new().unwrap();
        let before = DirSnapshot::capture(dir.path()).unwrap();
        touch(dir.path(), "CLIP.MP4");
        let after = DirSnapshot::capture(dir.path()).unwrap();

        let matched = matching_artifacts(new_artifacts(&before, &after), &OutputKind::Video);
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn empty_diff_yields_no_candidates() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "existing.mp4");
        let before = DirSnapshot::capture(dir.path()).unwrap();
        let after = DirSnapshot::capture(dir.path()).unwrap();

        assert!(new_artifacts(&before, &after).is_empty());
    }
}
