//! End-to-end pipeline tests through the public library API
//!
//! These tests drive the batch orchestrator with scripted fetch and store
//! implementations and verify the full item lifecycle: fetch, artifact
//! detection, prefixed upload and purge of the local copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use tube_archiver::app::{
    ArtifactStore, BatchConfig, BatchOrchestrator, FetchEvent, FetchOptions, Item, ItemOutcome,
    MediaFetcher, OutputKind, Progress, RepoKind, progress,
};
use tube_archiver::config::{CourtesyLimits, Settings};
use tube_archiver::errors::{FetchError, FetchResult, StoreResult};

/// Writes scripted files into the staging directory per URL
struct ScriptedFetcher {
    dir: PathBuf,
    outputs: HashMap<String, Vec<&'static str>>,
    failures: HashMap<String, &'static str>,
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        _options: &FetchOptions,
        events: mpsc::UnboundedSender<FetchEvent>,
    ) -> FetchResult<()> {
        if let Some(detail) = self.failures.get(url) {
            return Err(FetchError::classify(*detail));
        }
        let _ = events.send(FetchEvent::Progress {
            percent: 100.0,
            speed: Some(1_500_000.0),
            eta: Some(0),
        });
        for name in self.outputs.get(url).into_iter().flatten() {
            std::fs::write(self.dir.join(name), b"media bytes").unwrap();
        }
        Ok(())
    }
}

/// Records uploads; optionally rejects specific file names
#[derive(Default)]
struct RecordingStore {
    uploads: Mutex<Vec<String>>,
    reject: Vec<&'static str>,
    repo_ensured: AtomicBool,
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn ensure_repository(&self) -> StoreResult<()> {
        self.repo_ensured.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn upload(&self, local: &Path, path_in_repo: &str) -> StoreResult<String> {
        assert!(
            local.exists(),
            "artifact must still be on disk when uploaded"
        );
        let name = local.file_name().unwrap().to_string_lossy().to_string();
        if self.reject.contains(&name.as_str()) {
            return Err(tube_archiver::errors::StoreError::UploadRejected {
                path: local.to_path_buf(),
                status: 500,
                detail: "scripted rejection".to_string(),
            });
        }
        self.uploads.lock().unwrap().push(path_in_repo.to_string());
        Ok(format!("https://hub.test/{path_in_repo}"))
    }
}

fn settings(dir: &TempDir, kind: OutputKind, prefix: &str) -> Settings {
    Settings {
        output_kind: kind,
        download_dir: dir.path().to_path_buf(),
        repo_id: "user/archive".to_string(),
        repo_kind: RepoKind::Dataset,
        branch: "main".to_string(),
        path_prefix: prefix.to_string(),
        token: "hf_test".to_string(),
        cookies: None,
        autonumber_width: 5,
        limits: CourtesyLimits::default(),
    }
}

fn fast_config() -> BatchConfig {
    BatchConfig {
        rate_limit_cooldown: Duration::from_millis(1),
        detect_grace_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn full_pipeline_uploads_with_prefix_and_purges_local_copies() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher {
        dir: dir.path().to_path_buf(),
        outputs: HashMap::from([
            // Leftover intermediate container must be ignored
            ("u1".to_string(), vec!["one.mp3", "one.webm"]),
            ("u2".to_string(), vec![]),
        ]),
        failures: HashMap::new(),
    });
    let store = Arc::new(RecordingStore::default());
    let (events, mut receiver) = progress::channel();

    let orchestrator = BatchOrchestrator::new(
        settings(&dir, OutputKind::AudioLossy, "mp3/"),
        fast_config(),
        fetcher,
        store.clone(),
        events,
    );
    let items = vec![Item::new("u1", 0), Item::new("u2", 1)];
    let report = orchestrator.run(items).await.unwrap();

    assert!(store.repo_ensured.load(Ordering::SeqCst));
    assert_eq!(report.done, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);

    // Prefixed destination path, matched artifact only
    assert_eq!(
        store.uploads.lock().unwrap().as_slice(),
        &["mp3/one.mp3".to_string()]
    );

    // Uploaded copy purged, unmatched leftover untouched
    assert!(!dir.path().join("one.mp3").exists());
    assert!(dir.path().join("one.webm").exists());

    let drained = receiver.drain();
    assert!(drained
        .iter()
        .any(|e| matches!(&e.progress, Progress::ArtifactUploaded { remote_url, .. }
            if remote_url == "https://hub.test/mp3/one.mp3")));
    assert!(drained
        .iter()
        .any(|e| matches!(e.progress, Progress::FetchProgress { percent, .. } if percent == 100.0)));
    assert!(drained
        .iter()
        .any(|e| matches!(e.progress, Progress::BatchDone { done: 1, skipped: 1, .. })));
}

#[tokio::test]
async fn upload_rejection_leaves_artifact_on_disk_and_spares_siblings() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher {
        dir: dir.path().to_path_buf(),
        outputs: HashMap::from([("u1".to_string(), vec!["first.wav", "second.wav"])]),
        failures: HashMap::new(),
    });
    let store = Arc::new(RecordingStore {
        reject: vec!["first.wav"],
        ..Default::default()
    });
    let (events, _receiver) = progress::channel();

    let orchestrator = BatchOrchestrator::new(
        settings(&dir, OutputKind::AudioLossless, ""),
        fast_config(),
        fetcher,
        store.clone(),
        events,
    );
    let report = orchestrator.run(vec![Item::new("u1", 0)]).await.unwrap();

    // One sibling made it, so the item still counts as done
    assert_eq!(report.done, 1);
    assert_eq!(
        report.outcomes,
        vec![(Item::new("u1", 0), ItemOutcome::Done)]
    );
    assert_eq!(
        store.uploads.lock().unwrap().as_slice(),
        &["second.wav".to_string()]
    );

    // Rejected artifact survives for a later run; uploaded one is purged
    assert!(dir.path().join("first.wav").exists());
    assert!(!dir.path().join("second.wav").exists());
}

#[tokio::test]
async fn rate_limited_item_cools_batch_and_next_item_still_runs() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher {
        dir: dir.path().to_path_buf(),
        outputs: HashMap::from([("u2".to_string(), vec!["two.mp4"])]),
        failures: HashMap::from([(
            "u1".to_string(),
            "ERROR: HTTP Error 429: Too Many Requests",
        )]),
    });
    let store = Arc::new(RecordingStore::default());
    let (events, mut receiver) = progress::channel();

    let orchestrator = BatchOrchestrator::new(
        settings(&dir, OutputKind::Video, ""),
        fast_config(),
        fetcher,
        store.clone(),
        events,
    );
    let report = orchestrator
        .run(vec![Item::new("u1", 0), Item::new("u2", 1)])
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.done, 1);
    assert_eq!(
        store.uploads.lock().unwrap().as_slice(),
        &["two.mp4".to_string()]
    );
    assert!(receiver
        .drain()
        .iter()
        .any(|e| matches!(e.progress, Progress::CooldownStarted { .. })));
}
