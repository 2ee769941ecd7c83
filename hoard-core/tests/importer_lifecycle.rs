//! End-to-end exercise of the `Importer` capability interface through
//! `start`/`pause`/`resume`/cancellation, as distinct from each importer's
//! colocated unit tests which call its worker-body functions directly.
//! This is the one place that actually spawns a worker task and drives it
//! through `Collaborators`.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hoard_contracts::error::Result as ContractResult;
use hoard_contracts::events::{EventSink, EventTopic};
use hoard_contracts::http::{DownloadProgress, HttpClient, ProgressHook};
use hoard_contracts::import::{ContentHashService, ImportFileService, ImportOutcome};
use hoard_contracts::mime::{Mime, MimeDetector};
use hoard_contracts::paths::PathExpander;
use hoard_contracts::persistence::FolderConfigPersistence;
use hoard_contracts::tempfile::{TempDownload, TempFileProvider};
use hoard_contracts::thread_url::{ResolvedThreadUrl, ThreadUrlResolver};
use hoard_contracts::types::{ContentHash, ImportFileOptions, MediaResult, SeedStatus, TagMap};
use hoard_core::collaborators::Collaborators;
use hoard_core::importer::{HddImporter, Importer};
use hoard_core::seed::Seed;
use tokio_util::sync::CancellationToken;

struct AlwaysSuccessfulImport;

#[async_trait]
impl ImportFileService for AlwaysSuccessfulImport {
    async fn import_file(
        &self,
        path: &Path,
        _options: &ImportFileOptions,
        _tags: &TagMap,
        _generate_media_result: bool,
        _url: Option<&str>,
    ) -> ContractResult<(SeedStatus, ImportOutcome)> {
        Ok((
            SeedStatus::Successful,
            ImportOutcome::Full(MediaResult {
                hash: ContentHash(format!("hash:{}", path.display())),
                payload: serde_json::Value::Null,
            }),
        ))
    }

    async fn media_results(&self, _service_key: &str, _hashes: &[ContentHash]) -> ContractResult<Vec<MediaResult>> {
        Ok(Vec::new())
    }

    async fn content_updates(&self, _service_key: &str, _hash: &ContentHash, _tags: &[String]) -> ContractResult<()> {
        Ok(())
    }
}

struct UnusedHttp;
#[async_trait]
impl HttpClient for UnusedHttp {
    async fn fetch(&self, _url: &str, _dest: &Path, _hook: Option<&ProgressHook<'_>>) -> ContractResult<DownloadProgress> {
        unreachable!("hdd importer never performs HTTP")
    }
    async fn fetch_text(&self, _url: &str) -> ContractResult<String> {
        unreachable!("hdd importer never performs HTTP")
    }
}

struct UnusedMime;
#[async_trait]
impl MimeDetector for UnusedMime {
    async fn detect(&self, _path: &Path) -> ContractResult<Mime> {
        unreachable!("hdd importer never probes mime")
    }
}

struct UnusedPaths;
#[async_trait]
impl PathExpander for UnusedPaths {
    async fn expand(&self, _root: &Path) -> ContractResult<Vec<std::path::PathBuf>> {
        unreachable!("hdd importer never expands directories")
    }
}

struct UnusedTempFiles;
#[async_trait]
impl TempFileProvider for UnusedTempFiles {
    async fn reserve(&self, _ext: Option<&str>) -> ContractResult<TempDownload> {
        unreachable!("hdd importer never reserves temp files")
    }
}

struct UnusedThreadUrls;
#[async_trait]
impl ThreadUrlResolver for UnusedThreadUrls {
    async fn resolve(&self, _thread_url: &str) -> ContractResult<ResolvedThreadUrl> {
        unreachable!("hdd importer never resolves thread urls")
    }
}

struct UnusedContentHash;
#[async_trait]
impl ContentHashService for UnusedContentHash {
    async fn url_status(&self, _url: &str) -> ContractResult<(SeedStatus, Option<ContentHash>)> {
        unreachable!("hdd importer never checks url status")
    }
    async fn md5_status(&self, _md5: &[u8]) -> ContractResult<(SeedStatus, Option<ContentHash>)> {
        unreachable!("hdd importer never checks md5 status")
    }
}

struct UnusedFolderPersistence;
#[async_trait]
impl FolderConfigPersistence for UnusedFolderPersistence {
    async fn persist_folder(&self, _config: serde_json::Value) -> ContractResult<()> {
        unreachable!("hdd importer never persists folder config")
    }
}

#[derive(Default)]
struct CountingSink {
    update_status: AtomicUsize,
    add_media_results: AtomicUsize,
}

#[async_trait]
impl EventSink for CountingSink {
    async fn publish(&self, event: EventTopic) {
        match event {
            EventTopic::UpdateStatus { .. } => {
                self.update_status.fetch_add(1, Ordering::SeqCst);
            }
            EventTopic::AddMediaResults { .. } => {
                self.add_media_results.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

fn collaborators(events: Arc<dyn EventSink>) -> Collaborators {
    Collaborators {
        import_file: Arc::new(AlwaysSuccessfulImport),
        content_hash: Arc::new(UnusedContentHash),
        http: Arc::new(UnusedHttp),
        mime: Arc::new(UnusedMime),
        paths: Arc::new(UnusedPaths),
        folder_persistence: Arc::new(UnusedFolderPersistence),
        temp_files: Arc::new(UnusedTempFiles),
        thread_urls: Arc::new(UnusedThreadUrls),
        events,
    }
}

#[tokio::test]
async fn hdd_importer_runs_through_start_pause_resume_and_cancellation() {
    let sink = Arc::new(CountingSink::default());
    let importer = Arc::new(
        HddImporter::new(
            vec!["/a.jpg".to_string(), "/b.jpg".to_string()],
            Default::default(),
            false,
            ImportFileOptions::default(),
            sink.clone(),
        )
        .await,
    );

    let cancellation = CancellationToken::new();
    importer.clone().start(collaborators(sink.clone()), cancellation.clone()).await;

    // Drain until both seeds are terminal.
    for _ in 0..200 {
        let (_, (processed, total)) = importer.get_status().await;
        if processed == total {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (_, (processed, total)) = importer.get_status().await;
    assert_eq!((processed, total), (2, 2));
    assert_eq!(
        importer.seed_cache().get_seed_info(&Seed::new("/a.jpg")).unwrap().status,
        SeedStatus::Successful
    );
    assert!(sink.add_media_results.load(Ordering::SeqCst) >= 2);

    importer.pause().await;
    let before = sink.update_status.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    // Paused: still idling, no new seeds to process either way since both
    // are terminal, but pause must not panic or deadlock the control plane.
    assert!(sink.update_status.load(Ordering::SeqCst) >= before);

    importer.resume().await;
    importer.pause_play().await; // back to paused
    importer.pause_play().await; // back to running

    cancellation.cancel();
    tokio::time::sleep(Duration::from_millis(150)).await;
}
