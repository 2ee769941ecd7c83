//! Thread-Watcher Importer (C5): periodic re-check of a JSON thread
//! endpoint, turning new posts into file-URL seeds carrying an MD5 and
//! original filename, per `spec.md` §4.5.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hoard_contracts::events::EventTopic;
use hoard_contracts::import::ImportOutcome;
use hoard_contracts::types::{ImportFileOptions, SeedStatus, TagMap};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaborators::Collaborators;
use crate::importer::{Importer, PageKey, RunState, WorkerHandle, spawn_worker, wait_until_pubsubs_empty};
use crate::seed::Seed;
use crate::seed_cache::SeedCache;

const MIN_CHECK_PERIOD: Duration = Duration::from_secs(hoard_config::MIN_CHECK_PERIOD_SECONDS);

/// A thread's JSON API shape, tolerant of posts with no attached file: a
/// post missing `md5` is simply not a file post, per the original's
/// `'md5' not in post -> continue`.
#[derive(Deserialize)]
struct ThreadJson {
    posts: Vec<ThreadPost>,
}

#[derive(Deserialize)]
struct ThreadPost {
    #[serde(default)]
    md5: Option<String>,
    #[serde(default)]
    tim: Option<i64>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    extra_files: Vec<ThreadPost>,
}

struct FileInfo {
    url: String,
    md5_base64: String,
    original_filename: String,
}

/// Flattens a post plus its `extra_files` into `(url, md5_base64,
/// original_filename)` triples, skipping any post/extra-file with no
/// `md5`, per `spec.md` §4.5.
fn file_infos(json: &ThreadJson, file_base_url: &str) -> Vec<FileInfo> {
    fn one(post: &ThreadPost, file_base_url: &str, out: &mut Vec<FileInfo>) {
        let (Some(md5), Some(tim), Some(ext)) = (&post.md5, post.tim, &post.ext) else {
            return;
        };
        let filename = post.filename.clone().unwrap_or_default();
        out.push(FileInfo {
            url: format!("{file_base_url}{tim}{ext}"),
            md5_base64: md5.clone(),
            original_filename: format!("{filename}{ext}"),
        });
    }

    let mut out = Vec::new();
    for post in &json.posts {
        one(post, file_base_url, &mut out);
        for extra in &post.extra_files {
            one(extra, file_base_url, &mut out);
        }
    }
    out
}

/// The persisted shape of a thread watcher's own fields, independent of
/// the seed cache it owns (which serializes separately via
/// `SeedCache::serialize`). Per `spec.md` §6, "every importer... is
/// serializable".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreadWatcherSnapshot {
    pub thread_url: String,
    pub times_to_check: u32,
    pub check_period_seconds: u64,
    pub last_time_checked: Option<DateTime<Utc>>,
    pub url_filenames: HashMap<String, String>,
    pub url_md5_base64: HashMap<String, String>,
}

/// Periodic JSON-endpoint watcher. One instance tracks one thread URL; an
/// empty `thread_url` means "not yet configured" and the worker idles
/// without ever performing HTTP, per `spec.md` §4.5's no-op branch.
pub struct ThreadWatcherImporter {
    seed_cache: Arc<SeedCache>,
    run: Arc<RunState>,
    handle: AsyncMutex<Option<WorkerHandle>>,
    thread_url: AsyncRwLock<String>,
    times_to_check: AsyncMutex<u32>,
    check_period: Duration,
    check_now: AtomicBool,
    last_time_checked: AsyncMutex<Option<DateTime<Utc>>>,
    url_filenames: AsyncMutex<HashMap<String, String>>,
    url_md5_base64: AsyncMutex<HashMap<String, String>>,
    filename_tag_service_key: Option<String>,
    polite_wait: Duration,
    options: ImportFileOptions,
    page_key: PageKey,
}

impl std::fmt::Debug for ThreadWatcherImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let thread_url = self
            .thread_url
            .try_read()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        f.debug_struct("ThreadWatcherImporter")
            .field("page_key", &self.page_key)
            .field("paused", &self.run.is_paused())
            .field("thread_url", &thread_url)
            .finish()
    }
}

impl ThreadWatcherImporter {
    /// Per `spec.md` §6's serialization discipline; see
    /// `SeedCache::SERIALISABLE_VERSION`.
    pub const SERIALISABLE_VERSION: u16 = 1;

    /// `check_period` is floored at [`hoard_config::MIN_CHECK_PERIOD_SECONDS`],
    /// mirroring `SetCheckPeriod` in the original.
    pub fn new(
        thread_url: String,
        times_to_check: u32,
        check_period: Duration,
        filename_tag_service_key: Option<String>,
        polite_wait: Duration,
        options: ImportFileOptions,
        events: Arc<dyn hoard_contracts::events::EventSink>,
    ) -> Self {
        Self {
            seed_cache: Arc::new(SeedCache::new(events)),
            run: Arc::new(RunState::new()),
            handle: AsyncMutex::new(None),
            thread_url: AsyncRwLock::new(thread_url),
            times_to_check: AsyncMutex::new(times_to_check),
            check_period: check_period.max(MIN_CHECK_PERIOD),
            check_now: AtomicBool::new(false),
            last_time_checked: AsyncMutex::new(None),
            url_filenames: AsyncMutex::new(HashMap::new()),
            url_md5_base64: AsyncMutex::new(HashMap::new()),
            filename_tag_service_key,
            polite_wait,
            options,
            page_key: PageKey::new(),
        }
    }

    /// `CheckNow`: force a one-shot poll on the next iteration, bypassing
    /// `check_period` but still respecting `MIN_CHECK_PERIOD`.
    pub fn check_now(&self) {
        self.check_now.store(true, Ordering::SeqCst);
    }

    pub async fn has_thread(&self) -> bool {
        !self.thread_url.read().await.is_empty()
    }

    pub async fn set_thread_url(&self, thread_url: String) {
        *self.thread_url.write().await = thread_url;
    }

    /// `Serialize`: this importer's own fields, per `spec.md` §6. Callers
    /// combine this with `self.seed_cache().serialize()` to reconstruct
    /// the full persisted state.
    pub async fn serialize(&self) -> ThreadWatcherSnapshot {
        ThreadWatcherSnapshot {
            thread_url: self.thread_url.read().await.clone(),
            times_to_check: *self.times_to_check.lock().await,
            check_period_seconds: self.check_period.as_secs(),
            last_time_checked: *self.last_time_checked.lock().await,
            url_filenames: self.url_filenames.lock().await.clone(),
            url_md5_base64: self.url_md5_base64.lock().await.clone(),
        }
    }

    /// `_WorkOnThread`: polls if due, else refreshes the idle status line.
    /// Returns `true` if this call performed an HTTP fetch (so the caller
    /// applies the appropriate wait).
    async fn poll_thread(&self, collaborators: &Collaborators) -> bool {
        let now = Utc::now();
        let check_now = self.check_now.load(Ordering::SeqCst);
        let last = *self.last_time_checked.lock().await;
        let times_left = *self.times_to_check.lock().await;

        let due = |period: Duration| {
            let period = chrono::Duration::from_std(period).unwrap_or_default();
            last.is_none_or(|last| now >= last + period)
        };
        let p1 = check_now && due(MIN_CHECK_PERIOD);
        let p2 = times_left > 0 && due(self.check_period);

        if !p1 && !p2 {
            if check_now || times_left > 0 {
                let delay = if check_now { MIN_CHECK_PERIOD } else { self.check_period };
                let delay = chrono::Duration::from_std(delay).unwrap_or_default();
                let remaining = last
                    .map(|last| (last + delay) - now)
                    .unwrap_or_default()
                    .num_seconds()
                    .max(0);
                self.run
                    .set_status(format!("checking again in {remaining} seconds"))
                    .await;
            } else {
                self.run.set_status("checking finished").await;
            }
            return false;
        }

        self.run.set_status("checking thread").await;

        let thread_url = self.thread_url.read().await.clone();
        let resolved = match collaborators.thread_urls.resolve(&thread_url).await {
            Ok(resolved) => resolved,
            Err(err) => {
                self.run.set_status(err.to_string()).await;
                *self.last_time_checked.lock().await = Some(now);
                return false;
            }
        };

        let raw_json = match collaborators.http.fetch_text(&resolved.api_url).await {
            Ok(body) => body,
            Err(err) => {
                let message = err.to_string();
                if message.contains("404") {
                    self.run.set_status("thread 404").await;
                    let prior = {
                        let mut times_to_check = self.times_to_check.lock().await;
                        let prior = *times_to_check;
                        *times_to_check = 0;
                        prior
                    };
                    for _ in 0..prior {
                        collaborators
                            .events
                            .publish(EventTopic::DecrementTimesToCheck { by: 1 })
                            .await;
                    }
                } else {
                    self.run.set_status(message).await;
                    self.advance_check_counter(collaborators).await;
                }
                *self.last_time_checked.lock().await = Some(now);
                tokio::time::sleep(Duration::from_secs(5)).await;
                return true;
            }
        };

        let num_new = match serde_json::from_str::<ThreadJson>(&raw_json) {
            Ok(parsed) => self.ingest_file_infos(file_infos(&parsed, &resolved.file_base_url)).await,
            Err(err) => {
                warn!(thread_url = %resolved.display_url, error = %err, "thread json parse failed");
                self.run.set_status(err.to_string()).await;
                self.advance_check_counter(collaborators).await;
                *self.last_time_checked.lock().await = Some(now);
                tokio::time::sleep(Duration::from_secs(5)).await;
                return true;
            }
        };

        self.run
            .set_status(format!("thread checked OK - {num_new} new files"))
            .await;
        self.advance_check_counter(collaborators).await;
        *self.last_time_checked.lock().await = Some(now);
        true
    }

    /// Shared tail of a completed poll attempt (success or non-404 error):
    /// clear a one-shot `check_now`, or decrement the ongoing counter and
    /// publish one `decrement_times_to_check` event.
    async fn advance_check_counter(&self, collaborators: &Collaborators) {
        if self.check_now.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut times_to_check = self.times_to_check.lock().await;
        *times_to_check = times_to_check.saturating_sub(1);
        drop(times_to_check);
        collaborators
            .events
            .publish(EventTopic::DecrementTimesToCheck { by: 1 })
            .await;
    }

    async fn ingest_file_infos(&self, infos: Vec<FileInfo>) -> usize {
        let mut num_new = 0;
        for info in infos {
            let seed = Seed::new(info.url.clone());
            if self.seed_cache.has_seed(&seed) {
                continue;
            }
            num_new += 1;
            self.seed_cache.add_seed(seed).await;
            self.url_filenames
                .lock()
                .await
                .insert(info.url.clone(), info.original_filename);
            self.url_md5_base64.lock().await.insert(info.url, info.md5_base64);
        }
        num_new
    }

    /// `_WorkOnFiles`: dedup by content hash before ever downloading.
    async fn work_on_files(&self, collaborators: &Collaborators) -> bool {
        let Some(seed) = self.seed_cache.get_next_seed(SeedStatus::Unknown) else {
            return false;
        };
        let url = seed.as_str().to_string();

        let md5_base64 = self.url_md5_base64.lock().await.get(&url).cloned();
        let original_filename = self.url_filenames.lock().await.get(&url).cloned();

        let md5_bytes = match md5_base64.as_deref().map(|b| BASE64.decode(b)) {
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) => {
                let _ = self
                    .seed_cache
                    .update_seed_status(&seed, SeedStatus::Failed, err.to_string())
                    .await;
                return true;
            }
            None => {
                let _ = self
                    .seed_cache
                    .update_seed_status(&seed, SeedStatus::Failed, "no md5 recorded for this url")
                    .await;
                return true;
            }
        };

        let tags = self.filename_tags(original_filename.as_deref());

        let lookup = match collaborators.content_hash.md5_status(&md5_bytes).await {
            Ok(lookup) => lookup,
            Err(err) => {
                let _ = self
                    .seed_cache
                    .update_seed_status(&seed, SeedStatus::Failed, err.to_string())
                    .await;
                return true;
            }
        };

        match lookup {
            (SeedStatus::Redundant, Some(hash)) => {
                if let Some((service_key, implied_tags)) = &tags
                    && !implied_tags.is_empty()
                {
                    let _ = collaborators
                        .import_file
                        .content_updates(service_key, &hash, implied_tags)
                        .await;
                    collaborators
                        .events
                        .publish(EventTopic::ContentUpdated { hash: hash.clone() })
                        .await;
                }
                let results = collaborators
                    .import_file
                    .media_results("local", std::slice::from_ref(&hash))
                    .await
                    .unwrap_or_default();
                let _ = self
                    .seed_cache
                    .update_seed_status(&seed, SeedStatus::Redundant, "")
                    .await;
                if !results.is_empty() {
                    collaborators
                        .events
                        .publish(EventTopic::AddMediaResults { results })
                        .await;
                }
            }
            _ => {
                self.download_and_import(&seed, &url, tags, collaborators).await;
                tokio::time::sleep(self.polite_wait).await;
            }
        }
        true
    }

    /// Builds the `service_key -> ["filename:<name>"]` tag map the
    /// original implies from the recorded original filename, when this
    /// watcher was constructed with a tag service to attach it under.
    fn filename_tags(&self, original_filename: Option<&str>) -> Option<(String, Vec<String>)> {
        let service_key = self.filename_tag_service_key.clone()?;
        let filename = original_filename?;
        Some((service_key, vec![format!("filename:{filename}")]))
    }

    async fn download_and_import(
        &self,
        seed: &Seed,
        url: &str,
        tags: Option<(String, Vec<String>)>,
        collaborators: &Collaborators,
    ) {
        let temp = match collaborators.temp_files.reserve(None).await {
            Ok(temp) => temp,
            Err(err) => {
                let _ = self
                    .seed_cache
                    .update_seed_status(seed, SeedStatus::Failed, err.to_string())
                    .await;
                return;
            }
        };

        if let Err(err) = collaborators.http.fetch(url, temp.path(), None).await {
            let _ = self
                .seed_cache
                .update_seed_status(seed, SeedStatus::Failed, err.to_string())
                .await;
            let _ = temp.finish().await;
            return;
        }

        let mut service_keys_to_tags = TagMap::new();
        if let Some((service_key, implied_tags)) = tags {
            service_keys_to_tags.insert(service_key, implied_tags);
        }

        let result = collaborators
            .import_file
            .import_file(temp.path(), &self.options, &service_keys_to_tags, true, Some(url))
            .await;
        let _ = temp.finish().await;

        match result {
            Ok((status, outcome)) => {
                let _ = self.seed_cache.update_seed_status(seed, status, "").await;
                if status.is_importable_outcome()
                    && let ImportOutcome::Full(media_result) = outcome
                {
                    collaborators
                        .events
                        .publish(EventTopic::AddMediaResults {
                            results: vec![media_result],
                        })
                        .await;
                }
            }
            Err(err) => {
                let _ = self
                    .seed_cache
                    .update_seed_status(seed, SeedStatus::Failed, err.to_string())
                    .await;
            }
        }
    }
}

async fn worker_loop(
    importer: Arc<ThreadWatcherImporter>,
    collaborators: Collaborators,
    cancellation: CancellationToken,
) {
    loop {
        if cancellation.is_cancelled() {
            info!(page_key = %importer.page_key, "thread watcher worker exiting on cancellation");
            return;
        }

        if importer.run.is_paused() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            continue;
        }

        if importer.has_thread().await {
            importer.poll_thread(&collaborators).await;
            importer.work_on_files(&collaborators).await;
        }

        tokio::time::sleep(Duration::from_secs(1)).await;

        collaborators
            .events
            .publish(EventTopic::UpdateStatus {
                importer_id: importer.page_key.to_string(),
                status_text: importer.run.status().await,
            })
            .await;
        wait_until_pubsubs_empty().await;
    }
}

#[async_trait]
impl Importer for ThreadWatcherImporter {
    async fn start(self: Arc<Self>, collaborators: Collaborators, cancellation: CancellationToken) {
        let handle = spawn_worker(worker_loop(self.clone(), collaborators, cancellation));
        *self.handle.lock().await = Some(handle);
    }

    async fn pause(&self) {
        self.run.pause();
    }

    async fn resume(&self) {
        self.run.resume();
    }

    async fn pause_play(&self) {
        self.run.pause_play();
    }

    async fn get_status(&self) -> (String, (usize, usize)) {
        let (_, counts) = self.seed_cache.get_status();
        (self.run.status().await, counts)
    }

    fn seed_cache(&self) -> Arc<SeedCache> {
        self.seed_cache.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_contracts::error::{ContractError, Result as ContractResult};
    use hoard_contracts::events::EventSink;
    use hoard_contracts::thread_url::{ResolvedThreadUrl, ThreadUrlResolver};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        events: StdMutex<Vec<EventTopic>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn publish(&self, event: EventTopic) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn count_decrements(sink: &RecordingSink) -> usize {
        sink.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, EventTopic::DecrementTimesToCheck { .. }))
            .count()
    }

    struct FixedResolver;
    #[async_trait]
    impl ThreadUrlResolver for FixedResolver {
        async fn resolve(&self, _thread_url: &str) -> ContractResult<ResolvedThreadUrl> {
            Ok(ResolvedThreadUrl {
                api_url: "https://example.com/thread.json".to_string(),
                file_base_url: "https://example.com/files/".to_string(),
                display_url: "https://example.com/thread".to_string(),
            })
        }
    }

    struct NotFoundHttp;
    #[async_trait]
    impl hoard_contracts::http::HttpClient for NotFoundHttp {
        async fn fetch(
            &self,
            _url: &str,
            _destination: &std::path::Path,
            _on_progress: Option<&hoard_contracts::http::ProgressHook<'_>>,
        ) -> ContractResult<hoard_contracts::http::DownloadProgress> {
            Err(ContractError::NotFound("no such file".into()))
        }

        async fn fetch_text(&self, _url: &str) -> ContractResult<String> {
            Err(ContractError::NotFound("404 not found".into()))
        }
    }

    fn collaborators(sink: Arc<RecordingSink>) -> Collaborators {
        Collaborators {
            import_file: crate::test_fakes::noop_import_file(),
            content_hash: crate::test_fakes::noop_content_hash(),
            http: Arc::new(NotFoundHttp),
            mime: crate::test_fakes::noop_mime(),
            paths: crate::test_fakes::noop_paths(),
            folder_persistence: crate::test_fakes::noop_folder_persistence(),
            temp_files: crate::test_fakes::noop_temp_files(),
            thread_urls: Arc::new(FixedResolver),
            events: sink,
        }
    }

    #[tokio::test]
    async fn s5_thread_watcher_404_zeroes_counter_and_decrements_per_prior_value() {
        let sink = Arc::new(RecordingSink::default());
        let importer = ThreadWatcherImporter::new(
            "https://example.com/thread".to_string(),
            5,
            Duration::from_secs(300),
            None,
            Duration::ZERO,
            ImportFileOptions::default(),
            sink.clone(),
        );

        importer.poll_thread(&collaborators(sink.clone())).await;

        assert_eq!(*importer.times_to_check.lock().await, 0);
        assert_eq!(count_decrements(&sink), 5);
        assert_eq!(importer.run.status().await, "thread 404");
    }

    #[tokio::test]
    async fn idle_watcher_with_no_checks_left_reports_checking_finished() {
        let sink = Arc::new(RecordingSink::default());
        let importer = ThreadWatcherImporter::new(
            "https://example.com/thread".to_string(),
            0,
            Duration::from_secs(300),
            None,
            Duration::ZERO,
            ImportFileOptions::default(),
            sink.clone(),
        );

        let did_http = importer.poll_thread(&collaborators(sink)).await;

        assert!(!did_http);
        assert_eq!(importer.run.status().await, "checking finished");
    }

    #[test]
    fn file_infos_skips_posts_without_md5_and_flattens_extra_files() {
        let json: ThreadJson = serde_json::from_str(
            r#"{
                "posts": [
                    {"tim": 111, "ext": ".jpg", "filename": "a"},
                    {
                        "md5": "bWQ1aGFzaA==",
                        "tim": 222,
                        "ext": ".png",
                        "filename": "b",
                        "extra_files": [
                            {"md5": "ZXh0cmE=", "tim": 333, "ext": ".gif", "filename": "c"}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        let infos = file_infos(&json, "https://example.com/files/");
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].url, "https://example.com/files/222.png");
        assert_eq!(infos[0].original_filename, "b.png");
        assert_eq!(infos[1].url, "https://example.com/files/333.gif");
    }

    #[test]
    fn check_period_floors_at_minimum() {
        let importer = ThreadWatcherImporter::new(
            String::new(),
            1,
            Duration::from_secs(1),
            None,
            Duration::ZERO,
            ImportFileOptions::default(),
            Arc::new(RecordingSink::default()),
        );
        assert_eq!(importer.check_period, MIN_CHECK_PERIOD);
    }
}
