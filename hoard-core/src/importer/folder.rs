//! Import Folder (C3): a recurring sweep of a single directory plus a
//! per-status post-import action pass, per `spec.md` §4.3.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hoard_contracts::events::EventTopic;
use hoard_contracts::import::ImportOutcome;
use hoard_contracts::types::{ContentHash, ImportFileOptions, SeedStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaborators::Collaborators;
use crate::importer::{Importer, PageKey, RunState, WorkerHandle, spawn_worker, wait_until_pubsubs_empty};
use crate::seed::Seed;
use crate::seed_cache::SeedCache;

/// What to do with a seed once it reaches a terminal status, per
/// `spec.md` §4.3 step 5.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostImportAction {
    Delete,
    Move { destination: PathBuf },
    Ignore,
}

/// Statuses the post-import action pass considers, in the fixed order
/// `spec.md` §4.3 step 5 lists them.
const POST_ACTION_STATUSES: [SeedStatus; 4] = [
    SeedStatus::Successful,
    SeedStatus::Redundant,
    SeedStatus::Deleted,
    SeedStatus::Failed,
];

#[derive(Clone, Debug, Serialize, Deserialize)]
struct FolderConfigSnapshot {
    path: PathBuf,
    period_seconds: u64,
    allowed_mimes: Vec<String>,
    post_actions: HashMap<SeedStatus, PostImportAction>,
    open_popup: bool,
}

pub struct FolderImporter {
    seed_cache: StdRwLock<Arc<SeedCache>>,
    run: Arc<RunState>,
    handle: AsyncMutex<Option<WorkerHandle>>,
    events: Arc<dyn hoard_contracts::events::EventSink>,
    path: StdRwLock<PathBuf>,
    period: Duration,
    last_checked: AsyncMutex<Option<DateTime<Utc>>>,
    allowed_mimes: AsyncRwLock<std::collections::HashSet<String>>,
    post_actions: AsyncRwLock<HashMap<SeedStatus, PostImportAction>>,
    open_popup: bool,
    tag: Option<(String, String)>,
    options: ImportFileOptions,
    page_key: PageKey,
}

impl std::fmt::Debug for FolderImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderImporter")
            .field("page_key", &self.page_key)
            .field("paused", &self.run.is_paused())
            .finish()
    }
}

impl FolderImporter {
    /// Per `spec.md` §6's serialization discipline; see
    /// `SeedCache::SERIALISABLE_VERSION`.
    pub const SERIALISABLE_VERSION: u16 = 1;

    pub fn new(
        path: PathBuf,
        period: Duration,
        allowed_mimes: std::collections::HashSet<String>,
        post_actions: HashMap<SeedStatus, PostImportAction>,
        open_popup: bool,
        tag: Option<(String, String)>,
        options: ImportFileOptions,
        events: Arc<dyn hoard_contracts::events::EventSink>,
    ) -> Self {
        Self {
            seed_cache: StdRwLock::new(Arc::new(SeedCache::new(events.clone()))),
            run: Arc::new(RunState::new()),
            handle: AsyncMutex::new(None),
            events,
            path: StdRwLock::new(path),
            period,
            last_checked: AsyncMutex::new(None),
            allowed_mimes: AsyncRwLock::new(allowed_mimes),
            post_actions: AsyncRwLock::new(post_actions),
            open_popup,
            tag,
            options,
            page_key: PageKey::new(),
        }
    }

    /// Changing `path` resets the cache, per `spec.md` §4.3.
    pub fn set_path(&self, path: PathBuf) {
        *self.path.write().expect("folder path lock poisoned") = path;
        let mut cache = self.seed_cache.write().expect("folder seed cache lock poisoned");
        *cache = Arc::new(SeedCache::new(self.events.clone()));
    }

    /// Changing the allowed MIME set purges every `UNINTERESTING_MIME`
    /// seed so it is re-evaluated on the next tick, per `spec.md` §4.3.
    pub async fn set_allowed_mimes(&self, mimes: std::collections::HashSet<String>) {
        *self.allowed_mimes.write().await = mimes;
        let cache = self.seed_cache.read().expect("folder seed cache lock poisoned").clone();
        cache.remove_seeds(SeedStatus::UninterestingMime).await;
    }

    fn path(&self) -> PathBuf {
        self.path.read().expect("folder path lock poisoned").clone()
    }

    fn cache(&self) -> Arc<SeedCache> {
        self.seed_cache.read().expect("folder seed cache lock poisoned").clone()
    }

    async fn tick(&self, collaborators: &Collaborators) {
        let cache = self.cache();
        let root = self.path();

        let discovered = match collaborators.paths.expand(&root).await {
            Ok(paths) => paths,
            Err(err) => {
                warn!(error = %err, "failed to expand folder path");
                return;
            }
        };
        for path in discovered {
            let seed = Seed::new(path.to_string_lossy().into_owned());
            if !cache.has_seed(&seed) {
                cache.add_seed(seed).await;
            }
        }

        let allowed = self.allowed_mimes.read().await.clone();
        let mut successful_hashes = Vec::new();
        while let Some(seed) = cache.get_next_seed(SeedStatus::Unknown) {
            let path = Path::new(seed.as_str());
            let mime = match collaborators.mime.detect(path).await {
                Ok(mime) => mime,
                Err(err) => {
                    warn!(%seed, error = %err, "mime probe failed");
                    let _ = cache
                        .update_seed_status(&seed, SeedStatus::Failed, err.to_string())
                        .await;
                    continue;
                }
            };
            if !allowed.contains(&mime.0) {
                let _ = cache
                    .update_seed_status(&seed, SeedStatus::UninterestingMime, "")
                    .await;
                continue;
            }

            let mut tags = HashMap::new();
            if let Some((service_key, tag)) = &self.tag {
                tags.insert(service_key.clone(), vec![tag.clone()]);
            }

            let outcome = collaborators
                .import_file
                .import_file(path, &self.options, &tags, true, None)
                .await;
            match outcome {
                Ok((status, import_outcome)) => {
                    let _ = cache.update_seed_status(&seed, status, "").await;
                    if status == SeedStatus::Successful {
                        successful_hashes.push(import_outcome.hash().clone());
                    }
                }
                Err(err) => {
                    let _ = cache
                        .update_seed_status(&seed, SeedStatus::Failed, err.to_string())
                        .await;
                }
            }
        }

        if !successful_hashes.is_empty() && self.open_popup {
            collaborators
                .events
                .publish(EventTopic::Message {
                    text: format!(
                        "imported {} file(s) from {}",
                        successful_hashes.len(),
                        root.display()
                    ),
                })
                .await;
        }

        self.run_post_import_actions(&cache, collaborators).await;

        *self.last_checked.lock().await = Some(Utc::now());
        let snapshot = self.config_snapshot().await;
        if let Ok(value) = serde_json::to_value(snapshot) {
            let _ = collaborators.folder_persistence.persist_folder(value).await;
        }
    }

    async fn config_snapshot(&self) -> FolderConfigSnapshot {
        FolderConfigSnapshot {
            path: self.path(),
            period_seconds: self.period.as_secs(),
            allowed_mimes: self.allowed_mimes.read().await.iter().cloned().collect(),
            post_actions: self.post_actions.read().await.clone(),
            open_popup: self.open_popup,
        }
    }

    async fn run_post_import_actions(&self, cache: &SeedCache, collaborators: &Collaborators) {
        let post_actions = self.post_actions.read().await.clone();
        for status in POST_ACTION_STATUSES {
            let Some(action) = post_actions.get(&status) else {
                continue;
            };
            match action {
                PostImportAction::Ignore => continue,
                PostImportAction::Delete => {
                    while let Some(seed) = cache.get_next_seed(status) {
                        let path = Path::new(seed.as_str());
                        if path.exists()
                            && let Err(err) = tokio::fs::remove_file(path).await
                        {
                            warn!(%seed, error = %err, "post-import delete failed, pausing");
                            self.run.pause();
                            collaborators
                                .events
                                .publish(EventTopic::Message {
                                    text: format!("failed to delete {}: {err}", path.display()),
                                })
                                .await;
                            return;
                        }
                        cache.remove_seed(&seed).await;
                    }
                }
                PostImportAction::Move { destination } => {
                    while let Some(seed) = cache.get_next_seed(status) {
                        let path = Path::new(seed.as_str());
                        if path.exists()
                            && let Err(err) = move_with_collision_retry(path, destination).await
                        {
                            warn!(%seed, error = %err, "post-import move failed, pausing");
                            self.run.pause();
                            collaborators
                                .events
                                .publish(EventTopic::Message {
                                    text: format!("failed to move {}: {err}", seed),
                                })
                                .await;
                            return;
                        }
                        cache.remove_seed(&seed).await;
                    }
                }
            }
        }
    }
}

/// Move `source` into `destination_dir`, appending one random decimal digit
/// at a time to the filename until the destination no longer collides. Per
/// `spec.md` S6: `pic.jpg` -> `pic.jpg3` -> `pic.jpg37` -> ...
async fn move_with_collision_retry(
    source: &Path,
    destination_dir: &Path,
) -> std::io::Result<()> {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut candidate = destination_dir.join(&file_name);
    let mut name = file_name;
    while tokio::fs::metadata(&candidate).await.is_ok() {
        let digit = rand::rng().random_range(0..10);
        name.push_str(&digit.to_string());
        candidate = destination_dir.join(&name);
    }
    tokio::fs::rename(source, &candidate).await
}

async fn worker_loop(
    importer: Arc<FolderImporter>,
    collaborators: Collaborators,
    cancellation: CancellationToken,
) {
    loop {
        if cancellation.is_cancelled() {
            info!(page_key = %importer.page_key, "folder importer worker exiting on cancellation");
            return;
        }

        if importer.run.is_paused() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            continue;
        }

        let due = {
            let last_checked = importer.last_checked.lock().await;
            match *last_checked {
                None => true,
                Some(last) => Utc::now() >= last + chrono::Duration::from_std(importer.period).unwrap_or_default(),
            }
        };

        if !due {
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        }

        importer.tick(&collaborators).await;

        let (status_text, _) = importer.cache().get_status();
        importer.run.set_status(status_text).await;
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
impl Importer for FolderImporter {
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
        let (_, counts) = self.cache().get_status();
        (self.run.status().await, counts)
    }

    fn seed_cache(&self) -> Arc<SeedCache> {
        self.cache()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_contracts::events::EventSink;
    use std::io::Write;

    #[derive(Default)]
    struct NullSink;
    #[async_trait]
    impl EventSink for NullSink {
        async fn publish(&self, _event: EventTopic) {}
    }

    fn importer(path: PathBuf) -> FolderImporter {
        FolderImporter::new(
            path,
            Duration::from_secs(300),
            ["image/jpeg".to_string()].into_iter().collect(),
            HashMap::new(),
            false,
            None,
            ImportFileOptions::default(),
            Arc::new(NullSink),
        )
    }

    #[tokio::test]
    async fn s6_move_with_collision_retry_appends_digits_until_unique() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();

        let collision = dst_dir.path().join("pic.jpg");
        std::fs::File::create(&collision).unwrap().write_all(b"x").unwrap();

        let source = src_dir.path().join("pic.jpg");
        std::fs::File::create(&source).unwrap().write_all(b"y").unwrap();

        move_with_collision_retry(&source, dst_dir.path()).await.unwrap();

        assert!(!source.exists());
        let mut entries: Vec<_> = std::fs::read_dir(dst_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&"pic.jpg".to_string()));
        assert!(entries.iter().any(|name| name.starts_with("pic.jpg") && name != "pic.jpg"));
    }

    #[test]
    fn set_path_resets_the_seed_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let importer = importer(tmp.path().to_path_buf());
        let before = importer.cache();
        importer.set_path(tmp.path().join("other"));
        let after = importer.cache();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn set_allowed_mimes_purges_uninteresting_mime_seeds() {
        let tmp = tempfile::tempdir().unwrap();
        let importer = importer(tmp.path().to_path_buf());
        let cache = importer.cache();
        cache.add_seed(Seed::new("boring.exe")).await;
        cache
            .update_seed_status(&Seed::new("boring.exe"), SeedStatus::UninterestingMime, "")
            .await
            .unwrap();
        cache.add_seed(Seed::new("keep.jpg")).await;
        cache
            .update_seed_status(&Seed::new("keep.jpg"), SeedStatus::Successful, "")
            .await
            .unwrap();

        importer
            .set_allowed_mimes(["image/jpeg".to_string(), "application/x-msdownload".to_string()].into_iter().collect())
            .await;

        let remaining = importer.cache().get_seeds();
        assert_eq!(remaining, vec![Seed::new("keep.jpg")]);
    }
}

