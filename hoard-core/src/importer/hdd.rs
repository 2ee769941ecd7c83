//! HDD Importer (C2): a one-shot batch import of a fixed list of local
//! paths, per `spec.md` §4.2.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hoard_contracts::events::EventTopic;
use hoard_contracts::import::ImportOutcome;
use hoard_contracts::types::{ImportFileOptions, SeedStatus, TagMap};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaborators::Collaborators;
use crate::importer::{Importer, PageKey, RunState, WorkerHandle, spawn_worker, wait_until_pubsubs_empty};
use crate::seed::Seed;
use crate::seed_cache::SeedCache;

/// One-shot local-path import pipeline. Created with a fixed path list;
/// once every seed reaches a terminal status the worker has nothing left
/// to do and idles at the 1-second poll until cancelled.
pub struct HddImporter {
    seed_cache: Arc<SeedCache>,
    run: Arc<RunState>,
    handle: AsyncMutex<Option<WorkerHandle>>,
    path_tags: HashMap<String, TagMap>,
    delete_after_success: bool,
    options: ImportFileOptions,
    page_key: PageKey,
}

impl std::fmt::Debug for HddImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HddImporter")
            .field("page_key", &self.page_key)
            .field("paused", &self.run.is_paused())
            .field("delete_after_success", &self.delete_after_success)
            .finish()
    }
}

async fn run_one_seed(
    seed_cache: &SeedCache,
    path_tags: &HashMap<String, TagMap>,
    options: &ImportFileOptions,
    delete_after_success: bool,
    seed: &Seed,
    collaborators: &Collaborators,
) {
    let path = Path::new(seed.as_str());
    let tags = path_tags.get(seed.as_str()).cloned().unwrap_or_default();

    let outcome = collaborators
        .import_file
        .import_file(path, options, &tags, true, None)
        .await;

    let (status, import_outcome) = match outcome {
        Ok(pair) => pair,
        Err(err) => {
            warn!(seed = %seed, error = %err, "hdd import failed");
            let _ = seed_cache
                .update_seed_status(seed, SeedStatus::Failed, err.to_string())
                .await;
            return;
        }
    };

    if let Err(err) = seed_cache
        .update_seed_status(seed, status, String::new())
        .await
    {
        warn!(seed = %seed, error = %err, "failed to record hdd import status");
        return;
    }

    if status.is_importable_outcome() {
        if let ImportOutcome::Full(media_result) = import_outcome {
            collaborators
                .events
                .publish(EventTopic::AddMediaResults {
                    results: vec![media_result],
                })
                .await;
        }

        // Deletes on REDUNDANT as well as SUCCESSFUL, matching the source
        // behavior preserved per spec.md open question 1.
        if delete_after_success
            && let Err(err) = tokio::fs::remove_file(path).await
        {
            warn!(seed = %seed, error = %err, "failed to delete source file after import");
        }
    }
}

async fn worker_loop(
    seed_cache: Arc<SeedCache>,
    run: Arc<RunState>,
    path_tags: HashMap<String, TagMap>,
    options: ImportFileOptions,
    delete_after_success: bool,
    page_key: PageKey,
    collaborators: Collaborators,
    cancellation: CancellationToken,
) {
    loop {
        if cancellation.is_cancelled() {
            info!(%page_key, "hdd importer worker exiting on cancellation");
            return;
        }

        if run.is_paused() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            continue;
        }

        let Some(seed) = seed_cache.get_next_seed(SeedStatus::Unknown) else {
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        };

        run_one_seed(
            &seed_cache,
            &path_tags,
            &options,
            delete_after_success,
            &seed,
            &collaborators,
        )
        .await;

        let (status_text, _) = seed_cache.get_status();
        run.set_status(status_text).await;
        collaborators
            .events
            .publish(EventTopic::UpdateStatus {
                importer_id: page_key.to_string(),
                status_text: run.status().await,
            })
            .await;
        wait_until_pubsubs_empty().await;
    }
}

impl HddImporter {
    /// Per `spec.md` §6's serialization discipline; see
    /// `SeedCache::SERIALISABLE_VERSION`.
    pub const SERIALISABLE_VERSION: u16 = 1;

    /// Construct with a fixed path list, seeding the cache with each path
    /// as an `UNKNOWN` seed. `path_tags` maps a path to its
    /// `service_key -> tags` mapping; paths absent from the map import
    /// with no tags.
    pub async fn new(
        paths: Vec<String>,
        path_tags: HashMap<String, TagMap>,
        delete_after_success: bool,
        options: ImportFileOptions,
        events: Arc<dyn hoard_contracts::events::EventSink>,
    ) -> Self {
        let seed_cache = Arc::new(SeedCache::new(events));
        for path in &paths {
            seed_cache.add_seed(Seed::new(path.clone())).await;
        }
        Self {
            seed_cache,
            run: Arc::new(RunState::new()),
            handle: AsyncMutex::new(None),
            path_tags,
            delete_after_success,
            options,
            page_key: PageKey::new(),
        }
    }
}

#[async_trait]
impl Importer for HddImporter {
    async fn start(self: Arc<Self>, collaborators: Collaborators, cancellation: CancellationToken) {
        let handle = spawn_worker(worker_loop(
            self.seed_cache.clone(),
            self.run.clone(),
            self.path_tags.clone(),
            self.options.clone(),
            self.delete_after_success,
            self.page_key,
            collaborators,
            cancellation,
        ));
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
