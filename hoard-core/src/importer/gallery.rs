//! Page-of-Images Importer (C4): a FIFO of page URLs, each scraped into a
//! set of file-URL seeds that get downloaded and imported, per `spec.md`
//! §4.4.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hoard_contracts::events::EventTopic;
use hoard_contracts::import::ImportOutcome;
use hoard_contracts::types::{ImportFileOptions, SeedStatus, TagMap};
use scraper::{Html, Selector};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::collaborators::Collaborators;
use crate::importer::{Importer, PageKey, RunState, WorkerHandle, spawn_worker, wait_until_pubsubs_empty};
use crate::seed::Seed;
use crate::seed_cache::SeedCache;

pub struct GalleryImporter {
    seed_cache: Arc<SeedCache>,
    run: Arc<RunState>,
    handle: AsyncMutex<Option<WorkerHandle>>,
    pending_page_urls: AsyncMutex<Vec<String>>,
    download_image_links: bool,
    download_unlinked_images: bool,
    gallery_file_limit: usize,
    polite_wait: Duration,
    options: ImportFileOptions,
    page_key: PageKey,
}

impl std::fmt::Debug for GalleryImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self
            .pending_page_urls
            .try_lock()
            .map(|guard| guard.len())
            .unwrap_or_default();
        f.debug_struct("GalleryImporter")
            .field("page_key", &self.page_key)
            .field("paused", &self.run.is_paused())
            .field("pending_page_urls", &pending)
            .finish()
    }
}

impl GalleryImporter {
    /// Per `spec.md` §6's serialization discipline; see
    /// `SeedCache::SERIALISABLE_VERSION`.
    pub const SERIALISABLE_VERSION: u16 = 1;

    pub fn new(
        download_image_links: bool,
        download_unlinked_images: bool,
        gallery_file_limit: usize,
        polite_wait: Duration,
        options: ImportFileOptions,
        events: Arc<dyn hoard_contracts::events::EventSink>,
    ) -> Self {
        Self {
            seed_cache: Arc::new(SeedCache::new(events)),
            run: Arc::new(RunState::new()),
            handle: AsyncMutex::new(None),
            pending_page_urls: AsyncMutex::new(Vec::new()),
            download_image_links,
            download_unlinked_images,
            gallery_file_limit,
            polite_wait,
            options,
            page_key: PageKey::new(),
        }
    }

    /// `PendPageURL`: appends iff absent.
    pub async fn pend_page_url(&self, url: String) {
        let mut pending = self.pending_page_urls.lock().await;
        if !pending.contains(&url) {
            pending.push(url);
        }
    }

    /// `AdvancePageURL`: swap with the preceding element.
    pub async fn advance_page_url(&self, url: &str) {
        let mut pending = self.pending_page_urls.lock().await;
        if let Some(pos) = pending.iter().position(|u| u == url)
            && pos > 0
        {
            pending.swap(pos, pos - 1);
        }
    }

    /// `DelayPageURL`: swap with the following element.
    pub async fn delay_page_url(&self, url: &str) {
        let mut pending = self.pending_page_urls.lock().await;
        if let Some(pos) = pending.iter().position(|u| u == url)
            && pos + 1 < pending.len()
        {
            pending.swap(pos, pos + 1);
        }
    }

    /// `DeletePageURL`: removes.
    pub async fn delete_page_url(&self, url: &str) {
        self.pending_page_urls.lock().await.retain(|u| u != url);
    }

    /// Phase A: `_WorkOnQueue`. Per `spec.md` §9 open question 2, the
    /// early-return when a file URL is still outstanding means new pages
    /// are only parsed once the file queue has fully drained — subtle, but
    /// harmless since the worker loop runs queue-then-files every
    /// iteration anyway.
    async fn work_on_queue(&self, collaborators: &Collaborators) -> bool {
        let run = &self.run;
        if self.seed_cache.get_next_seed(SeedStatus::Unknown).is_some() {
            return false;
        }
        if self.seed_cache.get_seeds().len() >= self.gallery_file_limit {
            return false;
        }

        let page_url = {
            let mut pending = self.pending_page_urls.lock().await;
            if pending.is_empty() {
                return false;
            }
            pending.remove(0)
        };

        run.set_status(format!("checking {page_url}")).await;

        let body = match collaborators.http.fetch_text(&page_url).await {
            Ok(body) => body,
            Err(err) => {
                let message = err.to_string();
                if message.contains("404") {
                    run.set_status("page 404").await;
                } else {
                    run.set_status(message).await;
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
                return true;
            }
        };

        let file_urls = extract_file_urls(
            &body,
            &page_url,
            self.download_image_links,
            self.download_unlinked_images,
        );

        let mut added = 0usize;
        for url in file_urls {
            let seed = Seed::new(url);
            if !self.seed_cache.has_seed(&seed) {
                self.seed_cache.add_seed(seed).await;
                added += 1;
            }
        }
        run.set_status(format!("found {added} new file(s) on {page_url}"))
            .await;
        tokio::time::sleep(self.polite_wait).await;
        true
    }

    /// Phase B: `_WorkOnFiles`.
    async fn work_on_files(&self, collaborators: &Collaborators) -> bool {
        let Some(seed) = self.seed_cache.get_next_seed(SeedStatus::Unknown) else {
            return false;
        };
        let url = seed.as_str().to_string();

        let lookup = match collaborators.content_hash.url_status(&url).await {
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
            (SeedStatus::Deleted, _) => {
                let _ = self
                    .seed_cache
                    .update_seed_status(&seed, SeedStatus::Deleted, "")
                    .await;
            }
            _ => {
                self.download_and_import(&seed, &url, collaborators).await;
                tokio::time::sleep(self.polite_wait).await;
            }
        }
        true
    }

    async fn download_and_import(&self, seed: &Seed, url: &str, collaborators: &Collaborators) {
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

        let fetch = collaborators.http.fetch(url, temp.path(), None).await;
        if let Err(err) = fetch {
            let _ = self
                .seed_cache
                .update_seed_status(seed, SeedStatus::Failed, err.to_string())
                .await;
            let _ = temp.finish().await;
            return;
        }

        let tags = TagMap::new();
        let result = collaborators
            .import_file
            .import_file(temp.path(), &self.options, &tags, true, Some(url))
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

/// Derives the file-URL list from a parsed page per `spec.md` §4.4 /
/// S4: anchors wrapping an `<img>` contribute their `href` iff
/// `download_image_links`; bare `<img>` tags not contained in any such
/// anchor contribute their `src` iff `download_unlinked_images`.
fn extract_file_urls(
    html: &str,
    page_url: &str,
    download_image_links: bool,
    download_unlinked_images: bool,
) -> Vec<String> {
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a").expect("static selector");
    let img_selector = Selector::parse("img").expect("static selector");

    let base = Url::parse(page_url).ok();
    let join = |raw: &str| -> Option<String> {
        match &base {
            Some(base) => base.join(raw).ok().map(|u| u.to_string()),
            None => Some(raw.to_string()),
        }
    };

    let mut urls = Vec::new();
    let mut linked_img_refs = std::collections::HashSet::new();

    for anchor in document.select(&anchor_selector) {
        let images: Vec<_> = anchor.select(&img_selector).collect();
        if images.is_empty() {
            continue;
        }
        for img in &images {
            if let Some(src) = img.value().attr("src") {
                linked_img_refs.insert(src.to_string());
            }
        }
        if download_image_links
            && let Some(href) = anchor.value().attr("href")
            && let Some(joined) = join(href)
        {
            urls.push(joined);
        }
    }

    if download_unlinked_images {
        for img in document.select(&img_selector) {
            let Some(src) = img.value().attr("src") else {
                continue;
            };
            if linked_img_refs.contains(src) {
                continue;
            }
            if let Some(joined) = join(src) {
                urls.push(joined);
            }
        }
    }

    urls
}

async fn worker_loop(importer: Arc<GalleryImporter>, collaborators: Collaborators, cancellation: CancellationToken) {
    loop {
        if cancellation.is_cancelled() {
            info!(page_key = %importer.page_key, "gallery importer worker exiting on cancellation");
            return;
        }
        if importer.run.is_paused() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            continue;
        }

        let did_queue_work = importer.work_on_queue(&collaborators).await;
        let did_file_work = importer.work_on_files(&collaborators).await;

        if !did_queue_work && !did_file_work {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

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
impl Importer for GalleryImporter {
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
    use hoard_contracts::http::{DownloadProgress, HttpClient, ProgressHook};

    #[test]
    fn s4_mixed_links_respects_flags() {
        let html = r#"<a href="/1.jpg"><img src="/1-thumb.jpg"></a><img src="/2.jpg">"#;
        let page_url = "https://example.com/gallery";

        let only_linked = extract_file_urls(html, page_url, true, false);
        assert_eq!(only_linked, vec!["https://example.com/1.jpg".to_string()]);

        let mut both = extract_file_urls(html, page_url, true, true);
        both.sort();
        assert_eq!(
            both,
            vec![
                "https://example.com/1.jpg".to_string(),
                "https://example.com/2.jpg".to_string(),
            ]
        );
    }

    struct PanicsOnFetch;
    #[async_trait]
    impl HttpClient for PanicsOnFetch {
        async fn fetch(
            &self,
            _url: &str,
            _destination: &std::path::Path,
            _on_progress: Option<&ProgressHook<'_>>,
        ) -> ContractResult<DownloadProgress> {
            panic!("idle gallery importer must not perform HTTP");
        }

        async fn fetch_text(&self, _url: &str) -> ContractResult<String> {
            panic!("idle gallery importer must not perform HTTP");
        }
    }

    #[derive(Default)]
    struct NullSink;
    #[async_trait]
    impl EventSink for NullSink {
        async fn publish(&self, _event: EventTopic) {}
    }

    /// W9: with no pending pages and no `UNKNOWN` file URL, both worker
    /// phases are no-ops and neither touches HTTP.
    #[tokio::test]
    async fn w9_idle_importer_performs_no_http() {
        let importer = GalleryImporter::new(
            true,
            true,
            200,
            Duration::ZERO,
            ImportFileOptions::default(),
            Arc::new(NullSink),
        );
        let collaborators = Collaborators {
            import_file: crate::test_fakes::noop_import_file(),
            content_hash: crate::test_fakes::noop_content_hash(),
            http: Arc::new(PanicsOnFetch),
            mime: crate::test_fakes::noop_mime(),
            paths: crate::test_fakes::noop_paths(),
            folder_persistence: crate::test_fakes::noop_folder_persistence(),
            temp_files: crate::test_fakes::noop_temp_files(),
            thread_urls: crate::test_fakes::noop_thread_urls(),
            events: Arc::new(NullSink),
        };

        let did_queue_work = importer.work_on_queue(&collaborators).await;
        let did_file_work = importer.work_on_files(&collaborators).await;

        assert!(!did_queue_work);
        assert!(!did_file_work);
        assert!(importer.run.status().await.is_empty());
    }
}
