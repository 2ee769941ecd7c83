//! Ingestion and lookup collaborators: `import_file`, `url_status`,
//! `md5_status`, `media_results`, `content_updates` from `spec.md` §6.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ContentHash, ImportFileOptions, MediaResult, SeedStatus, TagMap};

/// What `import_file` returns about the imported file, gated by the
/// `generate_media_result` flag. Mirrors the original returning either a
/// full media-result tuple or a bare hash.
#[derive(Clone, Debug)]
pub enum ImportOutcome {
    Full(MediaResult),
    HashOnly(ContentHash),
}

impl ImportOutcome {
    pub fn hash(&self) -> &ContentHash {
        match self {
            ImportOutcome::Full(result) => &result.hash,
            ImportOutcome::HashOnly(hash) => hash,
        }
    }
}

/// Ingests a local file into the backing library and looks up prior imports
/// by hash. This is the one collaborator every importer (C2–C5) ultimately
/// calls to turn a fetched/discovered file into a library entry.
#[async_trait]
pub trait ImportFileService: Send + Sync {
    /// Hash, store, and record `path` in the backing database.
    ///
    /// `url` is `Some` when the file arrived via HTTP (C4/C5), so the
    /// collaborator can record provenance; it is `None` for local-disk
    /// sources (C2/C3).
    async fn import_file(
        &self,
        path: &Path,
        options: &ImportFileOptions,
        service_keys_to_tags: &TagMap,
        generate_media_result: bool,
        url: Option<&str>,
    ) -> Result<(SeedStatus, ImportOutcome)>;

    /// Look up existing library records by hash.
    async fn media_results(
        &self,
        service_key: &str,
        hashes: &[ContentHash],
    ) -> Result<Vec<MediaResult>>;

    /// Attach tags to an already-imported hash (used when a redundant file
    /// carries tag-worthy metadata, e.g. an implied `filename:` tag).
    async fn content_updates(
        &self,
        service_key: &str,
        hash: &ContentHash,
        tags: &[String],
    ) -> Result<()>;
}

/// Pre-download dedup collaborators: has this URL or content hash already
/// been imported? Queried before spending a polite-wait slot on a GET.
#[async_trait]
pub trait ContentHashService: Send + Sync {
    /// `url_status(url) -> (status, hash)` from `spec.md` §6.
    async fn url_status(&self, url: &str) -> Result<(SeedStatus, Option<ContentHash>)>;

    /// `md5_status(md5_raw_bytes) -> (status, hash)` from `spec.md` §6.
    async fn md5_status(&self, md5: &[u8]) -> Result<(SeedStatus, Option<ContentHash>)>;
}
