//! The controller façade (C6): one bundle of trait objects every importer
//! is constructed with. Bundling these here, rather than threading eight
//! separate `Arc<dyn Trait>` fields through each importer, keeps the
//! polymorphism promised in `spec.md` §9 — four different importer structs
//! that still share one collaborator surface and can live behind a single
//! `Box<dyn Importer>`.

use std::sync::Arc;

use hoard_contracts::events::EventSink;
use hoard_contracts::http::HttpClient;
use hoard_contracts::import::{ContentHashService, ImportFileService};
use hoard_contracts::mime::MimeDetector;
use hoard_contracts::paths::PathExpander;
use hoard_contracts::persistence::FolderConfigPersistence;
use hoard_contracts::tempfile::TempFileProvider;
use hoard_contracts::thread_url::ThreadUrlResolver;

/// Every external interface named in `spec.md` §6, minus cancellation
/// (that's per-importer, supplied at `Start`, since each page has its own
/// lifecycle).
#[derive(Clone)]
pub struct Collaborators {
    pub import_file: Arc<dyn ImportFileService>,
    pub content_hash: Arc<dyn ContentHashService>,
    pub http: Arc<dyn HttpClient>,
    pub mime: Arc<dyn MimeDetector>,
    pub paths: Arc<dyn PathExpander>,
    pub folder_persistence: Arc<dyn FolderConfigPersistence>,
    pub temp_files: Arc<dyn TempFileProvider>,
    pub thread_urls: Arc<dyn ThreadUrlResolver>,
    pub events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
