//! Minimal collaborator stand-ins shared by unit tests across importer
//! modules. None of these do real I/O; each importer's unit tests only
//! ever exercise the collaborators its worker body actually calls, so the
//! rest are "never called" stubs that panic if exercised.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use hoard_contracts::error::{ContractError, Result};
use hoard_contracts::http::{DownloadProgress, HttpClient, ProgressHook};
use hoard_contracts::import::{ContentHashService, ImportFileService, ImportOutcome};
use hoard_contracts::mime::{Mime, MimeDetector};
use hoard_contracts::paths::PathExpander;
use hoard_contracts::persistence::FolderConfigPersistence;
use hoard_contracts::tempfile::{TempDownload, TempFileProvider};
use hoard_contracts::thread_url::{ResolvedThreadUrl, ThreadUrlResolver};
use hoard_contracts::types::{ContentHash, ImportFileOptions, SeedStatus, TagMap};

struct NoopHttp;
#[async_trait]
impl HttpClient for NoopHttp {
    async fn fetch(
        &self,
        _url: &str,
        _destination: &Path,
        _on_progress: Option<&ProgressHook<'_>>,
    ) -> Result<DownloadProgress> {
        Err(ContractError::Other("NoopHttp::fetch not expected in this test".into()))
    }

    async fn fetch_text(&self, _url: &str) -> Result<String> {
        Err(ContractError::Other(
            "NoopHttp::fetch_text not expected in this test".into(),
        ))
    }
}

struct NoopMime;
#[async_trait]
impl MimeDetector for NoopMime {
    async fn detect(&self, _path: &Path) -> Result<Mime> {
        Ok(Mime("application/octet-stream".to_string()))
    }
}

struct NoopPaths;
#[async_trait]
impl PathExpander for NoopPaths {
    async fn expand(&self, _root: &Path) -> Result<Vec<std::path::PathBuf>> {
        Ok(Vec::new())
    }
}

struct NoopTempFiles;
#[async_trait]
impl TempFileProvider for NoopTempFiles {
    async fn reserve(&self, _extension_hint: Option<&str>) -> Result<TempDownload> {
        Err(ContractError::Other(
            "NoopTempFiles::reserve not expected in this test".into(),
        ))
    }
}

struct NoopThreadUrls;
#[async_trait]
impl ThreadUrlResolver for NoopThreadUrls {
    async fn resolve(&self, _thread_url: &str) -> Result<ResolvedThreadUrl> {
        Err(ContractError::Other(
            "NoopThreadUrls::resolve not expected in this test".into(),
        ))
    }
}

struct NoopFolderPersistence;
#[async_trait]
impl FolderConfigPersistence for NoopFolderPersistence {
    async fn persist_folder(&self, _config: serde_json::Value) -> Result<()> {
        Ok(())
    }
}

struct NoopContentHash;
#[async_trait]
impl ContentHashService for NoopContentHash {
    async fn url_status(&self, _url: &str) -> Result<(SeedStatus, Option<ContentHash>)> {
        Ok((SeedStatus::New, None))
    }

    async fn md5_status(&self, _md5: &[u8]) -> Result<(SeedStatus, Option<ContentHash>)> {
        Ok((SeedStatus::New, None))
    }
}

struct NoopImportFile;
#[async_trait]
impl ImportFileService for NoopImportFile {
    async fn import_file(
        &self,
        _path: &Path,
        _options: &ImportFileOptions,
        _tags: &TagMap,
        _generate_media_result: bool,
        _url: Option<&str>,
    ) -> Result<(SeedStatus, ImportOutcome)> {
        Err(ContractError::Other("NoopImportFile::import_file not expected in this test".into()))
    }

    async fn media_results(&self, _service_key: &str, _hashes: &[ContentHash]) -> Result<Vec<hoard_contracts::types::MediaResult>> {
        Ok(Vec::new())
    }

    async fn content_updates(&self, _service_key: &str, _hash: &ContentHash, _tags: &[String]) -> Result<()> {
        Ok(())
    }
}

pub fn noop_http() -> Arc<dyn HttpClient> {
    Arc::new(NoopHttp)
}

pub fn noop_mime() -> Arc<dyn MimeDetector> {
    Arc::new(NoopMime)
}

pub fn noop_paths() -> Arc<dyn PathExpander> {
    Arc::new(NoopPaths)
}

pub fn noop_temp_files() -> Arc<dyn TempFileProvider> {
    Arc::new(NoopTempFiles)
}

pub fn noop_thread_urls() -> Arc<dyn ThreadUrlResolver> {
    Arc::new(NoopThreadUrls)
}

pub fn noop_content_hash() -> Arc<dyn ContentHashService> {
    Arc::new(NoopContentHash)
}

pub fn noop_import_file() -> Arc<dyn ImportFileService> {
    Arc::new(NoopImportFile)
}

pub fn noop_folder_persistence() -> Arc<dyn FolderConfigPersistence> {
    Arc::new(NoopFolderPersistence)
}
