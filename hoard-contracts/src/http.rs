//! The `DoHTTP` collaborator: a GET with polite-wait and redirect handling
//! left to the implementation, returning enough to stream a body to disk.

use async_trait::async_trait;

use crate::error::Result;

/// Bytes-so-far/total-if-known callback, invoked as a download streams to
/// disk. `total` is `None` when the response carried no `Content-Length`.
pub type ProgressHook<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

/// What a completed `HttpClient::fetch` reports back about the response,
/// independent of where the body ended up (that's `TempFileProvider`'s job).
#[derive(Clone, Debug)]
pub struct DownloadProgress {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes_written: u64,
}

/// Thin GET-and-stream-to-path transport. Importers never see a connection
/// pool or a TLS config; they see "fetch this URL into this path".
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch `url` and write the body to `destination`, invoking `on_progress`
    /// as bytes arrive. Collaborators own retry/backoff policy; this call
    /// either completes the download or returns an error.
    async fn fetch(
        &self,
        url: &str,
        destination: &std::path::Path,
        on_progress: Option<&ProgressHook<'_>>,
    ) -> Result<DownloadProgress>;

    /// Fetch `url` and return the body as text, used for thread/gallery JSON
    /// and HTML pages that never touch disk.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}
