//! The `GetImageboardThreadURLs` collaborator (`spec.md` §6), used by the
//! thread watcher (C5) to turn a thread URL into the JSON API URL it
//! should poll, the prefix file URLs are built against, and the
//! human-facing URL it reports in status text.

use async_trait::async_trait;

use crate::error::Result;

/// A thread URL resolved into its three faces: the one the watcher
/// fetches (`api_url`), the prefix each post's `tim`/`ext` is appended to
/// (`file_base_url`), and the one it shows a human (`display_url`).
#[derive(Clone, Debug)]
pub struct ResolvedThreadUrl {
    pub api_url: String,
    pub file_base_url: String,
    pub display_url: String,
}

#[async_trait]
pub trait ThreadUrlResolver: Send + Sync {
    /// Resolve a thread URL as given by the user into its fetchable and
    /// displayable forms. Returns an error for a URL matching no known
    /// imageboard pattern.
    async fn resolve(&self, thread_url: &str) -> Result<ResolvedThreadUrl>;
}
