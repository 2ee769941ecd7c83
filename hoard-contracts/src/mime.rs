//! The `GetMime` collaborator: sniff a file on disk and say whether the
//! embedding application's allowed-MIME set would even bother importing it.

use async_trait::async_trait;

use crate::error::Result;

/// Sniffed MIME, reported as its registered string (`"image/jpeg"`, etc).
/// Kept as a `String` rather than an enum since the allowed set is entirely
/// an embedding-application config concern (`spec.md` §6 non-goal).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Mime(pub String);

impl std::fmt::Display for Mime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait MimeDetector: Send + Sync {
    /// Sniff the file at `path` by content, not extension.
    async fn detect(&self, path: &std::path::Path) -> Result<Mime>;
}
