//! The `GetTempPath`/`CleanUpTempPath` collaborator pair (`spec.md` §6),
//! bundled here as a single RAII guard so importers can't forget the
//! cleanup half.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A scratch path reserved for one in-flight download. Dropping it schedules
/// best-effort cleanup; callers that want to observe cleanup failures should
/// call [`TempDownload::finish`] instead of letting it drop.
#[derive(Debug)]
pub struct TempDownload {
    path: PathBuf,
    cleaned_up: bool,
}

impl TempDownload {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleaned_up: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the temp path now, surfacing any IO error.
    pub async fn finish(mut self) -> Result<()> {
        if !self.path.exists() {
            self.cleaned_up = true;
            return Ok(());
        }
        tokio::fs::remove_file(&self.path).await?;
        self.cleaned_up = true;
        Ok(())
    }
}

impl Drop for TempDownload {
    fn drop(&mut self) {
        if self.cleaned_up {
            return;
        }
        let path = self.path.clone();
        // Best-effort: a dropped guard has no async context to await in, and
        // a leaked scratch file is a disk-hygiene nit, not a correctness bug.
        let _ = std::fs::remove_file(path);
    }
}

#[async_trait]
pub trait TempFileProvider: Send + Sync {
    /// Reserve a fresh scratch path, optionally hinting a file extension so
    /// MIME-sniffing-by-suffix collaborators still work on the temp copy.
    async fn reserve(&self, extension_hint: Option<&str>) -> Result<TempDownload>;
}
