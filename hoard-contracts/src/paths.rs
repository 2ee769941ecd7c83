//! The `GetAllPaths` collaborator: recursive directory expansion for the
//! folder importer (C3), kept out of `hoard-core` so the embedding
//! application can apply its own filters (hidden files, symlink policy,
//! extension allowlists) before a path ever becomes a seed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[async_trait]
pub trait PathExpander: Send + Sync {
    /// Recursively list every importable file under `root`, in the order
    /// they should be queued. Directories that vanish mid-walk are skipped,
    /// not errored.
    async fn expand(&self, root: &Path) -> Result<Vec<PathBuf>>;
}
