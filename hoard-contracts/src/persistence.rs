//! The `import_folder(folder)` collaborator (`spec.md` §6): persisting an
//! Import Folder importer's configuration after a tick. The core does not
//! care how or where this lands — only that the embedding application is
//! told whenever the config (path, period, post-import actions, allowed
//! MIME set) changes.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait FolderConfigPersistence: Send + Sync {
    /// Persist the opaque folder-importer config blob. Called once per
    /// completed tick, and immediately after any configuration change
    /// (path, allowed MIME set, post-import actions).
    async fn persist_folder(&self, config: serde_json::Value) -> Result<()>;
}
