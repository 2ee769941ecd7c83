//! Trait surfaces that describe every collaborator the import pipeline core
//! depends on but does not implement: file ingestion, HTTP transport, MIME
//! detection, thread-URL resolution, recursive path expansion, scoped temp
//! files, and the event plane. Cancellation is not a collaborator trait —
//! every worker loop takes a plain `tokio_util::sync::CancellationToken`
//! directly, per `spec.md` §9's "replace the shared `view_shutdown` global
//! with an injected cancellation token"; an embedder gets the page-deleted
//! vs. application-shutdown distinction for free by handing each importer a
//! `.child_token()` of one process-wide token. Nothing in this crate touches
//! a disk, a socket, or a database — implementations live in the embedding
//! application.

pub mod error;
pub mod events;
pub mod http;
pub mod import;
pub mod mime;
pub mod paths;
pub mod persistence;
pub mod tempfile;
pub mod thread_url;
pub mod types;

/// Frequently used trait combinators for importer implementations.
pub mod prelude {
    pub use super::error::{ContractError, Result as ContractResult};
    pub use super::events::{EventSink, EventTopic};
    pub use super::http::{DownloadProgress, HttpClient, ProgressHook};
    pub use super::import::{ContentHashService, ImportFileService, ImportOutcome};
    pub use super::mime::MimeDetector;
    pub use super::paths::PathExpander;
    pub use super::persistence::FolderConfigPersistence;
    pub use super::tempfile::{TempDownload, TempFileProvider};
    pub use super::thread_url::ThreadUrlResolver;
    pub use super::types::{ContentHash, ImportFileOptions, MediaResult, SeedStatus, TagMap};
}
