//! The four importer state machines (C2–C5) and the capability interface
//! they share, per `spec.md` §9: "a common capability interface... the
//! worker body differs per variant."

pub mod folder;
pub mod gallery;
pub mod hdd;
pub mod thread_watcher;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::collaborators::Collaborators;
use crate::seed_cache::SeedCache;

pub use folder::{FolderImporter, PostImportAction};
pub use gallery::GalleryImporter;
pub use hdd::HddImporter;
pub use thread_watcher::ThreadWatcherImporter;

/// Opaque identifier for the UI surface that owns an importer's worker
/// loop. `PageDeleted(page_key)` from `spec.md` §6 is how the worker learns
/// its owning page is gone.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct PageKey(pub uuid::Uuid);

impl PageKey {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for PageKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The capability interface shared by all four importer variants. The
/// worker body differs per implementation; everything else — lifecycle,
/// status reporting, persistence — is uniform.
#[async_trait]
pub trait Importer: Send + Sync {
    /// Launch the background worker. Returns once the worker task has been
    /// spawned, not once it finishes; the worker itself runs until
    /// `cancellation` fires or an unrecoverable collaborator fault occurs.
    /// Takes `Arc<Self>` rather than `&self` since the worker loop outlives
    /// the call and every importer variant needs to hand its own shared
    /// state into a spawned task.
    async fn start(self: Arc<Self>, collaborators: Collaborators, cancellation: CancellationToken);

    async fn pause(&self);
    async fn resume(&self);
    async fn pause_play(&self);

    /// Human status line plus the owned Seed Cache's `(processed, total)`.
    async fn get_status(&self) -> (String, (usize, usize));

    fn seed_cache(&self) -> Arc<SeedCache>;
}

/// Shared pause/running state every importer's non-cache fields include,
/// per `spec.md` §3 ("all importers additionally carry: paused, ...").
#[derive(Debug)]
pub struct RunState {
    pub paused: std::sync::atomic::AtomicBool,
    pub status_line: tokio::sync::Mutex<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            paused: std::sync::atomic::AtomicBool::new(false),
            status_line: tokio::sync::Mutex::new(String::new()),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn pause_play(&self) {
        self.paused
            .fetch_xor(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn set_status(&self, text: impl Into<String>) {
        *self.status_line.lock().await = text.into();
    }

    pub async fn status(&self) -> String {
        self.status_line.lock().await.clone()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Drains the pub/sub backpressure point named throughout `spec.md` §4 and
/// §5 (`WaitUntilPubSubsEmpty`). The typed `EventSink` this core uses has no
/// queue of its own to drain — the embedding application owns that — so
/// this is a no-op seam kept for parity with the original worker-loop
/// shape and as a place a future bounded-channel sink could hook in.
pub(crate) async fn wait_until_pubsubs_empty() {}

pub(crate) type WorkerHandle = tokio::task::JoinHandle<()>;

pub(crate) fn spawn_worker<F>(fut: F) -> WorkerHandle
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(fut)
}
