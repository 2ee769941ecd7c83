//! The event-sink collaborator: every `pub(topic, payload)` call named in
//! `spec.md` §6, collected into one typed enum so the embedding application
//! implements a single `EventSink::publish` instead of five ad-hoc callbacks.

use async_trait::async_trait;

use crate::types::{ContentHash, MediaResult, SeedStatus};

/// One published event, tagged by the topic name `spec.md` uses. Carries
/// just enough to let a UI redraw or a subscriber fan out, nothing the core
/// itself needs back.
#[derive(Clone, Debug)]
pub enum EventTopic {
    /// New or updated library records are available for display.
    AddMediaResults { results: Vec<MediaResult> },
    /// Human-readable status line for an importer changed.
    UpdateStatus {
        importer_id: String,
        status_text: String,
    },
    /// A single seed's status or note changed inside a seed cache.
    SeedCacheSeedUpdated {
        seed: String,
        status: SeedStatus,
        note: Option<String>,
    },
    /// Free-text operator-facing message (errors, warnings, progress notes).
    Message { text: String },
    /// The thread watcher ticked without a new post; `by` is how many
    /// "checks remaining" to subtract (usually 1, but a 404 zeroes it in one
    /// shot — see `ThreadWatcherImporter`).
    DecrementTimesToCheck { by: u32 },
    /// A hash gained or lost a content-update outside `AddMediaResults`
    /// (e.g. a redundant URL grant attaching a `filename:` tag).
    ContentUpdated { hash: ContentHash },
}

/// Where every importer sends the events above. The embedding application
/// implements this once (a channel, a UI dispatcher, a metrics sink) and
/// hands the same `Arc<dyn EventSink>` to every worker loop.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: EventTopic);
}
