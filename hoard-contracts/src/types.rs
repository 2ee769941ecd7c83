//! Shared vocabulary types that cross the collaborator boundary: the status
//! enum every lookup/import call returns, an opaque content hash, an opaque
//! media-result record, and the tag map shape `import_file` accepts.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of looking up or importing a single seed. Names and casing match
/// the original Hydrus status vocabulary exactly so persisted caches and
/// collaborator responses stay self-describing across the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SeedStatus {
    #[serde(rename = "UNKNOWN")]
    Unknown,
    /// Only ever returned by `url_status`/`md5_status`, never persisted as
    /// a seed's resting status.
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "SUCCESSFUL")]
    Successful,
    #[serde(rename = "REDUNDANT")]
    Redundant,
    #[serde(rename = "DELETED")]
    Deleted,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "UNINTERESTING_MIME")]
    UninterestingMime,
}

impl SeedStatus {
    /// True for the two statuses that yield a usable media result and are
    /// worth publishing onward (`spec.md` steps referring to
    /// `add_media_results`).
    pub fn is_importable_outcome(self) -> bool {
        matches!(self, SeedStatus::Successful | SeedStatus::Redundant)
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SeedStatus::Unknown | SeedStatus::New)
    }
}

impl fmt::Display for SeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeedStatus::Unknown => "unknown",
            SeedStatus::New => "new",
            SeedStatus::Successful => "successful",
            SeedStatus::Redundant => "redundant",
            SeedStatus::Deleted => "already deleted",
            SeedStatus::Failed => "failed",
            SeedStatus::UninterestingMime => "uninteresting mime",
        };
        f.write_str(s)
    }
}

/// Opaque content hash. Hex-encoded so it is cheap to log, compare, and
/// serialize without committing this crate to a particular digest.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque collaborator-produced record identifying an ingested file by its
/// hash plus whatever metadata the embedding application cares to attach.
/// The core never interprets `payload`; it only threads it through to the
/// event sink.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaResult {
    pub hash: ContentHash,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Opaque, collaborator-defined import options blob (dedup policy, min
/// resolution, archive-on-import, etc). This crate never inspects it; the
/// shape is a concern of the embedding application's file-ingestion
/// routine, per the spec's "persistence format negotiation" non-goal.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImportFileOptions(pub serde_json::Value);

/// `service_key -> tags` map passed alongside an import, mirroring the
/// original's `service_keys_to_tags` dict.
pub type TagMap = HashMap<String, Vec<String>>;
