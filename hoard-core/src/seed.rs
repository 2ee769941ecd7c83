//! The unit of work every importer queues: a local path for C2/C3, a remote
//! URL for C4/C5. The core never interprets a seed beyond equality — per
//! `spec.md` §9, "implementers may make them a typed sum without changing
//! behavior", but a plain string is enough here and keeps serialization
//! trivial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hoard_contracts::types::SeedStatus;

/// Opaque work-item key. Equality is exact-string, per `spec.md` §3.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Seed(pub String);

impl Seed {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Seed {
    fn from(value: String) -> Self {
        Seed(value)
    }
}

impl From<&str> for Seed {
    fn from(value: &str) -> Self {
        Seed(value.to_owned())
    }
}

/// Everything tracked per seed: status, the two timestamps, and a
/// free-form note (typically the last error traceback on a `FAILED` seed).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedInfo {
    pub status: SeedStatus,
    pub added_timestamp: DateTime<Utc>,
    pub last_modified_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub note: String,
}

impl SeedInfo {
    /// Info for a freshly-added seed: `UNKNOWN`, both timestamps `now`, no
    /// note. Per `spec.md` §3.
    pub fn new_at(now: DateTime<Utc>) -> Self {
        Self {
            status: SeedStatus::Unknown,
            added_timestamp: now,
            last_modified_timestamp: now,
            note: String::new(),
        }
    }
}
