//! The Seed Cache (C1): an ordered, deduplicated bag of seeds with
//! per-seed status, timestamps, and note, behind a single mutex, publishing
//! a `seed_updated` event after every mutation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use hoard_contracts::events::{EventSink, EventTopic};
use hoard_contracts::types::SeedStatus;

use crate::error::{ImportError, Result};
use crate::seed::{Seed, SeedInfo};

struct Inner {
    order: Vec<Seed>,
    info: HashMap<Seed, SeedInfo>,
}

impl Inner {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            info: HashMap::new(),
        }
    }
}

/// Thread-safe, ordered `seed -> info` bag. One instance per importer; see
/// `spec.md` §3 ("each importer owns exactly one Seed Cache").
pub struct SeedCache {
    events: Arc<dyn EventSink>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for SeedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self
            .inner
            .try_lock()
            .map(|guard| guard.order.len())
            .unwrap_or_default();
        f.debug_struct("SeedCache").field("len", &len).finish()
    }
}

async fn publish(events: &Arc<dyn EventSink>, seed: &Seed, status: SeedStatus, note: Option<&str>) {
    events
        .publish(EventTopic::SeedCacheSeedUpdated {
            seed: seed.0.clone(),
            status,
            note: note.map(|s| s.to_owned()),
        })
        .await;
}

impl SeedCache {
    /// Bumped whenever the persisted `(seed, info)` shape changes, per
    /// `spec.md` §6's "integer `SERIALISABLE_VERSION`" discipline. This
    /// crate does not implement migration logic for it; the constant
    /// exists so an embedder can branch on it.
    pub const SERIALISABLE_VERSION: u16 = 1;

    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            events,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn from_snapshot(events: Arc<dyn EventSink>, snapshot: Vec<(Seed, SeedInfo)>) -> Self {
        let mut order = Vec::with_capacity(snapshot.len());
        let mut info = HashMap::with_capacity(snapshot.len());
        for (seed, seed_info) in snapshot {
            order.push(seed.clone());
            info.insert(seed, seed_info);
        }
        Self {
            events,
            inner: Mutex::new(Inner { order, info }),
        }
    }

    /// `AddSeed(seed)`: move to tail, initializing info only if new.
    pub async fn add_seed(&self, seed: Seed) {
        let (status, note) = {
            let mut inner = self.inner.lock().expect("seed cache mutex poisoned");
            if let Some(pos) = inner.order.iter().position(|s| s == &seed) {
                inner.order.remove(pos);
            } else {
                inner.info.insert(seed.clone(), SeedInfo::new_at(Utc::now()));
            }
            inner.order.push(seed.clone());
            let existing = inner.info.get(&seed).expect("just inserted or present");
            (existing.status, existing.note.clone())
        };
        let note = if note.is_empty() { None } else { Some(note.as_str()) };
        publish(&self.events, &seed, status, note).await;
    }

    pub fn has_seed(&self, seed: &Seed) -> bool {
        let inner = self.inner.lock().expect("seed cache mutex poisoned");
        inner.info.contains_key(seed)
    }

    /// `RemoveSeed(seed)`: no-op if absent, per `spec.md` §9 open question 3.
    pub async fn remove_seed(&self, seed: &Seed) {
        let removed = {
            let mut inner = self.inner.lock().expect("seed cache mutex poisoned");
            inner.info.remove(seed).inspect(|_| {
                inner.order.retain(|s| s != seed);
            })
        };
        if let Some(info) = removed {
            publish(&self.events, seed, info.status, None).await;
        }
    }

    /// `RemoveSeeds(status)`: removes every seed with the given status, one
    /// event per removed seed.
    pub async fn remove_seeds(&self, status: SeedStatus) {
        let removed: Vec<Seed> = {
            let mut inner = self.inner.lock().expect("seed cache mutex poisoned");
            let to_remove: Vec<Seed> = inner
                .order
                .iter()
                .filter(|seed| inner.info.get(*seed).map(|i| i.status) == Some(status))
                .cloned()
                .collect();
            for seed in &to_remove {
                inner.info.remove(seed);
            }
            inner.order.retain(|seed| !to_remove.contains(seed));
            to_remove
        };
        for seed in &removed {
            publish(&self.events, seed, status, None).await;
        }
    }

    /// `GetNextSeed(status)`: earliest seed in order with the given status.
    pub fn get_next_seed(&self, status: SeedStatus) -> Option<Seed> {
        let inner = self.inner.lock().expect("seed cache mutex poisoned");
        inner
            .order
            .iter()
            .find(|seed| inner.info.get(*seed).map(|i| i.status) == Some(status))
            .cloned()
    }

    /// `UpdateSeedStatus(seed, status, note)`. Precondition: seed present;
    /// absence is a logic error per `spec.md` §4.1 and surfaces as a fatal
    /// importer failure, not a silent no-op (contrast with `remove_seed`).
    pub async fn update_seed_status(
        &self,
        seed: &Seed,
        status: SeedStatus,
        note: impl Into<String>,
    ) -> Result<()> {
        let note = note.into();
        {
            let mut inner = self.inner.lock().expect("seed cache mutex poisoned");
            let entry = inner
                .info
                .get_mut(seed)
                .ok_or_else(|| ImportError::NotFound(seed.0.clone()))?;
            entry.status = status;
            entry.last_modified_timestamp = Utc::now();
            entry.note = note.clone();
        }
        let note = if note.is_empty() { None } else { Some(note.as_str()) };
        publish(&self.events, seed, status, note).await;
        Ok(())
    }

    /// `AdvanceSeed(seed)`: swap with the immediately preceding element.
    pub async fn advance_seed(&self, seed: &Seed) {
        let status = {
            let mut inner = self.inner.lock().expect("seed cache mutex poisoned");
            if let Some(pos) = inner.order.iter().position(|s| s == seed)
                && pos > 0
            {
                inner.order.swap(pos, pos - 1);
            }
            inner.info.get(seed).map(|i| i.status)
        };
        if let Some(status) = status {
            publish(&self.events, seed, status, None).await;
        }
    }

    /// `DelaySeed(seed)`: swap with the immediately following element.
    pub async fn delay_seed(&self, seed: &Seed) {
        let status = {
            let mut inner = self.inner.lock().expect("seed cache mutex poisoned");
            if let Some(pos) = inner.order.iter().position(|s| s == seed)
                && pos + 1 < inner.order.len()
            {
                inner.order.swap(pos, pos + 1);
            }
            inner.info.get(seed).map(|i| i.status)
        };
        if let Some(status) = status {
            publish(&self.events, seed, status, None).await;
        }
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("seed cache mutex poisoned");
        inner.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_seeds(&self) -> Vec<Seed> {
        let inner = self.inner.lock().expect("seed cache mutex poisoned");
        inner.order.clone()
    }

    /// Alias for [`Self::get_seeds_with_info`], named to match the
    /// iteration-flavored call sites that only want to walk the ordered
    /// list once rather than suggest a fresh snapshot is being built.
    pub fn iter_ordered_with_info(&self) -> Vec<(Seed, SeedInfo)> {
        self.get_seeds_with_info()
    }

    pub fn get_seeds_with_info(&self) -> Vec<(Seed, SeedInfo)> {
        let inner = self.inner.lock().expect("seed cache mutex poisoned");
        inner
            .order
            .iter()
            .map(|seed| (seed.clone(), inner.info[seed].clone()))
            .collect()
    }

    pub fn get_seed_info(&self, seed: &Seed) -> Option<SeedInfo> {
        let inner = self.inner.lock().expect("seed cache mutex poisoned");
        inner.info.get(seed).cloned()
    }

    /// `GetStatus()`: human string plus `(processed, total)`, per `spec.md`
    /// §4.1. The human string lists non-zero categories of successful,
    /// failed, already-deleted, and already-in-db (redundant), in that
    /// order, joined by `", "`.
    pub fn get_status(&self) -> (String, (usize, usize)) {
        let inner = self.inner.lock().expect("seed cache mutex poisoned");
        let total = inner.order.len();
        let mut successful = 0usize;
        let mut failed = 0usize;
        let mut deleted = 0usize;
        let mut redundant = 0usize;
        let mut unknown = 0usize;
        for info in inner.info.values() {
            match info.status {
                SeedStatus::Successful => successful += 1,
                SeedStatus::Failed => failed += 1,
                SeedStatus::Deleted => deleted += 1,
                SeedStatus::Redundant => redundant += 1,
                SeedStatus::Unknown => unknown += 1,
                _ => {}
            }
        }
        let processed = total - unknown;

        let mut parts = Vec::new();
        if successful > 0 {
            parts.push(format!("{successful} successful"));
        }
        if failed > 0 {
            parts.push(format!("{failed} failed"));
        }
        if deleted > 0 {
            parts.push(format!("{deleted} already deleted"));
        }
        if redundant > 0 {
            parts.push(format!("{redundant} already in db"));
        }
        (parts.join(", "), (processed, total))
    }

    /// `Serialize`: an ordered sequence of `(seed, info)` pairs.
    pub fn serialize(&self) -> Vec<(Seed, SeedInfo)> {
        self.get_seeds_with_info()
    }
}
