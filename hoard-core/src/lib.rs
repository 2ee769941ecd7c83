//! Import pipeline core: the Seed Cache work-queue substrate plus four
//! long-running importer state machines (HDD, folder, gallery,
//! thread-watcher) that drain it. Everything here is storage-, transport-,
//! and UI-agnostic — it consumes collaborators from `hoard_contracts` and
//! knobs from `hoard_config`, and nothing else.

pub mod collaborators;
pub mod error;
pub mod importer;
pub mod seed;
pub mod seed_cache;

#[cfg(test)]
pub(crate) mod test_fakes;

pub use collaborators::Collaborators;
pub use error::{ImportError, Result};
pub use seed::{Seed, SeedInfo};
pub use seed_cache::SeedCache;

pub use hoard_contracts::types::SeedStatus;
