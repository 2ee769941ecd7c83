//! Environment knobs named in `spec.md` §6: how many files a gallery page
//! will queue before it stops accepting new ones, how long any importer
//! waits after an HTTP fetch, the thread watcher's default check cadence,
//! and the MIME set worth importing at all.

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};

/// Floor for `check_period`; mirrors the original imageboard-watcher
/// constant so a misconfigured period never hammers a thread faster than
/// this regardless of what a config file says.
pub const MIN_CHECK_PERIOD_SECONDS: u64 = 30;

/// Where an `ImportConfig` came from, surfaced for startup logging the way
/// the teacher logs `ScannerConfigSource`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImportConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

fn default_gallery_file_limit() -> usize {
    200
}

fn default_polite_wait_seconds() -> u64 {
    5
}

fn default_times_to_check() -> u32 {
    8
}

fn default_check_period_seconds() -> u64 {
    300
}

fn default_allowed_mimes() -> HashSet<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "video/webm",
        "video/mp4",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `(times_to_check, check_period)` default pair a newly created thread
/// watcher is seeded with, per `spec.md` §6.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ThreadCheckerTimings {
    #[serde(default = "default_times_to_check")]
    pub times_to_check: u32,
    #[serde(default = "default_check_period_seconds")]
    pub check_period_seconds: u64,
}

impl Default for ThreadCheckerTimings {
    fn default() -> Self {
        Self {
            times_to_check: default_times_to_check(),
            check_period_seconds: default_check_period_seconds(),
        }
    }
}

impl ThreadCheckerTimings {
    /// `check_period` floored at [`MIN_CHECK_PERIOD_SECONDS`].
    pub fn check_period_seconds(&self) -> u64 {
        self.check_period_seconds.max(MIN_CHECK_PERIOD_SECONDS)
    }
}

/// The environment knobs every importer reads at construction time. Cheap
/// to clone; importers hold an owned copy rather than a shared reference so
/// a config reload never has to chase down every live worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// How many pending page URLs a gallery importer (C4) will queue before
    /// it stops pulling more from the gallery query.
    #[serde(default = "default_gallery_file_limit")]
    pub gallery_file_limit: usize,

    /// Seconds any importer sleeps after performing an actual HTTP fetch.
    #[serde(default = "default_polite_wait_seconds")]
    pub website_download_polite_wait_seconds: u64,

    /// Default `(times_to_check, check_period)` seed for new thread
    /// watchers (C5).
    pub thread_checker_timings: ThreadCheckerTimings,

    /// MIME types worth importing. Anything else is marked
    /// `UNINTERESTING_MIME` without ever reaching `import_file`.
    #[serde(default = "default_allowed_mimes")]
    pub allowed_mimes: HashSet<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            gallery_file_limit: default_gallery_file_limit(),
            website_download_polite_wait_seconds: default_polite_wait_seconds(),
            thread_checker_timings: ThreadCheckerTimings::default(),
            allowed_mimes: default_allowed_mimes(),
        }
    }
}

impl ImportConfig {
    pub fn is_mime_allowed(&self, mime: &str) -> bool {
        self.allowed_mimes.contains(mime)
    }

    /// Load configuration overrides from the environment. Evaluation order:
    /// 1) `$IMPORT_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$IMPORT_CONFIG_JSON` (inline JSON),
    /// 3) a default file candidate next to the working directory,
    /// 4) built-in defaults.
    pub fn load_from_env() -> anyhow::Result<(Self, ImportConfigSource)> {
        if let Ok(path_str) = env::var("IMPORT_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, ImportConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("IMPORT_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed =
                Self::parse_json(&raw).context("failed to parse IMPORT_CONFIG_JSON")?;
            return Ok((parsed, ImportConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path)?;
            return Ok((config, ImportConfigSource::File(path)));
        }

        Ok((Self::default(), ImportConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read import config from {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents)
                .with_context(|| format!("invalid import config {}", path.display())),
            Some("toml") | Some("tml") => toml::from_str(&contents)
                .map_err(|err| anyhow!("invalid import config {}: {}", path.display(), err)),
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse import config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).map_err(|err| anyhow!("invalid import config json: {err}"))
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &[
            "import.toml",
            "import.json",
            "config/import.toml",
            "config/import.json",
        ];

        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(|path| path.to_path_buf())
    }
}
