pub mod archive;
pub mod filesystem;
pub mod github_actions;

pub use filesystem::{default_cache_dir, LocalStore};
pub use github_actions::GithubActionsStore;

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::cache::KEY_DELIMITER;
use crate::env::EnvironmentContext;

/// Tag mixed into the cache version; bump when the archive layout changes
const ARCHIVE_FORMAT: &str = "stowage-tar-zstd-v1";

/// Storage backend errors (transport, permissions, corrupt data)
///
/// These are infrastructure failures, distinct from a restore that found nothing.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("invalid cache metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("cache service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("cache service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("cache backend not configured: {0}")]
    NotConfigured(String),
}

/// Result of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new entry was written
    Stored,
    /// An entry for the key already existed; nothing was written
    AlreadyExists,
}

/// Durable key → path-set store
///
/// `restore` checks the exact key, then the fallbacks, and returns the key that
/// actually matched. `save` never overwrites an existing entry.
pub trait CacheStore {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    fn restore(
        &self,
        paths: &[PathBuf],
        exact: &str,
        fallbacks: &[String],
    ) -> Result<Option<String>, StoreError>;

    fn save(&self, paths: &[PathBuf], exact: &str) -> Result<SaveOutcome, StoreError>;
}

/// Version of a cache entry for a given path set
///
/// Entries saved for one path set are never restored onto another.
pub fn cache_version(paths: &[PathBuf]) -> String {
    let mut hasher = Sha256::new();
    for path in paths {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(b"|");
    }
    hasher.update(ARCHIVE_FORMAT.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether a stored key satisfies a fallback key
///
/// Matches on component boundaries: `a-b` matches `a-b` and `a-b-c`, not `a-bc`.
pub fn matches_fallback(stored_key: &str, fallback: &str) -> bool {
    match stored_key.strip_prefix(fallback) {
        Some("") => true,
        Some(rest) => rest.starts_with(KEY_DELIMITER),
        None => false,
    }
}

/// Fallbacks ordered most specific first
pub fn fallbacks_by_specificity(fallbacks: &[String]) -> Vec<&str> {
    let mut ordered: Vec<&str> = fallbacks.iter().map(String::as_str).collect();
    ordered.sort_by_key(|fallback| std::cmp::Reverse(fallback.len()));
    ordered
}

/// Which backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// GitHub Actions cache when available, local directory otherwise
    Auto,
    Github,
    Local,
}

/// Concrete store selected at start-up
pub enum StorageBackend {
    GithubActions(GithubActionsStore),
    Local(LocalStore),
}

impl StorageBackend {
    /// Pick the GitHub Actions cache when its credentials are present
    pub fn auto_detect(ctx: &EnvironmentContext, cache_dir: &Path) -> Result<Self, StoreError> {
        Self::select(BackendKind::Auto, ctx, cache_dir)
    }

    pub fn select(
        kind: BackendKind,
        ctx: &EnvironmentContext,
        cache_dir: &Path,
    ) -> Result<Self, StoreError> {
        let backend = match kind {
            BackendKind::Github => StorageBackend::GithubActions(GithubActionsStore::from_context(ctx)?),
            BackendKind::Local => StorageBackend::Local(LocalStore::new(cache_dir)?),
            BackendKind::Auto if GithubActionsStore::is_available(ctx) => {
                StorageBackend::GithubActions(GithubActionsStore::from_context(ctx)?)
            }
            BackendKind::Auto => StorageBackend::Local(LocalStore::new(cache_dir)?),
        };

        info!(store = backend.name(), "Selected cache backend");
        Ok(backend)
    }
}

impl CacheStore for StorageBackend {
    fn name(&self) -> &'static str {
        match self {
            StorageBackend::GithubActions(store) => store.name(),
            StorageBackend::Local(store) => store.name(),
        }
    }

    fn restore(
        &self,
        paths: &[PathBuf],
        exact: &str,
        fallbacks: &[String],
    ) -> Result<Option<String>, StoreError> {
        match self {
            StorageBackend::GithubActions(store) => store.restore(paths, exact, fallbacks),
            StorageBackend::Local(store) => store.restore(paths, exact, fallbacks),
        }
    }

    fn save(&self, paths: &[PathBuf], exact: &str) -> Result<SaveOutcome, StoreError> {
        match self {
            StorageBackend::GithubActions(store) => store.save(paths, exact),
            StorageBackend::Local(store) => store.save(paths, exact),
        }
    }
}
