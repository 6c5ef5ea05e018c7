use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::archive;
use super::{cache_version, fallbacks_by_specificity, matches_fallback};
use super::{CacheStore, SaveOutcome, StoreError};

const METADATA_FILE: &str = "metadata.json";
const ARCHIVE_FILE: &str = "archive.tar.zst";

/// Metadata stored next to each archived path set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub key: String,
    pub version: String,
    pub paths: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Default store directory: the platform cache dir (e.g. `~/.cache`) plus `stowage`
///
/// Falls back to `.stowage` under the working directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|base| base.join(STORE_NAME))
        .unwrap_or_else(|| PathBuf::from(".stowage"))
}

const STORE_NAME: &str = "stowage";

/// Directory-backed cache store
///
/// Layout:
/// - `<dir>/entries/<sha256(version, key)>/metadata.json` - key, version, creation time
/// - `<dir>/entries/<sha256(version, key)>/archive.tar.zst` - packed path set
///
/// Entries are staged in a temporary directory and renamed into place, so a
/// concurrent save for the same key and path set leaves exactly one entry behind.
pub struct LocalStore {
    root: PathBuf,
    entries_dir: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `cache_dir`
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self, StoreError> {
        let root = cache_dir.as_ref().to_path_buf();
        let entries_dir = root.join("entries");
        fs::create_dir_all(&entries_dir)?;

        Ok(Self { root, entries_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One directory per (version, key); the same key saved for another path set is a separate entry
    fn entry_dir(&self, key: &str, version: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(version.as_bytes());
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        self.entries_dir.join(hex::encode(hasher.finalize()))
    }

    fn read_metadata(entry_dir: &Path) -> Result<Option<EntryMetadata>, StoreError> {
        let metadata_path = entry_dir.join(METADATA_FILE);
        match fs::read_to_string(&metadata_path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an entry by exact key
    ///
    /// An entry whose metadata cannot be parsed counts as absent.
    pub fn entry(&self, key: &str, version: &str) -> Result<Option<EntryMetadata>, StoreError> {
        let entry_dir = self.entry_dir(key, version);
        if !entry_dir.exists() {
            return Ok(None);
        }

        match Self::read_metadata(&entry_dir) {
            Ok(metadata) => {
                Ok(metadata.filter(|metadata| metadata.key == key && metadata.version == version))
            }
            Err(StoreError::Metadata(e)) => {
                warn!(entry = %entry_dir.display(), error = %e, "Ignoring cache entry with corrupt metadata");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// All readable entries with the given version
    ///
    /// Entries with unreadable metadata are skipped.
    pub fn list(&self, version: &str) -> Result<Vec<EntryMetadata>, StoreError> {
        let mut entries = Vec::new();

        for dir_entry in fs::read_dir(&self.entries_dir)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_dir() {
                continue;
            }

            match Self::read_metadata(&dir_entry.path()) {
                Ok(Some(metadata)) if metadata.version == version => entries.push(metadata),
                Ok(_) => {}
                Err(e) => {
                    warn!(entry = %dir_entry.path().display(), error = %e, "Skipping unreadable cache entry");
                }
            }
        }

        Ok(entries)
    }

    /// Best entry for the fallbacks: longest fallback first, newest entry wins
    fn find_fallback(
        &self,
        fallbacks: &[String],
        version: &str,
    ) -> Result<Option<EntryMetadata>, StoreError> {
        if fallbacks.is_empty() {
            return Ok(None);
        }

        let entries = self.list(version)?;

        for fallback in fallbacks_by_specificity(fallbacks) {
            let best = entries
                .iter()
                .filter(|entry| matches_fallback(&entry.key, fallback))
                .max_by_key(|entry| entry.created_at);

            if let Some(entry) = best {
                return Ok(Some(entry.clone()));
            }
        }

        Ok(None)
    }

    /// Whether a live entry occupies `entry_dir`; a directory without valid metadata is removed
    fn occupied(&self, entry_dir: &Path) -> Result<bool, StoreError> {
        if !entry_dir.exists() {
            return Ok(false);
        }

        match Self::read_metadata(entry_dir) {
            Ok(Some(_)) => Ok(true),
            Ok(None) | Err(StoreError::Metadata(_)) => {
                warn!(entry = %entry_dir.display(), "Replacing broken cache entry");
                fs::remove_dir_all(entry_dir)?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl CacheStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn restore(
        &self,
        paths: &[PathBuf],
        exact: &str,
        fallbacks: &[String],
    ) -> Result<Option<String>, StoreError> {
        let version = cache_version(paths);

        let matched = match self.entry(exact, &version)? {
            Some(entry) => Some(entry),
            None => self.find_fallback(fallbacks, &version)?,
        };

        let Some(entry) = matched else {
            debug!(store = self.name(), key = exact, "No local cache entry");
            return Ok(None);
        };

        let archive_path = self.entry_dir(&entry.key, &entry.version).join(ARCHIVE_FILE);
        archive::unpack_file(&archive_path, paths)?;

        info!(
            store = self.name(),
            key = %entry.key,
            size_bytes = entry.size_bytes,
            "Restored local cache entry"
        );
        Ok(Some(entry.key))
    }

    fn save(&self, paths: &[PathBuf], exact: &str) -> Result<SaveOutcome, StoreError> {
        let version = cache_version(paths);
        let entry_dir = self.entry_dir(exact, &version);
        if self.occupied(&entry_dir)? {
            return Ok(SaveOutcome::AlreadyExists);
        }

        let (data, summary) = archive::pack(paths)?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;

        fs::write(staging.path().join(ARCHIVE_FILE), &data)?;

        let metadata = EntryMetadata {
            key: exact.to_string(),
            version,
            paths: paths.iter().map(|p| p.display().to_string()).collect(),
            created_at: Utc::now(),
            size_bytes: data.len() as u64,
        };
        fs::write(
            staging.path().join(METADATA_FILE),
            serde_json::to_string_pretty(&metadata)?,
        )?;

        if let Err(e) = fs::rename(staging.path(), &entry_dir) {
            // Lost a race with another writer for the same key
            if entry_dir.exists() {
                return Ok(SaveOutcome::AlreadyExists);
            }
            return Err(e.into());
        }

        info!(
            store = self.name(),
            key = exact,
            files = summary.file_count,
            size_bytes = metadata.size_bytes,
            "Saved local cache entry"
        );
        Ok(SaveOutcome::Stored)
    }
}
