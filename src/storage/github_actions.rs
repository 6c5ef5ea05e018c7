use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use super::archive;
use super::{cache_version, fallbacks_by_specificity};
use super::{CacheStore, SaveOutcome, StoreError};
use crate::env::EnvironmentContext;

/// Accept header required by the artifact cache service
const API_ACCEPT: &str = "application/json;api-version=6.0-preview.1";

/// Upload chunk size (32 MiB)
const UPLOAD_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// GitHub Actions Cache storage backend
///
/// Uses the GitHub Actions Cache API to store packed path sets.
/// Automatically detected when running in GitHub Actions via ACTIONS_CACHE_URL environment variable.
pub struct GithubActionsStore {
    client: Client,
    cache_url: String,
    token: String,
    chunk_size: usize,
}

#[derive(Serialize, Deserialize)]
struct ReserveCacheRequest {
    key: String,
    version: String,
    #[serde(rename = "cacheSize")]
    cache_size: u64,
}

#[derive(Serialize, Deserialize)]
struct ReserveCacheResponse {
    #[serde(rename = "cacheId")]
    cache_id: i64,
}

#[derive(Serialize, Deserialize)]
struct CommitCacheRequest {
    size: u64,
}

#[derive(Serialize, Deserialize)]
struct GetCacheResponse {
    #[serde(rename = "cacheKey")]
    cache_key: String,
    #[serde(rename = "archiveLocation")]
    archive_location: String,
}

impl GithubActionsStore {
    /// Create a new GitHub Actions store with provided credentials
    pub fn new(cache_url: String, token: String) -> Self {
        info!(cache_url = %cache_url, "Initializing GitHub Actions cache backend");

        Self {
            client: Client::new(),
            cache_url: cache_url.trim_end_matches('/').to_string(),
            token,
            chunk_size: UPLOAD_CHUNK_SIZE,
        }
    }

    /// Override the upload chunk size (at least one byte)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Create a store from the runner environment
    ///
    /// Requires:
    /// - ACTIONS_CACHE_URL: Cache service endpoint (auto-provided by GitHub Actions)
    /// - ACTIONS_RUNTIME_TOKEN: Authentication token (auto-provided by GitHub Actions)
    pub fn from_context(ctx: &EnvironmentContext) -> Result<Self, StoreError> {
        let cache_url = ctx.actions_cache_url.clone().ok_or_else(|| {
            StoreError::NotConfigured(
                "ACTIONS_CACHE_URL not found (not running in GitHub Actions?)".to_string(),
            )
        })?;
        let token = ctx.actions_runtime_token.clone().ok_or_else(|| {
            StoreError::NotConfigured("ACTIONS_RUNTIME_TOKEN not found".to_string())
        })?;

        Ok(Self::new(cache_url, token))
    }

    /// Check if the GitHub Actions cache is reachable from this environment
    pub fn is_available(ctx: &EnvironmentContext) -> bool {
        ctx.actions_cache_url.is_some() && ctx.actions_runtime_token.is_some()
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/_apis/artifactcache/{}", self.cache_url, resource)
    }

    /// Keys in the order the service should try them: exact, then most specific fallback
    fn lookup_keys(exact: &str, fallbacks: &[String]) -> String {
        std::iter::once(exact)
            .chain(fallbacks_by_specificity(fallbacks))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn lookup(&self, keys: &str, version: &str) -> Result<Option<GetCacheResponse>, StoreError> {
        let url = self.endpoint("cache");
        debug!("GET {} (keys: {})", url, keys);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", API_ACCEPT)
            .query(&[("keys", keys), ("version", version)])
            .send()?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let response = ensure_success(response)?;
        Ok(Some(response.json()?))
    }

    fn download(&self, archive_location: &str) -> Result<Vec<u8>, StoreError> {
        debug!("GET {} (archive)", archive_location);
        let response = ensure_success(self.client.get(archive_location).send()?)?;
        Ok(response.bytes()?.to_vec())
    }

    /// Reserve an entry; `None` when the key already exists
    fn reserve(&self, key: &str, version: &str, size: u64) -> Result<Option<i64>, StoreError> {
        let url = self.endpoint("caches");
        debug!("POST {} (reserving cache for key: {})", url, key);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", API_ACCEPT)
            .json(&ReserveCacheRequest {
                key: key.to_string(),
                version: version.to_string(),
                cache_size: size,
            })
            .send()?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }

        let reserved: ReserveCacheResponse = ensure_success(response)?.json()?;
        debug!("Reserved cache ID: {}", reserved.cache_id);
        Ok(Some(reserved.cache_id))
    }

    fn upload(&self, cache_id: i64, data: &[u8]) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("caches/{}", cache_id));

        for (start, end) in chunk_ranges(data.len(), self.chunk_size) {
            debug!("PATCH {} (bytes {}-{})", url, start, end);

            let response = self
                .client
                .patch(&url)
                .bearer_auth(&self.token)
                .header("Accept", API_ACCEPT)
                .header("Content-Type", "application/octet-stream")
                .header("Content-Range", format!("bytes {}-{}/*", start, end))
                .body(data[start..=end].to_vec())
                .send()?;
            ensure_success(response)?;
        }

        Ok(())
    }

    fn commit(&self, cache_id: i64, size: u64) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("caches/{}", cache_id));
        debug!("POST {} (committing cache)", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", API_ACCEPT)
            .json(&CommitCacheRequest { size })
            .send()?;
        ensure_success(response)?;
        Ok(())
    }
}

/// Inclusive byte ranges covering `len` bytes in `chunk_size` pieces
fn chunk_ranges(len: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    (0..len)
        .step_by(chunk_size)
        .map(|start| (start, (start + chunk_size).min(len) - 1))
        .collect()
}

fn ensure_success(response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Err(StoreError::Http { status, body })
}

impl CacheStore for GithubActionsStore {
    fn name(&self) -> &'static str {
        "github-actions"
    }

    fn restore(
        &self,
        paths: &[PathBuf],
        exact: &str,
        fallbacks: &[String],
    ) -> Result<Option<String>, StoreError> {
        let version = cache_version(paths);
        let keys = Self::lookup_keys(exact, fallbacks);

        let Some(entry) = self.lookup(&keys, &version)? else {
            debug!(store = self.name(), key = exact, "Cache service reported no match");
            return Ok(None);
        };

        let data = self.download(&entry.archive_location)?;
        archive::unpack(&data, paths)?;

        info!(
            store = self.name(),
            key = %entry.cache_key,
            size_bytes = data.len(),
            "Restored cache entry"
        );
        Ok(Some(entry.cache_key))
    }

    fn save(&self, paths: &[PathBuf], exact: &str) -> Result<SaveOutcome, StoreError> {
        let version = cache_version(paths);
        let (data, summary) = archive::pack(paths)?;
        let size = data.len() as u64;

        let Some(cache_id) = self.reserve(exact, &version, size)? else {
            info!(store = self.name(), key = exact, "Cache entry already exists");
            return Ok(SaveOutcome::AlreadyExists);
        };

        self.upload(cache_id, &data)?;
        self.commit(cache_id, size)?;

        info!(
            store = self.name(),
            key = exact,
            files = summary.file_count,
            size_bytes = size,
            "Saved cache entry"
        );
        Ok(SaveOutcome::Stored)
    }
}
