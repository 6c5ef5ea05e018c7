pub mod config;
pub mod gitversion;
pub mod key;
pub mod modules;
pub mod run;

use anyhow::{Context, Result};
use stowage::config::{load_config_with_discovery, StowageConfig};
use stowage::{EnvironmentContext, StorageBackend};

use crate::cli::CommonConfigArgs;
use crate::merger::MergedCacheConfig;

/// Load the file configuration for a command (explicit path or discovery)
pub(crate) fn load_config(common: &CommonConfigArgs) -> Result<StowageConfig> {
    load_config_with_discovery(common.config.as_deref())
}

/// Open the store selected by the merged configuration
pub(crate) fn open_store(
    cache: &MergedCacheConfig,
    ctx: &EnvironmentContext,
) -> Result<StorageBackend> {
    StorageBackend::select(cache.backend, ctx, &cache.cache_dir)
        .context("Failed to open cache store")
}
