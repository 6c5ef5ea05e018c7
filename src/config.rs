use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::RestoreErrorPolicy;
use crate::gitversion::{DEFAULT_EXECUTABLE, DEFAULT_TOOL};
use crate::modules::DEFAULT_INSTALLER;
use crate::storage::{default_cache_dir, BackendKind};

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "stowage.toml";

/// Complete Stowage configuration (loaded from TOML file)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StowageConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub gitversion: GitVersionConfig,

    #[serde(default)]
    pub modules: ModulesConfig,
}

/// Cache backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Backend: auto, github, local
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Local store directory
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            dir: default_dir(),
        }
    }
}

/// Version computation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitVersionConfig {
    /// dotnet global tools to install (cached together)
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,

    /// Executable producing the JSON version report
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Treatment of infrastructure failures during restore
    #[serde(default)]
    pub restore_errors: RestoreErrorPolicy,
}

impl Default for GitVersionConfig {
    fn default() -> Self {
        Self {
            tools: default_tools(),
            executable: default_executable(),
            restore_errors: RestoreErrorPolicy::Fail,
        }
    }
}

/// Module installation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModulesConfig {
    /// Explicit manifest path (checked before the default locations)
    #[serde(default)]
    pub manifest: Option<PathBuf>,

    /// Installer script run on a cache miss
    #[serde(default = "default_installer")]
    pub installer: PathBuf,

    /// Treatment of infrastructure failures during restore
    #[serde(default = "default_modules_restore_errors")]
    pub restore_errors: RestoreErrorPolicy,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            manifest: None,
            installer: default_installer(),
            restore_errors: default_modules_restore_errors(),
        }
    }
}

fn default_backend() -> BackendKind {
    BackendKind::Auto
}

fn default_dir() -> PathBuf {
    default_cache_dir()
}

fn default_tools() -> Vec<String> {
    vec![DEFAULT_TOOL.to_string()]
}

fn default_executable() -> String {
    DEFAULT_EXECUTABLE.to_string()
}

fn default_installer() -> PathBuf {
    PathBuf::from(DEFAULT_INSTALLER)
}

fn default_modules_restore_errors() -> RestoreErrorPolicy {
    RestoreErrorPolicy::Miss
}

impl StowageConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: StowageConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Generate example configuration as TOML string
    pub fn example() -> Result<String> {
        toml::to_string_pretty(&StowageConfig::default()).context("Failed to render example config")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.dir.as_os_str().is_empty() {
            anyhow::bail!("cache.dir must be set");
        }

        if self.gitversion.tools.is_empty() {
            anyhow::bail!("gitversion.tools must list at least one tool");
        }

        if self.gitversion.tools.iter().any(|tool| tool.trim().is_empty()) {
            anyhow::bail!("gitversion.tools must not contain empty names");
        }

        if self.gitversion.executable.trim().is_empty() {
            anyhow::bail!("gitversion.executable must be set");
        }

        if self.modules.installer.as_os_str().is_empty() {
            anyhow::bail!("modules.installer must be set");
        }

        Ok(())
    }
}

/// Discovers Stowage configuration by traversing up the directory tree
pub fn discover_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = Some(start_dir);

    while let Some(dir) = current {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.is_file() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    // Fallback to global config
    dirs::home_dir()
        .map(|home| home.join(".config/stowage/config.toml"))
        .filter(|global| global.is_file())
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path.
/// Otherwise, auto-discovers config by traversing up directory tree from cwd.
/// Falls back to defaults when nothing is found.
pub fn load_config_with_discovery(explicit_path: Option<&Path>) -> Result<StowageConfig> {
    if let Some(config_path) = explicit_path {
        return StowageConfig::from_file(config_path);
    }

    let current_dir =
        std::env::current_dir().context("Failed to get current directory for config discovery")?;

    match discover_config(&current_dir) {
        Some(discovered_path) => {
            tracing::debug!("Using config: {}", discovered_path.display());
            StowageConfig::from_file(&discovered_path)
        }
        None => Ok(StowageConfig::default()),
    }
}
