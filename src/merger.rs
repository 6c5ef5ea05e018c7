/// Configuration merger: CLI args > Env vars > Config file > Defaults
///
/// Environment variables are folded into the CLI layer by clap (`env = ...`),
/// so each field is resolved from the parsed arguments first and the loaded
/// file second. The file itself already carries the built-in defaults.
use std::path::PathBuf;

use stowage::config::StowageConfig;
use stowage::storage::BackendKind;
use stowage::RestoreErrorPolicy;

use crate::cli::{CommonConfigArgs, GitversionArgs, InstallModulesArgs};

/// Store selection for one command invocation
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCacheConfig {
    pub backend: BackendKind,
    pub cache_dir: PathBuf,
    pub restore_errors: RestoreErrorPolicy,
}

impl MergedCacheConfig {
    /// `call_site_policy` is the file/default policy of the command being run
    pub fn merge(
        args: &CommonConfigArgs,
        file: &StowageConfig,
        call_site_policy: RestoreErrorPolicy,
    ) -> Self {
        Self {
            backend: args.cache_backend.unwrap_or(file.cache.backend),
            cache_dir: args
                .cache_dir
                .clone()
                .unwrap_or_else(|| file.cache.dir.clone()),
            restore_errors: args.restore_errors.unwrap_or(call_site_policy),
        }
    }
}

/// Settings for `stowage gitversion`
#[derive(Debug, Clone, PartialEq)]
pub struct MergedGitversionConfig {
    pub cache: MergedCacheConfig,
    pub tools: Vec<String>,
    pub executable: String,
}

impl MergedGitversionConfig {
    pub fn merge(args: &GitversionArgs, file: &StowageConfig) -> Self {
        let tools = if args.tools.is_empty() {
            file.gitversion.tools.clone()
        } else {
            args.tools.clone()
        };

        Self {
            cache: MergedCacheConfig::merge(&args.common, file, file.gitversion.restore_errors),
            tools,
            executable: args
                .executable
                .clone()
                .unwrap_or_else(|| file.gitversion.executable.clone()),
        }
    }
}

/// Settings for `stowage install-modules`
///
/// The manifest is not resolved here: the step input sits between the CLI
/// flag and the file value and is read from the environment context.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedModulesConfig {
    pub cache: MergedCacheConfig,
    pub manifest: Option<PathBuf>,
    pub installer: PathBuf,
}

impl MergedModulesConfig {
    pub fn merge(args: &InstallModulesArgs, file: &StowageConfig) -> Self {
        Self {
            cache: MergedCacheConfig::merge(&args.common, file, file.modules.restore_errors),
            manifest: args.manifest.clone(),
            installer: args
                .installer
                .clone()
                .unwrap_or_else(|| file.modules.installer.clone()),
        }
    }
}
