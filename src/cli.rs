use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stowage::storage::BackendKind;
use stowage::RestoreErrorPolicy;

/// Stowage - restore/compute/save caching for CI steps
///
/// Stowage restores a previously saved copy of a set of paths from a cache
/// store, runs the expensive step only when nothing matched, and saves the
/// result for later runs.
#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Restore/compute/save caching for CI steps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Common configuration arguments shared across commands
#[derive(Parser, Debug, Clone, Default)]
pub struct CommonConfigArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "STOWAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache backend
    #[arg(long, value_enum, env = "STOWAGE_CACHE_BACKEND")]
    pub cache_backend: Option<BackendKind>,

    /// Local cache directory
    #[arg(long, env = "STOWAGE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// What to do when the store fails during restore
    #[arg(long, value_enum, env = "STOWAGE_RESTORE_ERRORS")]
    pub restore_errors: Option<RestoreErrorPolicy>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the exact key and fallbacks for a list of components
    Key(KeyArgs),

    /// Run a command behind the cache for a set of paths
    Run(RunArgs),

    /// Install dotnet tools (cached) and publish version variables
    Gitversion(GitversionArgs),

    /// Install PowerShell modules from RequiredModules.psd1 (cached)
    InstallModules(InstallModulesArgs),

    /// Configuration management utilities
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to config file
        path: PathBuf,
    },
    /// Print an example stowage.toml with every default filled in
    Generate,
    /// Show the configuration file that applies here
    Show {
        /// Config file path (discovered when omitted)
        #[arg(short = 'c', long, env = "STOWAGE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
pub struct KeyArgs {
    /// Key components, most general first
    #[arg(required = true)]
    pub components: Vec<String>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to restore before and save after the command (repeatable)
    #[arg(long = "path", required = true)]
    pub paths: Vec<PathBuf>,

    /// Key component, most general first (repeatable)
    #[arg(long = "key", required = true)]
    pub key: Vec<String>,

    /// Command executed on a cache miss (after --)
    #[arg(last = true, required = true)]
    pub command: Vec<String>,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct GitversionArgs {
    /// dotnet global tool to install (repeatable)
    #[arg(long = "tool")]
    pub tools: Vec<String>,

    /// Executable producing the JSON version report
    #[arg(long)]
    pub executable: Option<String>,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct InstallModulesArgs {
    /// Manifest path, checked before the default locations
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Installer script run on a cache miss
    #[arg(long)]
    pub installer: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}
