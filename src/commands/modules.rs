/// `stowage install-modules` command implementation
use anyhow::{Context, Result};
use std::path::PathBuf;

use stowage::cli_utils::{describe_outcome, stowage_prefix};
use stowage::config::StowageConfig;
use stowage::modules::{find_manifest, install_required_modules, InstallPlan, MANIFEST_INPUT};
use stowage::process::SystemRunner;
use stowage::EnvironmentContext;

use crate::cli::InstallModulesArgs;
use crate::merger::MergedModulesConfig;

pub fn run(args: &InstallModulesArgs) -> Result<()> {
    let file_config = super::load_config(&args.common)?;
    let ctx = EnvironmentContext::from_env();
    let config = MergedModulesConfig::merge(args, &file_config);

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let explicit = explicit_manifest(&config, &file_config, &ctx);
    let manifest = find_manifest(explicit.as_deref(), &cwd)?;

    let store = super::open_store(&config.cache, &ctx)?;
    let plan = InstallPlan {
        manifest,
        installer: config.installer,
    };

    let outcome = install_required_modules(
        &store,
        &SystemRunner,
        &ctx,
        &plan,
        config.cache.restore_errors,
    )?;
    eprintln!("{} {}", stowage_prefix(), describe_outcome(&outcome));
    Ok(())
}

/// `--manifest`, then the step input, then the config file
fn explicit_manifest(
    config: &MergedModulesConfig,
    file: &StowageConfig,
    ctx: &EnvironmentContext,
) -> Option<PathBuf> {
    config
        .manifest
        .clone()
        .or_else(|| ctx.input(MANIFEST_INPUT).map(PathBuf::from))
        .or_else(|| file.modules.manifest.clone())
}
