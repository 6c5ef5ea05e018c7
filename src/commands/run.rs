/// `stowage run` command implementation
///
/// Restores `--path` entries for the `--key` components, and on a miss runs
/// the command after `--` and saves the paths.
use anyhow::{Context, Result};

use stowage::cli_utils::{describe_outcome, stowage_prefix};
use stowage::process::{CommandRunner, SystemRunner};
use stowage::{CachedOperation, EnvironmentContext, RestoreErrorPolicy};

use crate::cli::RunArgs;
use crate::merger::MergedCacheConfig;

pub fn run(args: &RunArgs) -> Result<()> {
    let file_config = super::load_config(&args.common)?;
    let cache = MergedCacheConfig::merge(&args.common, &file_config, RestoreErrorPolicy::Fail);
    let ctx = EnvironmentContext::from_env();
    let store = super::open_store(&cache, &ctx)?;

    let components = super::key::escaped(&args.key);
    let (program, program_args) = args
        .command
        .split_first()
        .context("No command given after --")?;

    let runner = SystemRunner;
    let outcome = CachedOperation::new(&store)
        .restore_errors(cache.restore_errors)
        .run(&args.paths, &components, || {
            runner.stream(program, program_args)
        })
        .with_context(|| format!("Cached run of '{}' failed", program))?;

    eprintln!("{} {}", stowage_prefix(), describe_outcome(&outcome));
    Ok(())
}
