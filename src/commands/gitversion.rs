/// `stowage gitversion` command implementation
use anyhow::Result;

use stowage::actions::OutputSink;
use stowage::cli_utils::{describe_outcome, stowage_prefix};
use stowage::config::StowageConfig;
use stowage::gitversion::{cache_dotnet_global_tools, compute_version};
use stowage::process::SystemRunner;
use stowage::EnvironmentContext;

use crate::cli::GitversionArgs;
use crate::merger::MergedGitversionConfig;

pub fn run(args: &GitversionArgs) -> Result<()> {
    let file_config = super::load_config(&args.common)?;
    let ctx = EnvironmentContext::from_env();
    let config = resolve(args, &file_config, &ctx);

    let store = super::open_store(&config.cache, &ctx)?;
    let runner = SystemRunner;

    let outcome = cache_dotnet_global_tools(
        &store,
        &runner,
        &ctx,
        &config.tools,
        config.cache.restore_errors,
    )?;
    eprintln!("{} {}", stowage_prefix(), describe_outcome(&outcome));

    let mut outputs = OutputSink::from_context(&ctx);
    compute_version(&runner, &ctx, &config.executable, &mut outputs)?;
    Ok(())
}

/// Merge settings; the `tools` step input sits between CLI flags and the file
fn resolve(
    args: &GitversionArgs,
    file: &StowageConfig,
    ctx: &EnvironmentContext,
) -> MergedGitversionConfig {
    let mut config = MergedGitversionConfig::merge(args, file);
    if args.tools.is_empty() {
        if let Some(input) = ctx.input("tools") {
            let tools = split_tools(&input);
            if !tools.is_empty() {
                config.tools = tools;
            }
        }
    }
    config
}

/// Tool names separated by commas or newlines
fn split_tools(input: &str) -> Vec<String> {
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|tool| !tool.is_empty())
        .map(String::from)
        .collect()
}
