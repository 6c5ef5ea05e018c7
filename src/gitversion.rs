/// Repository version computation through `dotnet-gitversion`
///
/// The required dotnet global tools are installed behind the cache protocol,
/// keyed by runner OS and tool list; the version variables reported by the tool
/// are then exposed as step outputs.
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;

use crate::actions::OutputSink;
use crate::cache::{escape_component, CachedOperation, Outcome, RestoreErrorPolicy};
use crate::env::EnvironmentContext;
use crate::process::CommandRunner;
use crate::storage::CacheStore;

/// Tool installed when none are configured
pub const DEFAULT_TOOL: &str = "GitVersion.Tool";

/// Executable provided by `GitVersion.Tool`
pub const DEFAULT_EXECUTABLE: &str = "dotnet-gitversion";

/// Version variables exposed as step outputs, in output order
pub const OUTPUT_VARIABLES: [&str; 25] = [
    "Major",
    "Minor",
    "Patch",
    "PreReleaseTag",
    "PreReleaseTagWithDash",
    "PreReleaseLabel",
    "PreReleaseNumber",
    "WeightedPreReleaseNumber",
    "BuildMetaData",
    "BuildMetaDataPadded",
    "FullBuildMetaData",
    "MajorMinorPatch",
    "SemVer",
    "LegacySemVer",
    "LegacySemVerPadded",
    "AssemblySemVer",
    "AssemblySemFileVer",
    "FullSemVer",
    "InformationalVersion",
    "BranchName",
    "Sha",
    "ShortSha",
    "NuGetVersionV2",
    "NuGetVersion",
    "NuGetPreReleaseTagV2",
];

/// Global tool directory for a home directory
pub fn tool_path(home: &std::path::Path) -> PathBuf {
    home.join(".dotnet").join("tools")
}

/// Key components for a tool list
pub fn tool_key_components(runner_os: &str, tools: &[String]) -> Vec<String> {
    let mut components = vec![
        escape_component(runner_os),
        "dotnet".to_string(),
        "tools".to_string(),
    ];
    components.extend(tools.iter().map(|tool| escape_component(tool)));
    components
}

/// Install `tools` as dotnet global tools unless a cached copy can be restored
pub fn cache_dotnet_global_tools<S, R>(
    store: &S,
    runner: &R,
    ctx: &EnvironmentContext,
    tools: &[String],
    restore_errors: RestoreErrorPolicy,
) -> Result<Outcome>
where
    S: CacheStore + ?Sized,
    R: CommandRunner + ?Sized,
{
    let home = ctx
        .home
        .as_deref()
        .context("Neither HOME nor USERPROFILE is set")?;
    let paths = vec![tool_path(home)];
    let components = tool_key_components(&ctx.runner_os, tools);

    let outcome = CachedOperation::new(store)
        .restore_errors(restore_errors)
        .run(&paths, &components, || {
            for tool in tools {
                let args = ["tool", "install", "--global", tool.as_str()].map(String::from);
                runner
                    .stream("dotnet", &args)
                    .with_context(|| format!("Failed to install dotnet tool {}", tool))?;
            }
            Ok(())
        })
        .context("Failed to provide dotnet global tools")?;

    Ok(outcome)
}

/// Arguments for a JSON version report of the current repository
pub fn gitversion_args(ctx: &EnvironmentContext) -> Result<Vec<String>> {
    let server_url = ctx
        .server_url
        .as_deref()
        .context("GITHUB_SERVER_URL is not set")?;
    let repository = ctx
        .repository
        .as_deref()
        .context("GITHUB_REPOSITORY is not set")?;
    let git_ref = ctx.git_ref.as_deref().context("GITHUB_REF is not set")?;
    let sha = ctx.sha.as_deref().context("GITHUB_SHA is not set")?;

    Ok(vec![
        "-url".to_string(),
        format!("{}/{}.git", server_url, repository),
        "-b".to_string(),
        git_ref.to_string(),
        "-c".to_string(),
        sha.to_string(),
        "-output".to_string(),
        "json".to_string(),
    ])
}

/// Parse the tool's JSON report
pub fn parse_report(json: &str) -> Result<Map<String, Value>> {
    serde_json::from_str(json).context("Error parsing GitVersion JSON output")
}

/// Text of a report variable; missing and null values become empty
pub fn variable(report: &Map<String, Value>, name: &str) -> String {
    match report.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Run the version tool and publish its variables
pub fn compute_version<R>(
    runner: &R,
    ctx: &EnvironmentContext,
    executable: &str,
    outputs: &mut OutputSink,
) -> Result<Map<String, Value>>
where
    R: CommandRunner + ?Sized,
{
    let args = gitversion_args(ctx)?;
    let output = runner
        .capture(executable, &args)
        .with_context(|| format!("Failed to run {}", executable))?;

    let report = parse_report(&output.stdout)?;
    for name in OUTPUT_VARIABLES {
        outputs.set_output(name, &variable(&report, name))?;
    }

    info!(
        "Computed version {} for {}",
        variable(&report, "FullSemVer"),
        variable(&report, "BranchName")
    );
    Ok(report)
}
