/// PowerShell module installation from a `RequiredModules.psd1` manifest
///
/// Modules are installed into the current-user module directory behind the
/// cache protocol, keyed by runner OS and the manifest's content hash.
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::cache::{escape_component, CachedOperation, Outcome, RestoreErrorPolicy};
use crate::env::EnvironmentContext;
use crate::process::CommandRunner;
use crate::storage::CacheStore;

/// Manifest file name looked up in the working directory
pub const MANIFEST_FILE: &str = "RequiredModules.psd1";

/// Step input naming an explicit manifest location
pub const MANIFEST_INPUT: &str = "requiredModules-path";

/// Installer script run on a cache miss
pub const DEFAULT_INSTALLER: &str = "Install-RequiredModule.ps1";

const PWSH: &str = "pwsh";
const PWSH_FLAGS: [&str; 3] = ["-noprofile", "-nologo", "-noninteractive"];

/// Lists the module directories under the current user's profile
const MODULE_PATH_QUERY: &str = "$Env:PSModulePath.Split([IO.Path]::PathSeparator).Where({$_.StartsWith((Split-Path $profile.CurrentUserAllHosts))})";

#[derive(Error, Debug)]
pub enum ModulesError {
    #[error("no RequiredModules.psd1 found (looked in: {})", join_paths(.candidates))]
    ManifestNotFound { candidates: Vec<PathBuf> },

    #[error("pwsh reported no current-user module directory")]
    NoModulePath,
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|c| c.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Manifest locations in lookup order
///
/// An explicit path (step input or configuration) comes first, then
/// `<cwd>/RequiredModules.psd1` and `<cwd>/RequiredModules/RequiredModules.psd1`.
pub fn manifest_candidates(explicit: Option<&Path>, cwd: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(path) = explicit {
        candidates.push(cwd.join(path));
    }
    candidates.push(cwd.join(MANIFEST_FILE));
    candidates.push(cwd.join("RequiredModules").join(MANIFEST_FILE));
    candidates
}

/// First existing manifest among the candidates
pub fn find_manifest(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf, ModulesError> {
    let candidates = manifest_candidates(explicit, cwd);
    match candidates.iter().position(|candidate| candidate.is_file()) {
        Some(index) => Ok(candidates[index].clone()),
        None => Err(ModulesError::ManifestNotFound { candidates }),
    }
}

/// Upper-case hex SHA-256 of the manifest (same form as `Get-FileHash`)
pub fn manifest_hash(manifest: &Path) -> Result<String> {
    let content = fs::read(manifest)
        .with_context(|| format!("Failed to read manifest: {}", manifest.display()))?;
    Ok(hex::encode_upper(Sha256::digest(&content)))
}

fn pwsh_args(rest: &[&str]) -> Vec<String> {
    PWSH_FLAGS
        .iter()
        .chain(rest)
        .map(|arg| arg.to_string())
        .collect()
}

/// Current-user module directories, one per output line
pub fn module_paths<R>(runner: &R) -> Result<Vec<PathBuf>>
where
    R: CommandRunner + ?Sized,
{
    let output = runner
        .capture(PWSH, &pwsh_args(&["-command", MODULE_PATH_QUERY]))
        .context("Failed to query PSModulePath")?;

    let paths: Vec<PathBuf> = output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect();

    if paths.is_empty() {
        return Err(ModulesError::NoModulePath.into());
    }
    Ok(paths)
}

pub fn module_key_components(runner_os: &str, hash: &str) -> Vec<String> {
    vec![
        escape_component(runner_os),
        "psmodules".to_string(),
        hash.to_string(),
    ]
}

/// Locations involved in one installation
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub manifest: PathBuf,
    pub installer: PathBuf,
}

/// Install the manifest's modules unless a cached copy can be restored
pub fn install_required_modules<S, R>(
    store: &S,
    runner: &R,
    ctx: &EnvironmentContext,
    plan: &InstallPlan,
    restore_errors: RestoreErrorPolicy,
) -> Result<Outcome>
where
    S: CacheStore + ?Sized,
    R: CommandRunner + ?Sized,
{
    let hash = manifest_hash(&plan.manifest)?;
    let paths = module_paths(runner)?;
    let components = module_key_components(&ctx.runner_os, &hash);

    info!(
        manifest = %plan.manifest.display(),
        "Restore: {} from cache",
        join_paths(&paths)
    );

    let outcome = CachedOperation::new(store)
        .restore_errors(restore_errors)
        .run(&paths, &components, || {
            let installer = plan.installer.display().to_string();
            let manifest = plan.manifest.display().to_string();
            let args = pwsh_args(&[
                "-file",
                &installer,
                "-RequiredModulesFile",
                &manifest,
                "-TrustRegisteredRepositories",
                "-Scope",
                "CurrentUser",
            ]);
            runner
                .stream(PWSH, &args)
                .context("Failed to install required modules")
        })
        .context("Failed to provide required PowerShell modules")?;

    Ok(outcome)
}
