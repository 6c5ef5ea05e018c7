//! Process environment captured once at start-up
//!
//! Everything the call sites need from ambient environment variables lives in
//! [`EnvironmentContext`], so key derivation and command construction never read
//! the environment mid-algorithm and tests can supply any environment via
//! [`EnvironmentContext::from_lookup`].

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentContext {
    /// Runner operating system (`Linux`, `macOS`, `Windows`, ...)
    pub runner_os: String,
    pub home: Option<PathBuf>,
    pub server_url: Option<String>,
    pub repository: Option<String>,
    pub git_ref: Option<String>,
    pub sha: Option<String>,
    /// Step output file (`GITHUB_OUTPUT`)
    pub output_file: Option<PathBuf>,
    pub actions_cache_url: Option<String>,
    pub actions_runtime_token: Option<String>,
    inputs: Vec<(String, String)>,
}

impl EnvironmentContext {
    /// Capture the current process environment
    pub fn from_env() -> Self {
        let mut ctx = Self::from_lookup(|key| std::env::var(key).ok());
        ctx.inputs = std::env::vars()
            .filter(|(key, _)| key.starts_with("INPUT_"))
            .collect();
        if ctx.home.is_none() {
            ctx.home = dirs::home_dir();
        }
        ctx
    }

    /// Build a context from an arbitrary variable lookup
    ///
    /// Step inputs are resolved through the same lookup on demand.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let runner_os = ["RUNNER_OS", "OS", "ImageOS"]
            .iter()
            .find_map(|key| non_empty(key))
            .unwrap_or_else(|| host_os().to_string());

        let home = non_empty("HOME")
            .or_else(|| non_empty("USERPROFILE"))
            .map(PathBuf::from);

        let inputs = INPUT_PROBES
            .iter()
            .filter_map(|name| {
                let key = input_variable(name);
                lookup(&key).map(|value| (key, value))
            })
            .collect();

        Self {
            runner_os,
            home,
            server_url: non_empty("GITHUB_SERVER_URL"),
            repository: non_empty("GITHUB_REPOSITORY"),
            git_ref: non_empty("GITHUB_REF"),
            sha: non_empty("GITHUB_SHA"),
            output_file: non_empty("GITHUB_OUTPUT").map(PathBuf::from),
            actions_cache_url: non_empty("ACTIONS_CACHE_URL"),
            actions_runtime_token: non_empty("ACTIONS_RUNTIME_TOKEN"),
            inputs,
        }
    }

    /// Step input by name (`requiredModules-path` → `INPUT_REQUIREDMODULES-PATH`)
    ///
    /// Values are trimmed; an empty value counts as unset.
    pub fn input(&self, name: &str) -> Option<String> {
        let key = input_variable(name);
        self.inputs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Inputs resolved eagerly when building from a lookup
const INPUT_PROBES: &[&str] = &["requiredModules-path", "tools"];

fn input_variable(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// Runner-style name of the OS this binary was built for
fn host_os() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        other => other,
    }
}
