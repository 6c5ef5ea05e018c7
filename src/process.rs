/// External command invocation
///
/// Call sites reach external tools (`dotnet`, `dotnet-gitversion`, `pwsh`) only
/// through [`CommandRunner`], so the cache protocol can be exercised with a fake.
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner {
    /// Run to completion capturing stdout/stderr; non-zero exit is an error
    fn capture(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Run to completion with inherited stdio; non-zero exit is an error
    fn stream(&self, program: &str, args: &[String]) -> Result<()>;
}

/// Runs commands on the host, resolving programs from PATH
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(program: &str, args: &[String]) -> Command {
        // Resolve from PATH; fall back to the name as given
        let resolved = which::which(program).unwrap_or_else(|e| {
            debug!("Could not find '{}' in PATH: {}. Trying as-is.", program, e);
            PathBuf::from(program)
        });

        let mut cmd = Command::new(resolved);
        cmd.args(args);
        cmd
    }
}

impl CommandRunner for SystemRunner {
    fn capture(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!("Running: {} {}", program, args.join(" "));

        let output = Self::command(program, args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn {}", program))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            );
        }

        Ok(CommandOutput { stdout, stderr })
    }

    fn stream(&self, program: &str, args: &[String]) -> Result<()> {
        info!("> {} {}", program, args.join(" "));

        let status = Self::command(program, args)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("Failed to spawn {}", program))?;

        if !status.success() {
            anyhow::bail!("{} exited with {}", program, status);
        }

        Ok(())
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_capture_stdout() {
        let output = SystemRunner
            .capture("sh", &["-c".to_string(), "echo hello".to_string()])
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn test_capture_non_zero_exit_is_error() {
        let err = SystemRunner
            .capture("sh", &["-c".to_string(), "echo nope >&2; exit 3".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_stream_reports_failure() {
        assert!(SystemRunner
            .stream("sh", &["-c".to_string(), "exit 1".to_string()])
            .is_err());
        assert!(SystemRunner
            .stream("sh", &["-c".to_string(), "true".to_string()])
            .is_ok());
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let err = SystemRunner
            .capture("stowage-definitely-missing-binary", &[])
            .unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }
}
