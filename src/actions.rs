//! GitHub Actions workflow plumbing
//!
//! Step outputs go to the `GITHUB_OUTPUT` file when the runner provides one and
//! fall back to the legacy `::set-output` command otherwise. Failures are
//! reported with an `::error::` annotation.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::env::EnvironmentContext;

/// Where step outputs are written
pub enum OutputSink {
    File(PathBuf),
    Stdout,
    /// Collects outputs in memory
    Memory(Vec<(String, String)>),
}

impl OutputSink {
    pub fn from_context(ctx: &EnvironmentContext) -> Self {
        match &ctx.output_file {
            Some(path) => OutputSink::File(path.clone()),
            None => OutputSink::Stdout,
        }
    }

    /// Set a named step output
    pub fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        match self {
            OutputSink::File(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&*path)
                    .with_context(|| format!("Failed to open output file: {}", path.display()))?;
                file.write_all(file_command(name, value).as_bytes())
                    .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            }
            OutputSink::Stdout => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "::set-output name={}::{}", name, escape_data(value))?;
            }
            OutputSink::Memory(outputs) => outputs.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Outputs collected by a memory sink
    pub fn collected(&self) -> &[(String, String)] {
        match self {
            OutputSink::Memory(outputs) => outputs,
            _ => &[],
        }
    }
}

/// `name=value` line, or the heredoc form for multi-line values
fn file_command(name: &str, value: &str) -> String {
    if value.contains('\n') || value.contains('\r') {
        let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
        format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
    } else {
        format!("{name}={value}\n")
    }
}

/// Escape a workflow command value (`%`, CR, LF)
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Print a failure annotation for the step
pub fn set_failed(message: &str) {
    println!("::error::{}", escape_data(message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_outputs_single_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("output");
        let mut sink = OutputSink::File(path.clone());

        sink.set_output("SemVer", "1.2.3").unwrap();
        sink.set_output("Major", "1").unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "SemVer=1.2.3\nMajor=1\n");
    }

    #[test]
    fn test_file_outputs_multi_line_use_heredoc() {
        let line = file_command("notes", "first\nsecond");
        let mut lines = line.lines();

        let header = lines.next().unwrap();
        let delimiter = header.strip_prefix("notes<<").unwrap();
        assert!(delimiter.starts_with("ghadelimiter_"));
        assert_eq!(lines.next(), Some("first"));
        assert_eq!(lines.next(), Some("second"));
        assert_eq!(lines.next(), Some(delimiter));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_escape_data() {
        assert_eq!(escape_data("100% done\r\nnext"), "100%25 done%0D%0Anext");
    }

    #[test]
    fn test_memory_sink_collects() {
        let mut sink = OutputSink::Memory(Vec::new());
        sink.set_output("Sha", "abc").unwrap();
        assert_eq!(sink.collected(), &[("Sha".to_string(), "abc".to_string())]);
    }

    #[test]
    fn test_sink_from_context() {
        let ctx = EnvironmentContext::from_lookup(|key| {
            (key == "GITHUB_OUTPUT").then(|| "/tmp/github_output".to_string())
        });
        assert!(matches!(OutputSink::from_context(&ctx), OutputSink::File(p) if p == PathBuf::from("/tmp/github_output")));
    }
}
