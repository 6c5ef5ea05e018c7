/// CLI utilities for consistent output formatting
use std::io::IsTerminal;

use crate::cache::Outcome;
use crate::storage::SaveOutcome;

/// Get a colored prefix
///
/// Returns bright cyan if stderr is a TTY, plain text otherwise.
pub fn stowage_prefix() -> &'static str {
    if std::io::stderr().is_terminal() {
        "\x1b[96m[stowage]\x1b[0m"
    } else {
        "[stowage]"
    }
}

/// One-line human summary of a cached operation
pub fn describe_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Hit { key, exact: true } => format!("Cache hit: {}", key),
        Outcome::Hit { key, exact: false } => format!("Cache hit (fallback): {}", key),
        Outcome::Computed {
            key,
            save: SaveOutcome::Stored,
        } => format!("Cache miss, saved: {}", key),
        Outcome::Computed {
            key,
            save: SaveOutcome::AlreadyExists,
        } => format!("Cache miss, already saved by another run: {}", key),
    }
}
