// Library interface for Stowage
// This allows integration tests and external code to use Stowage's modules

pub mod actions;
pub mod cache;
pub mod cli_utils;
pub mod config;
pub mod env;
pub mod gitversion;
pub mod logging;
pub mod modules;
pub mod process;
pub mod storage;

// Re-export commonly used types
pub use cache::{CacheError, CacheKey, CachedOperation, KeyBuilder, Outcome, RestoreErrorPolicy};
pub use env::EnvironmentContext;
pub use storage::{CacheStore, LocalStore, SaveOutcome, StorageBackend, StoreError};
