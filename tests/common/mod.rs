// Common test utilities shared across integration tests
//
// `MemoryStore` keeps keys in memory and writes a `.restored-from` marker
// into the first path on a hit, so tests can tell a restore happened without
// archiving anything.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::PathBuf;

use stowage::storage::{fallbacks_by_specificity, matches_fallback};
use stowage::{CacheStore, SaveOutcome, StoreError};

pub const MARKER: &str = ".restored-from";

#[derive(Default)]
pub struct MemoryStore {
    /// Saved keys, oldest first
    pub entries: RefCell<Vec<String>>,
    pub fail_restore: bool,
    pub fail_save: bool,
    pub restores: Cell<usize>,
    pub saves: Cell<usize>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn with_entries(keys: &[&str]) -> Self {
        Self {
            entries: RefCell::new(keys.iter().map(|k| k.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn failing_restore() -> Self {
        Self {
            fail_restore: true,
            ..Default::default()
        }
    }

    pub fn failing_save() -> Self {
        Self {
            fail_save: true,
            ..Default::default()
        }
    }

    fn lookup(&self, exact: &str, fallbacks: &[String]) -> Option<String> {
        let entries = self.entries.borrow();
        if entries.iter().any(|k| k == exact) {
            return Some(exact.to_string());
        }
        fallbacks_by_specificity(fallbacks)
            .into_iter()
            .find_map(|fallback| {
                entries
                    .iter()
                    .rev()
                    .find(|stored| matches_fallback(stored, fallback))
                    .cloned()
            })
    }
}

impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn restore(
        &self,
        paths: &[PathBuf],
        exact: &str,
        fallbacks: &[String],
    ) -> Result<Option<String>, StoreError> {
        self.restores.set(self.restores.get() + 1);
        if self.fail_restore {
            return Err(StoreError::NotConfigured("memory store offline".to_string()));
        }

        let matched = self.lookup(exact, fallbacks);
        if let (Some(key), Some(first)) = (&matched, paths.first()) {
            fs::create_dir_all(first)?;
            fs::write(first.join(MARKER), key)?;
        }
        Ok(matched)
    }

    fn save(&self, _paths: &[PathBuf], exact: &str) -> Result<SaveOutcome, StoreError> {
        self.saves.set(self.saves.get() + 1);
        if self.fail_save {
            return Err(StoreError::Http {
                status: 500,
                body: "upload rejected".to_string(),
            });
        }

        let mut entries = self.entries.borrow_mut();
        if entries.iter().any(|k| k == exact) {
            return Ok(SaveOutcome::AlreadyExists);
        }
        entries.push(exact.to_string());
        Ok(SaveOutcome::Stored)
    }
}
