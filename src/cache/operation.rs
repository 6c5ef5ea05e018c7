/// Restore → compute → save orchestration
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use super::error::CacheError;
use super::key::{CacheKey, KeyBuilder};
use crate::logging::{operations, status};
use crate::storage::{CacheStore, SaveOutcome, StoreError};

/// What a restore attempt found
#[derive(Debug)]
pub enum RestoreOutcome {
    Hit(String),
    Miss,
    Failed(StoreError),
}

/// How to treat a restore that failed for infrastructure reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RestoreErrorPolicy {
    /// Abort the operation with the store error
    #[default]
    Fail,
    /// Log the error and recompute as if nothing was cached
    Miss,
}

/// Result of a successful cached operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A cached entry was restored; the operation was skipped
    Hit { key: String, exact: bool },
    /// Nothing was cached; the operation ran and its output was offered to the store
    Computed { key: String, save: SaveOutcome },
}

impl Outcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, Outcome::Hit { .. })
    }

    /// The matched key on a hit, the exact key otherwise
    pub fn key(&self) -> &str {
        match self {
            Outcome::Hit { key, .. } | Outcome::Computed { key, .. } => key,
        }
    }
}

/// Runs an expensive operation behind a cache store
///
/// One `run` is a strictly sequential pipeline: at most one restore, at most one
/// compute, and at most one save, which only happens after a confirmed miss and
/// a successful compute.
pub struct CachedOperation<'a, S: CacheStore + ?Sized> {
    store: &'a S,
    restore_errors: RestoreErrorPolicy,
}

impl<'a, S: CacheStore + ?Sized> CachedOperation<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            restore_errors: RestoreErrorPolicy::default(),
        }
    }

    pub fn restore_errors(mut self, policy: RestoreErrorPolicy) -> Self {
        self.restore_errors = policy;
        self
    }

    /// Ask the store for the exact key or the best fallback
    pub fn restore(&self, paths: &[PathBuf], key: &CacheKey) -> RestoreOutcome {
        match self.store.restore(paths, &key.exact, &key.fallbacks) {
            Ok(Some(matched)) => RestoreOutcome::Hit(matched),
            Ok(None) => RestoreOutcome::Miss,
            Err(e) => RestoreOutcome::Failed(e),
        }
    }

    /// Restore the paths for `components`, or populate them with `compute` and save
    pub fn run<C, F>(
        &self,
        paths: &[PathBuf],
        components: &[C],
        compute: F,
    ) -> Result<Outcome, CacheError>
    where
        C: AsRef<str>,
        F: FnOnce() -> anyhow::Result<()>,
    {
        let key = KeyBuilder::build_strict(components)?;
        let store = self.store.name();

        info!(
            operation = operations::RESTORE,
            store,
            key = %key.exact,
            fallbacks = ?key.fallbacks,
            "Restoring {} path(s) from cache",
            paths.len()
        );

        match self.restore(paths, &key) {
            RestoreOutcome::Hit(matched) => {
                let exact = key.is_exact(&matched);
                info!(
                    operation = operations::RESTORE,
                    status = status::HIT,
                    store,
                    key = %matched,
                    exact,
                    "Cache hit"
                );
                return Ok(Outcome::Hit {
                    key: matched,
                    exact,
                });
            }
            RestoreOutcome::Miss => {
                info!(
                    operation = operations::RESTORE,
                    status = status::MISS,
                    store,
                    key = %key.exact,
                    "Cache miss"
                );
            }
            RestoreOutcome::Failed(e) => match self.restore_errors {
                RestoreErrorPolicy::Fail => return Err(CacheError::restore(e)),
                RestoreErrorPolicy::Miss => {
                    warn!(
                        operation = operations::RESTORE,
                        status = status::ERROR,
                        store,
                        key = %key.exact,
                        error = %e,
                        "Cache restore failed, continuing as a miss"
                    );
                }
            },
        }

        let started = Instant::now();
        compute().map_err(CacheError::ComputeFailed)?;
        info!(
            operation = operations::COMPUTE,
            status = status::SUCCESS,
            duration_ms = started.elapsed().as_millis() as u64,
            "Operation completed"
        );

        let save = self
            .store
            .save(paths, &key.exact)
            .map_err(CacheError::save)?;

        match save {
            SaveOutcome::Stored => info!(
                operation = operations::SAVE,
                status = status::SUCCESS,
                store,
                key = %key.exact,
                "New cache entry saved"
            ),
            SaveOutcome::AlreadyExists => info!(
                operation = operations::SAVE,
                status = status::EXISTS,
                store,
                key = %key.exact,
                "Cache entry already exists, not saved"
            ),
        }

        Ok(Outcome::Computed {
            key: key.exact,
            save,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    /// In-memory store recording every call
    #[derive(Default)]
    struct RecordingStore {
        keys: RefCell<HashSet<String>>,
        restores: Cell<usize>,
        saves: RefCell<Vec<String>>,
        fail_restore: bool,
        fail_save: bool,
        report_exists: bool,
    }

    impl RecordingStore {
        fn with_keys(keys: &[&str]) -> Self {
            let store = Self::default();
            store
                .keys
                .borrow_mut()
                .extend(keys.iter().map(|k| k.to_string()));
            store
        }
    }

    impl CacheStore for RecordingStore {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn restore(
            &self,
            _paths: &[PathBuf],
            exact: &str,
            fallbacks: &[String],
        ) -> Result<Option<String>, StoreError> {
            self.restores.set(self.restores.get() + 1);
            if self.fail_restore {
                return Err(StoreError::Http {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            let keys = self.keys.borrow();
            if keys.contains(exact) {
                return Ok(Some(exact.to_string()));
            }
            Ok(fallbacks.iter().rev().find(|f| keys.contains(*f)).cloned())
        }

        fn save(&self, _paths: &[PathBuf], exact: &str) -> Result<SaveOutcome, StoreError> {
            self.saves.borrow_mut().push(exact.to_string());
            if self.fail_save {
                return Err(StoreError::Http {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            if self.report_exists || !self.keys.borrow_mut().insert(exact.to_string()) {
                return Ok(SaveOutcome::AlreadyExists);
            }
            Ok(SaveOutcome::Stored)
        }
    }

    fn paths() -> Vec<PathBuf> {
        vec![PathBuf::from("/tmp/stowage-test")]
    }

    #[test]
    fn test_fallback_hit_skips_compute() {
        let store = RecordingStore::with_keys(&["a-b"]);
        let computed = Cell::new(0);

        let outcome = CachedOperation::new(&store)
            .run(&paths(), &["a", "b", "c"], || {
                computed.set(computed.get() + 1);
                Ok(())
            })
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Hit {
                key: "a-b".to_string(),
                exact: false
            }
        );
        assert_eq!(computed.get(), 0);
        assert!(store.saves.borrow().is_empty());
    }

    #[test]
    fn test_exact_hit() {
        let store = RecordingStore::with_keys(&["a-b-c", "a-b"]);
        let outcome = CachedOperation::new(&store)
            .run(&paths(), &["a", "b", "c"], || Ok(()))
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Hit {
                key: "a-b-c".to_string(),
                exact: true
            }
        );
    }

    #[test]
    fn test_miss_computes_once_and_saves_exact_key() {
        let store = RecordingStore::default();
        let computed = Cell::new(0);

        let outcome = CachedOperation::new(&store)
            .run(&paths(), &["a", "b", "c"], || {
                computed.set(computed.get() + 1);
                Ok(())
            })
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Computed {
                key: "a-b-c".to_string(),
                save: SaveOutcome::Stored
            }
        );
        assert_eq!(computed.get(), 1);
        assert_eq!(*store.saves.borrow(), vec!["a-b-c".to_string()]);
    }

    #[test]
    fn test_compute_failure_skips_save() {
        let store = RecordingStore::default();

        let result = CachedOperation::new(&store).run(&paths(), &["a", "b"], || {
            anyhow::bail!("dotnet tool install exited with status 1")
        });

        match result {
            Err(CacheError::ComputeFailed(source)) => {
                assert_eq!(source.to_string(), "dotnet tool install exited with status 1");
            }
            other => panic!("expected ComputeFailed, got {:?}", other),
        }
        assert!(store.saves.borrow().is_empty());
    }

    #[test]
    fn test_already_exists_is_success() {
        let store = RecordingStore {
            report_exists: true,
            ..Default::default()
        };

        let outcome = CachedOperation::new(&store)
            .run(&paths(), &["a"], || Ok(()))
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Computed {
                key: "a".to_string(),
                save: SaveOutcome::AlreadyExists
            }
        );
    }

    #[test]
    fn test_second_run_hits() {
        let store = RecordingStore::default();
        let computed = Cell::new(0);
        let operation = CachedOperation::new(&store);
        let compute = || -> anyhow::Result<()> {
            computed.set(computed.get() + 1);
            Ok(())
        };

        let first = operation.run(&paths(), &["Linux", "psmodules", "ABC"], compute).unwrap();
        let second = operation.run(&paths(), &["Linux", "psmodules", "ABC"], compute).unwrap();

        assert!(!first.is_hit());
        assert!(second.is_hit());
        assert_eq!(second.key(), "Linux-psmodules-ABC");
        assert_eq!(computed.get(), 1);
        assert_eq!(store.saves.borrow().len(), 1);
    }

    #[test]
    fn test_restore_failure_is_fatal_by_default() {
        let store = RecordingStore {
            fail_restore: true,
            ..Default::default()
        };
        let computed = Cell::new(false);

        let result = CachedOperation::new(&store).run(&paths(), &["a", "b"], || {
            computed.set(true);
            Ok(())
        });

        assert!(matches!(
            result,
            Err(CacheError::StoreUnavailable {
                operation: "restore",
                ..
            })
        ));
        assert!(!computed.get());
        assert!(store.saves.borrow().is_empty());
    }

    #[test]
    fn test_restore_failure_as_miss_computes_and_saves() {
        let store = RecordingStore {
            fail_restore: true,
            ..Default::default()
        };

        let outcome = CachedOperation::new(&store)
            .restore_errors(RestoreErrorPolicy::Miss)
            .run(&paths(), &["a", "b"], || Ok(()))
            .unwrap();

        assert!(!outcome.is_hit());
        assert_eq!(*store.saves.borrow(), vec!["a-b".to_string()]);
    }

    #[test]
    fn test_save_failure_propagates() {
        let store = RecordingStore {
            fail_save: true,
            ..Default::default()
        };

        let result = CachedOperation::new(&store).run(&paths(), &["a"], || Ok(()));
        assert!(matches!(
            result,
            Err(CacheError::StoreUnavailable {
                operation: "save",
                source: StoreError::Http { status: 500, .. }
            })
        ));
    }

    #[test]
    fn test_invalid_key_never_touches_store() {
        let store = RecordingStore::default();

        let result = CachedOperation::new(&store).run(&paths(), &["Linux", "dotnet-format"], || Ok(()));

        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
        assert_eq!(store.restores.get(), 0);
    }

    #[test]
    fn test_restore_outcome_tags_failure() {
        let store = RecordingStore {
            fail_restore: true,
            ..Default::default()
        };
        let key = KeyBuilder::build(&["a"]);
        assert!(matches!(
            CachedOperation::new(&store).restore(&paths(), &key),
            RestoreOutcome::Failed(_)
        ));
    }
}
