//! Hierarchical cache-key restore/save protocol
//!
//! A cached operation persists a set of filesystem paths under a key built from
//! ordered components. On restore, the exact key is tried first, then every
//! strict prefix of the component list. The expensive operation only runs (and a
//! save only happens) when nothing matched.

pub mod error;
pub mod key;
pub mod operation;

pub use error::CacheError;
pub use key::{escape_component, CacheKey, KeyBuilder, KeyError, KEY_DELIMITER};
pub use operation::{CachedOperation, Outcome, RestoreErrorPolicy, RestoreOutcome};
