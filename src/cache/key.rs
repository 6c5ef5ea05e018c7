/// Cache key derivation
///
/// A key is an ordered list of components joined with `-`. Fallback keys are
/// every strict, non-empty prefix of that list, shortest first.
use thiserror::Error;

/// Separator placed between key components
pub const KEY_DELIMITER: char = '-';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("cache key must have at least one component")]
    Empty,

    #[error("cache key component {index} is empty")]
    EmptyComponent { index: usize },

    #[error("cache key component {index} ('{value}') contains the delimiter '-'")]
    DelimiterInComponent { index: usize, value: String },
}

/// Exact key plus its ordered fallback keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub exact: String,
    pub fallbacks: Vec<String>,
}

impl CacheKey {
    /// Whether `key` is this key's exact form (as opposed to a fallback)
    pub fn is_exact(&self, key: &str) -> bool {
        self.exact == key
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.exact)
    }
}

pub struct KeyBuilder;

impl KeyBuilder {
    /// Join components verbatim and derive the prefix fallbacks
    ///
    /// No normalization is applied. Zero or one component yields no fallbacks.
    pub fn build<S: AsRef<str>>(components: &[S]) -> CacheKey {
        let parts: Vec<&str> = components.iter().map(AsRef::as_ref).collect();
        let delimiter = KEY_DELIMITER.to_string();

        let fallbacks = (1..parts.len())
            .map(|len| parts[..len].join(&delimiter))
            .collect();

        CacheKey {
            exact: parts.join(&delimiter),
            fallbacks,
        }
    }

    /// Like [`KeyBuilder::build`], but rejects components that would make the
    /// component boundaries ambiguous
    pub fn build_strict<S: AsRef<str>>(components: &[S]) -> Result<CacheKey, KeyError> {
        if components.is_empty() {
            return Err(KeyError::Empty);
        }

        for (index, component) in components.iter().enumerate() {
            let value = component.as_ref();
            if value.is_empty() {
                return Err(KeyError::EmptyComponent { index });
            }
            if value.contains(KEY_DELIMITER) {
                return Err(KeyError::DelimiterInComponent {
                    index,
                    value: value.to_string(),
                });
            }
        }

        Ok(Self::build(components))
    }
}

/// Percent-escape a value so it can be used as a single key component
///
/// `%` becomes `%25` and the delimiter becomes `%2D`; everything else is kept.
pub fn escape_component(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            KEY_DELIMITER => escaped.push_str("%2D"),
            other => escaped.push(other),
        }
    }
    escaped
}
