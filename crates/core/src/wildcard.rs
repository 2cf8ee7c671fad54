//! Wildcard key matching
//!
//! Keys live in a flat namespace where `/` is only a convention, but
//! patterns treat it as a boundary: `*` and `?` never match `/`, while a
//! `**` path component matches any number of levels. Matching is a pure
//! predicate behind the [`KeyMatcher`] trait so resolution can use other
//! policies.

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};
use crate::path::WILDCARD_CHARS;

/// Predicate deciding whether a listed key belongs to a pattern target
pub trait KeyMatcher: Send + Sync {
    /// Whether `key` matches
    fn matches(&self, key: &str) -> bool;

    /// Whether matching keys may sit below the next `/` after the literal
    /// prefix, which forces a recursive listing
    fn needs_recursive_listing(&self) -> bool {
        true
    }
}

/// Glob-syntax matcher (`*`, `?`, `[...]`, `**`)
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    source: String,
    pattern: Pattern,
    options: MatchOptions,
}

impl GlobMatcher {
    /// Compile a pattern whose single-character and sequence wildcards stop
    /// at `/`
    pub fn new(pattern: &str) -> Result<Self> {
        Self::with_options(pattern, true)
    }

    /// Compile a pattern whose wildcards also match `/`
    pub fn crossing_separators(pattern: &str) -> Result<Self> {
        Self::with_options(pattern, false)
    }

    fn with_options(pattern: &str, require_literal_separator: bool) -> Result<Self> {
        let compiled = Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            pattern: compiled,
            options: MatchOptions {
                case_sensitive: true,
                require_literal_separator,
                require_literal_leading_dot: false,
            },
        })
    }

    /// The pattern text
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl KeyMatcher for GlobMatcher {
    fn matches(&self, key: &str) -> bool {
        self.pattern.matches_with(key, self.options)
    }

    fn needs_recursive_listing(&self) -> bool {
        if !self.options.require_literal_separator || self.source.contains("**") {
            return true;
        }
        match self.source.find(WILDCARD_CHARS) {
            Some(pos) => self.source[pos..].contains('/'),
            None => false,
        }
    }
}

/// Total predicate: does `key` match `pattern`
///
/// An unparseable pattern matches nothing; callers that need to report it
/// compile a [`GlobMatcher`] first.
pub fn matches(pattern: &str, key: &str) -> bool {
    GlobMatcher::new(pattern)
        .map(|m| m.matches(key))
        .unwrap_or(false)
}
