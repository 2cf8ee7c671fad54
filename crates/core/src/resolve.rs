//! Target resolution
//!
//! Expands a [`Target`] into the ordered list of objects to read:
//!
//! - exact key: one descriptor, existence checked later at fetch time
//! - prefix or bucket root: the objects directly under it, possibly none
//! - pattern: listed keys the matcher accepts, at least one

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::target::{ObjectDescriptor, Target, TargetKind};
use crate::traits::{ListOptions, ObjectStore};
use crate::wildcard::{GlobMatcher, KeyMatcher};

/// Key separator used as the listing delimiter
const SEPARATOR: &str = "/";

/// Expands targets into sorted object descriptors
pub struct Resolver<'a> {
    store: &'a dyn ObjectStore,
    retry: RetryPolicy,
    page_size: Option<i32>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            page_size: None,
        }
    }

    /// Limit the number of keys requested per listing page
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Resolve a target into descriptors sorted by key
    ///
    /// Version-scope and pattern errors are reported before any request.
    pub async fn resolve(&self, target: &Target) -> Result<Vec<ObjectDescriptor>> {
        target.validate_version_scope()?;
        let bucket = target.bucket();

        match target.kind() {
            TargetKind::Key(key) => {
                tracing::debug!(bucket, key, "resolved exact key");
                Ok(vec![ObjectDescriptor::unsized_key(
                    bucket,
                    key,
                    target.version_id().map(str::to_string),
                )])
            }
            TargetKind::Prefix(prefix) => {
                let objects = self.list(bucket, &prefix, Some(SEPARATOR)).await?;
                tracing::debug!(bucket, prefix, count = objects.len(), "resolved prefix");
                Ok(objects)
            }
            TargetKind::Pattern {
                pattern,
                literal_prefix,
            } => {
                let matcher = GlobMatcher::new(&pattern)?;
                self.resolve_pattern(bucket, &literal_prefix, &matcher).await
            }
        }
    }

    /// Resolve a pattern with an arbitrary matcher
    ///
    /// Lists everything under `literal_prefix` and keeps what `matcher`
    /// accepts. Zero matches is [`Error::NoMatch`].
    pub async fn resolve_pattern(
        &self,
        bucket: &str,
        literal_prefix: &str,
        matcher: &dyn KeyMatcher,
    ) -> Result<Vec<ObjectDescriptor>> {
        let delimiter = (!matcher.needs_recursive_listing()).then_some(SEPARATOR);
        let mut objects = self.list(bucket, literal_prefix, delimiter).await?;
        let listed = objects.len();
        objects.retain(|object| matcher.matches(&object.key));

        tracing::debug!(
            bucket,
            literal_prefix,
            listed,
            matched = objects.len(),
            "resolved pattern"
        );

        if objects.is_empty() {
            return Err(Error::NoMatch);
        }
        Ok(objects)
    }

    /// List every object under `prefix`, following continuation tokens
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<Vec<ObjectDescriptor>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let options = ListOptions {
                prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
                delimiter: delimiter.map(str::to_string),
                max_keys: self.page_size,
                continuation_token: continuation_token.take(),
            };
            let store = self.store;
            let page = self
                .retry
                .run("list objects", move || store.list_objects(bucket, options.clone()))
                .await?;

            objects.extend(
                page.items
                    .into_iter()
                    .filter(|item| !item.is_dir && !item.key.ends_with('/'))
                    .map(|item| ObjectDescriptor::listed(bucket, item)),
            );

            match (page.truncated, page.continuation_token) {
                (true, Some(token)) => continuation_token = Some(token),
                _ => break,
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        objects.dedup_by(|a, b| a.key == b.key);
        Ok(objects)
    }
}
