//! Targets and object descriptors
//!
//! A [`Target`] is the user's request before resolution. It is classified up
//! front into a [`TargetKind`] so the rest of the engine never branches on
//! the shape of the raw string.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::path::{RemotePath, parse_path};
use crate::traits::ObjectInfo;

/// A user-supplied path expression plus optional version pin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    raw: String,
    path: RemotePath,
    version_id: Option<String>,
    literal: bool,
}

/// The three shapes a target can take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// An exact object key
    Key(String),
    /// Every object directly under a prefix; empty for the bucket root
    Prefix(String),
    /// Keys matching a glob pattern, listed from its literal prefix
    Pattern {
        pattern: String,
        literal_prefix: String,
    },
}

impl Target {
    /// Parse a raw path expression, rejecting anything that is not remote
    pub fn parse(raw: impl Into<String>, version_id: Option<String>) -> Result<Self> {
        let raw = raw.into();
        let path = parse_path(&raw)?.into_remote()?;
        Ok(Self {
            raw,
            path,
            version_id,
            literal: false,
        })
    }

    /// Treat `*`, `?` and `[` in the key as ordinary characters
    ///
    /// Needed for keys such as `logs/file[1].txt`, which would otherwise
    /// be read as a pattern.
    pub fn into_literal(mut self) -> Self {
        self.literal = true;
        self
    }

    /// The expression exactly as the user typed it
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn bucket(&self) -> &str {
        &self.path.bucket
    }

    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    /// Classify the target
    ///
    /// Wildcards take precedence over a trailing separator, so `dir/*/`
    /// is a pattern rather than a prefix. Literal targets have no wildcards.
    pub fn kind(&self) -> TargetKind {
        if !self.literal && self.path.has_wildcard() {
            TargetKind::Pattern {
                pattern: self.path.key.clone(),
                literal_prefix: self.path.literal_prefix().to_string(),
            }
        } else if self.path.is_dir {
            TargetKind::Prefix(self.path.key.clone())
        } else {
            TargetKind::Key(self.path.key.clone())
        }
    }

    /// Reject a version pin on anything but an exact key
    pub fn validate_version_scope(&self) -> Result<()> {
        match (self.version_id.is_some(), self.kind()) {
            (true, TargetKind::Prefix(_) | TargetKind::Pattern { .. }) => {
                Err(Error::InvalidVersionScope)
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolved identity of one retrievable object version
///
/// Every range of one object is read against the same `version_id` or,
/// failing that, the same `etag`, so an overwrite during the read is
/// reported instead of splicing two versions together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDescriptor {
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    /// Known from listing; `None` until a head request for exact keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Entity tag every range read must match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ObjectDescriptor {
    /// Descriptor for an exact key whose size is not yet known
    pub fn unsized_key(
        bucket: impl Into<String>,
        key: impl Into<String>,
        version_id: Option<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            version_id,
            size: None,
            etag: None,
        }
    }

    /// Descriptor for a listed object, pinned to what the listing saw
    pub fn listed(bucket: impl Into<String>, info: ObjectInfo) -> Self {
        Self {
            bucket: bucket.into(),
            key: info.key,
            version_id: info.version_id,
            size: Some(info.size),
            etag: info.etag,
        }
    }

    /// Copy of this descriptor carrying the size and etag of a head response
    ///
    /// The version id is left as requested: an unpinned read stays
    /// unpinned by version and relies on the etag instead.
    pub fn pinned_to(&self, info: &ObjectInfo) -> Self {
        Self {
            size: Some(info.size),
            etag: info.etag.clone().or_else(|| self.etag.clone()),
            ..self.clone()
        }
    }

    /// Whether range reads are tied to one version of the object
    pub fn is_pinned(&self) -> bool {
        self.version_id.is_some() || self.etag.is_some()
    }

    /// Full remote path, used in log and error messages
    pub fn remote_path(&self) -> RemotePath {
        RemotePath::new(&self.bucket, &self.key)
    }
}
