//! Path parsing
//!
//! Remote paths have the format `s3://bucket[/key]`. Anything without the
//! `s3://` scheme is a local path, which the retrieval engine rejects.

use crate::error::{Error, Result};

/// URL scheme marking a remote object path
pub const REMOTE_SCHEME: &str = "s3://";

/// Characters that turn a key into a wildcard pattern
pub const WILDCARD_CHARS: [char; 3] = ['*', '?', '['];

/// A parsed remote path pointing to an S3 location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    /// Bucket name
    pub bucket: String,
    /// Object key, prefix or pattern (empty for bucket root)
    pub key: String,
    /// Whether the path ends with a slash (directory semantics)
    pub is_dir: bool,
}

impl RemotePath {
    /// Create a new RemotePath
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        let is_dir = key.ends_with('/') || key.is_empty();
        Self {
            bucket: bucket.into(),
            key,
            is_dir,
        }
    }

    /// Whether the key contains a wildcard character
    pub fn has_wildcard(&self) -> bool {
        self.key.contains(WILDCARD_CHARS)
    }

    /// Key text before the first wildcard character
    pub fn literal_prefix(&self) -> &str {
        match self.key.find(WILDCARD_CHARS) {
            Some(pos) => &self.key[..pos],
            None => &self.key,
        }
    }

    /// Get the full path as a string (s3://bucket/key)
    pub fn to_full_path(&self) -> String {
        if self.key.is_empty() {
            format!("{REMOTE_SCHEME}{}", self.bucket)
        } else {
            format!("{REMOTE_SCHEME}{}/{}", self.bucket, self.key)
        }
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_full_path())
    }
}

/// Parsed path that can be either local or remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    /// Local filesystem path
    Local(std::path::PathBuf),
    /// Remote S3 path
    Remote(RemotePath),
}

impl ParsedPath {
    /// Check if this is a remote path
    pub fn is_remote(&self) -> bool {
        matches!(self, ParsedPath::Remote(_))
    }

    /// Get the remote path if this is a remote path
    pub fn as_remote(&self) -> Option<&RemotePath> {
        match self {
            ParsedPath::Remote(p) => Some(p),
            ParsedPath::Local(_) => None,
        }
    }

    /// Consume into the remote path, rejecting local paths
    pub fn into_remote(self) -> Result<RemotePath> {
        match self {
            ParsedPath::Remote(p) => Ok(p),
            ParsedPath::Local(_) => Err(Error::SourceNotRemote),
        }
    }
}

/// Parse a path string into a ParsedPath
///
/// Only the `s3://` scheme (case-insensitive) is remote. The bucket is the
/// first segment after the scheme and may not contain wildcards.
pub fn parse_path(path: &str) -> Result<ParsedPath> {
    if path.is_empty() {
        return Err(Error::InvalidPath("path cannot be empty".into()));
    }

    let Some(rest) = strip_scheme(path) else {
        return Ok(ParsedPath::Local(std::path::PathBuf::from(path)));
    };

    let (bucket, key) = match rest.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (rest, ""),
    };

    if bucket.is_empty() {
        return Err(Error::InvalidPath(format!(
            "'{path}' has no bucket. Use format: s3://bucket[/key]"
        )));
    }

    if bucket.contains(WILDCARD_CHARS) {
        return Err(Error::InvalidPath(format!(
            "bucket name '{bucket}' cannot contain wildcards"
        )));
    }

    Ok(ParsedPath::Remote(RemotePath::new(bucket, key)))
}

fn strip_scheme(path: &str) -> Option<&str> {
    let (scheme, rest) = path.split_at_checked(REMOTE_SCHEME.len())?;
    scheme.eq_ignore_ascii_case(REMOTE_SCHEME).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_path() {
        let path = parse_path("s3://bucket/file.txt").unwrap();
        assert!(path.is_remote());

        let remote = path.as_remote().unwrap();
        assert_eq!(remote.bucket, "bucket");
        assert_eq!(remote.key, "file.txt");
        assert!(!remote.is_dir);
        assert!(!remote.has_wildcard());
    }

    #[test]
    fn test_parse_remote_path_dir() {
        let path = parse_path("s3://bucket/dir/").unwrap();
        let remote = path.as_remote().unwrap();
        assert_eq!(remote.key, "dir/");
        assert!(remote.is_dir);
    }

    #[test]
    fn test_parse_bucket_root() {
        for raw in ["s3://bucket", "s3://bucket/"] {
            let remote = parse_path(raw).unwrap().into_remote().unwrap();
            assert_eq!(remote.bucket, "bucket");
            assert_eq!(remote.key, "");
            assert!(remote.is_dir);
        }
    }

    #[test]
    fn test_parse_scheme_case_insensitive() {
        let remote = parse_path("S3://bucket/a").unwrap().into_remote().unwrap();
        assert_eq!(remote.key, "a");
    }

    #[test]
    fn test_parse_local_paths() {
        for raw in ["file.txt", "./file.txt", "/tmp/file.txt", "bucket/key", "s3:/x"] {
            let parsed = parse_path(raw).unwrap();
            assert!(!parsed.is_remote(), "{raw} should be local");
            assert!(matches!(
                parsed.into_remote(),
                Err(Error::SourceNotRemote)
            ));
        }
    }

    #[test]
    fn test_parse_invalid_remote() {
        assert!(parse_path("").is_err());
        assert!(matches!(
            parse_path("s3://"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            parse_path("s3://buck*/key"),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_wildcard_detection() {
        let remote = RemotePath::new("b", "dir/log-file-2024-*");
        assert!(remote.has_wildcard());
        assert_eq!(remote.literal_prefix(), "dir/log-file-2024-");

        let remote = RemotePath::new("b", "file?.txt");
        assert_eq!(remote.literal_prefix(), "file");

        let remote = RemotePath::new("b", "plain/key");
        assert_eq!(remote.literal_prefix(), "plain/key");
    }

    #[test]
    fn test_remote_path_display() {
        let path = RemotePath::new("bucket", "key/file.txt");
        assert_eq!(path.to_string(), "s3://bucket/key/file.txt");
        assert_eq!(RemotePath::new("bucket", "").to_string(), "s3://bucket");
    }
}
