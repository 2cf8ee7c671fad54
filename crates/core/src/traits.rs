//! ObjectStore trait definition
//!
//! This trait is the storage capability the retrieval engine needs: listing,
//! metadata lookup and ranged reads. It keeps the engine independent of the
//! S3 SDK so it can be driven by an in-memory store in tests.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::plan::ByteRange;
use crate::target::ObjectDescriptor;

/// Metadata for an object or common prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key or common prefix
    pub key: String,

    /// Size in bytes (zero for prefixes)
    pub size: u64,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Version ID, when the bucket is versioned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,

    /// Whether this is a directory/prefix
    pub is_dir: bool,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for a file
    pub fn file(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            etag: None,
            version_id: None,
            is_dir: false,
        }
    }

    /// Create a new ObjectInfo for a directory/prefix
    pub fn dir(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: 0,
            etag: None,
            version_id: None,
            is_dir: true,
        }
    }
}

/// Result of a list operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResult {
    /// Listed objects
    pub items: Vec<ObjectInfo>,

    /// Whether the result is truncated (more items available)
    pub truncated: bool,

    /// Continuation token for pagination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Options for list operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Key prefix to list under
    pub prefix: Option<String>,

    /// Delimiter for grouping (usually "/"); `None` lists recursively
    pub delimiter: Option<String>,

    /// Maximum number of keys to return per request
    pub max_keys: Option<i32>,

    /// Continuation token for pagination
    pub continuation_token: Option<String>,
}

/// Response body of a streamed range read
pub type ByteReader = Box<dyn AsyncRead + Unpin + Send>;

/// Trait for S3-compatible storage operations
///
/// Implementations must be safe for concurrent use: range reads of one
/// object are issued concurrently against a shared connection pool.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of objects in a bucket
    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult>;

    /// Get object metadata, honouring the descriptor's version pin
    async fn head_object(&self, object: &ObjectDescriptor) -> Result<ObjectInfo>;

    /// Read `range` of the object into memory
    ///
    /// Honours the descriptor's version pin and etag; an etag that no
    /// longer matches is [`Error::ObjectChanged`](crate::Error::ObjectChanged).
    async fn get_object_range(&self, object: &ObjectDescriptor, range: ByteRange) -> Result<Bytes>;

    /// Start reading `range` of the object as a stream
    ///
    /// Same pinning rules as `get_object_range`. Only the response head is
    /// awaited; the body is pulled by the caller.
    async fn open_range(&self, object: &ObjectDescriptor, range: ByteRange) -> Result<ByteReader>;
}
