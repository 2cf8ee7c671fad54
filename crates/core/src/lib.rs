//! oc-core: Core library for the objcat object streaming CLI
//!
//! This crate provides the retrieval engine behind `objcat cat`:
//! - Target parsing and classification (key, prefix, pattern)
//! - Wildcard matching and target resolution
//! - Range planning and ordered parallel fetching
//! - The concatenation pipeline and its error taxonomy
//! - Configuration management
//!
//! This crate is designed to be independent of any specific S3 SDK,
//! storage access goes through the [`ObjectStore`] trait.

pub mod config;
pub mod error;
pub mod fetch;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod path;
pub mod pipeline;
pub mod plan;
pub mod reorder;
pub mod resolve;
pub mod retry;
pub mod storage;
pub mod target;
pub mod traits;
pub mod wildcard;

pub use config::{Config, ConfigManager, DEFAULT_CONCURRENCY, DEFAULT_PART_SIZE};
pub use error::{Error, ErrorKind, Result};
pub use fetch::{FetchStats, ObjectFetcher};
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryStore;
pub use path::{ParsedPath, RemotePath, parse_path};
pub use pipeline::{CatOptions, CatPipeline, CatSummary};
pub use plan::{ByteRange, RangePlan};
pub use resolve::Resolver;
pub use retry::RetryPolicy;
pub use storage::{RetryConfig, StorageConfig, TimeoutConfig};
pub use target::{ObjectDescriptor, Target, TargetKind};
pub use traits::{ByteReader, ListOptions, ListResult, ObjectInfo, ObjectStore};
pub use wildcard::{GlobMatcher, KeyMatcher, matches};
