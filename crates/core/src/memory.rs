//! In-memory ObjectStore
//!
//! A versioned bucket/key store for tests of the engine and the CLI. It can
//! inject transient failures, make later ranges complete before earlier
//! ones, and records how many range reads were outstanding at once and the
//! largest range it had to hand back as one buffer.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::plan::ByteRange;
use crate::target::ObjectDescriptor;
use crate::traits::{ByteReader, ListOptions, ListResult, ObjectInfo, ObjectStore};

const DEFAULT_PAGE_SIZE: usize = 1000;
const REVERSE_SPAN: u32 = 4;

#[derive(Debug, Clone)]
struct Version {
    id: String,
    data: Bytes,
}

impl Version {
    fn etag(&self) -> String {
        format!("etag-{}", self.id)
    }

    fn info(&self, key: &str) -> ObjectInfo {
        let mut info = ObjectInfo::file(key, self.data.len() as u64);
        info.version_id = Some(self.id.clone());
        info.etag = Some(self.etag());
        info
    }
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, Vec<Version>>>,
    next_version: u64,
    failing_keys: HashSet<String>,
}

/// Versioned in-memory object store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    reverse_step: Option<Duration>,
    transient_failures: AtomicU32,
    list_calls: AtomicUsize,
    head_calls: AtomicUsize,
    range_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    largest_buffered_read: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay range reads so that, within each run of `REVERSE_SPAN`
    /// consecutive indices, the highest index completes first
    pub fn with_reverse_completion(mut self, step: Duration) -> Self {
        self.reverse_step = Some(step);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.state().buckets.entry(bucket.to_string()).or_default();
    }

    /// Write a new version of `key`, creating the bucket if needed, and
    /// return its version id
    pub fn put(&self, bucket: &str, key: &str, data: impl Into<Bytes>) -> String {
        let mut state = self.state();
        state.next_version += 1;
        let id = format!("v{}", state.next_version);
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .push(Version {
                id: id.clone(),
                data: data.into(),
            });
        id
    }

    /// Version ids of `key`, oldest first
    pub fn versions(&self, bucket: &str, key: &str) -> Vec<String> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|keys| keys.get(key))
            .map(|versions| versions.iter().map(|v| v.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Fail the next `count` range reads with a network error
    pub fn fail_next_reads(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Fail every range read of `key` with a network error
    pub fn fail_reads_of(&self, key: &str) {
        self.state().failing_keys.insert(key.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    /// Total storage requests of any kind
    pub fn request_count(&self) -> usize {
        self.list_calls() + self.head_calls() + self.range_calls()
    }

    /// Highest number of range reads observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Largest payload returned by `get_object_range`; streamed reads are
    /// not counted
    pub fn largest_buffered_read(&self) -> u64 {
        self.largest_buffered_read.load(Ordering::SeqCst)
    }

    fn lookup(&self, object: &ObjectDescriptor) -> Result<Version> {
        let state = self.state();
        let keys = state
            .buckets
            .get(&object.bucket)
            .ok_or_else(|| Error::NotFound("bucket".into()))?;
        let versions = keys
            .get(&object.key)
            .ok_or_else(|| Error::NotFound("object".into()))?;

        let found: &Version = match &object.version_id {
            Some(id) => versions.iter().find(|v| &v.id == id).ok_or_else(|| {
                Error::VersionNotFound {
                    key: object.key.clone(),
                    version_id: id.clone(),
                }
            })?,
            None => versions
                .last()
                .ok_or_else(|| Error::NotFound("object".into()))?,
        };
        if let Some(etag) = &object.etag
            && *etag != found.etag()
        {
            return Err(Error::ObjectChanged {
                key: object.key.clone(),
            });
        }
        Ok(found.clone())
    }

    /// Shared body of buffered and streamed range reads
    async fn read_range(&self, object: &ObjectDescriptor, range: ByteRange) -> Result<Bytes> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        if let Some(step) = self.reverse_step {
            tokio::time::sleep(step * (REVERSE_SPAN - range.index % REVERSE_SPAN)).await;
        }

        let injected = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected || self.state().failing_keys.contains(&object.key) {
            return Err(Error::Network(format!(
                "injected failure reading {}",
                object.key
            )));
        }

        let version = self.lookup(object)?;
        let len = version.data.len() as u64;
        let start = range.start.min(len) as usize;
        let end = range.end.min(len) as usize;
        Ok(version.data.slice(start..end))
    }
}

/// Decrements the in-flight counter even when the read is cancelled
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let state = self.state();
        let keys = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Error::NotFound("bucket".into()))?;
        let prefix = options.prefix.unwrap_or_default();

        // Objects and common prefixes share one sorted key space
        let mut entries: BTreeMap<String, ObjectInfo> = BTreeMap::new();
        let mut common: BTreeSet<String> = BTreeSet::new();
        for (key, versions) in keys.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            let Some(latest) = versions.last() else {
                continue;
            };
            let rest = &key[prefix.len()..];
            match options.delimiter.as_deref().and_then(|d| rest.find(d).map(|i| (d, i))) {
                Some((delimiter, pos)) => {
                    common.insert(format!("{prefix}{}{delimiter}", &rest[..pos]));
                }
                None => {
                    entries.insert(key.clone(), latest.info(key));
                }
            }
        }
        for dir in common {
            entries.entry(dir.clone()).or_insert_with(|| ObjectInfo::dir(dir));
        }

        let start_after = options.continuation_token.unwrap_or_default();
        let page_size = options
            .max_keys
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let mut remaining = entries
            .into_values()
            .filter(|info| start_after.is_empty() || info.key > start_after);
        let items: Vec<ObjectInfo> = remaining.by_ref().take(page_size).collect();
        let truncated = remaining.next().is_some();
        let continuation_token = truncated
            .then(|| items.last().map(|info| info.key.clone()))
            .flatten();

        Ok(ListResult {
            items,
            truncated,
            continuation_token,
        })
    }

    async fn head_object(&self, object: &ObjectDescriptor) -> Result<ObjectInfo> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookup(object)?.info(&object.key))
    }

    async fn get_object_range(&self, object: &ObjectDescriptor, range: ByteRange) -> Result<Bytes> {
        let data = self.read_range(object, range).await?;
        self.largest_buffered_read
            .fetch_max(data.len() as u64, Ordering::SeqCst);
        Ok(data)
    }

    async fn open_range(&self, object: &ObjectDescriptor, range: ByteRange) -> Result<ByteReader> {
        let data = self.read_range(object, range).await?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }
}
