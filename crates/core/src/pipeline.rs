//! Concatenation pipeline
//!
//! Resolves a target once, then streams each resolved object into the
//! sink in key order. Objects are fetched strictly one after another;
//! parallelism only exists between the ranges of the current object.

use humansize::{BINARY, format_size};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_PART_SIZE};
use crate::error::{Error, Result};
use crate::fetch::ObjectFetcher;
use crate::plan::RangePlan;
use crate::resolve::Resolver;
use crate::retry::RetryPolicy;
use crate::target::{ObjectDescriptor, Target};
use crate::traits::ObjectStore;

/// Immutable parameters of one `cat` run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatOptions {
    part_size: u64,
    concurrency: usize,
    retry: RetryPolicy,
}

impl Default for CatOptions {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

impl CatOptions {
    /// Validate part size and concurrency; both must be positive
    pub fn new(part_size: u64, concurrency: usize) -> Result<Self> {
        if part_size == 0 {
            return Err(Error::Config("part size must be positive".into()));
        }
        if concurrency == 0 {
            return Err(Error::Config("concurrency must be positive".into()));
        }
        Ok(Self {
            part_size,
            concurrency,
            ..Self::default()
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

/// What a successful run wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatSummary {
    pub objects: usize,
    pub bytes: u64,
    /// Most ranges of one object held in flight or buffered at once
    pub peak_outstanding: usize,
}

/// Drives resolution and per-object fetches against one store
pub struct CatPipeline<'a> {
    store: &'a dyn ObjectStore,
    options: CatOptions,
}

impl<'a> CatPipeline<'a> {
    pub fn new(store: &'a dyn ObjectStore, options: CatOptions) -> Self {
        Self { store, options }
    }

    /// Stream every object `target` resolves to into `sink`
    ///
    /// The first failure stops the run. Objects already written stay
    /// written and the sink is flushed either way; nothing is written
    /// before resolution succeeds.
    pub async fn run<W>(&self, target: &Target, sink: &mut W) -> Result<CatSummary>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let objects = Resolver::new(self.store, self.options.retry)
            .resolve(target)
            .await?;
        tracing::debug!(path = %target, count = objects.len(), "resolved target");

        let copied = self.copy_all(&objects, sink).await;
        let flushed = sink.flush().await.map_err(Error::output);
        let summary = copied.and_then(|summary| flushed.map(|()| summary))?;
        tracing::debug!(
            objects = summary.objects,
            bytes = %format_size(summary.bytes, BINARY),
            peak_outstanding = summary.peak_outstanding,
            "cat complete"
        );
        Ok(summary)
    }

    async fn copy_all<W>(&self, objects: &[ObjectDescriptor], sink: &mut W) -> Result<CatSummary>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let fetcher = ObjectFetcher::new(self.store, self.options.retry);
        let mut summary = CatSummary::default();

        for object in objects {
            let object = fetcher.stat(object).await?;
            let size = object.size.unwrap_or_default();
            let plan = RangePlan::new(size, self.options.part_size, self.options.concurrency)?;
            tracing::debug!(
                object = %object.remote_path(),
                size = %format_size(size, BINARY),
                ranges = plan.len(),
                concurrency = plan.concurrency(),
                "fetching object"
            );

            let stats = fetcher.fetch(&object, &plan, sink).await?;
            summary.objects += 1;
            summary.bytes += stats.bytes;
            summary.peak_outstanding = summary.peak_outstanding.max(stats.peak_outstanding);
        }
        Ok(summary)
    }
}
