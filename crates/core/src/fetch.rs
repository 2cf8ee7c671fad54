//! Object stream fetcher
//!
//! Executes a [`RangePlan`] against one object. A single-range plan is
//! copied from the response body straight into the sink, one read buffer
//! at a time. A multi-range plan keeps up to `concurrency` ranges
//! outstanding (in flight plus buffered); completions land in a
//! [`ReorderBuffer`] which is drained into the sink in index order after
//! every completion. Output is therefore identical to a sequential read
//! whatever order the network completes ranges in.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::plan::{ByteRange, RangePlan};
use crate::reorder::ReorderBuffer;
use crate::retry::{RetryPolicy, within};
use crate::target::ObjectDescriptor;
use crate::traits::ObjectStore;

/// Largest read buffer used when streaming a body
const STREAM_CHUNK: usize = 256 * 1024;

/// What one object fetch did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Ranges delivered to the sink
    pub ranges: usize,
    /// Bytes delivered to the sink
    pub bytes: u64,
    /// Highest number of in-flight plus buffered ranges observed
    pub peak_outstanding: usize,
}

/// Reads single objects through an [`ObjectStore`]
pub struct ObjectFetcher<'a> {
    store: &'a dyn ObjectStore,
    retry: RetryPolicy,
}

impl<'a> ObjectFetcher<'a> {
    pub fn new(store: &'a dyn ObjectStore, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Make sure the descriptor has a size and is pinned to one version
    ///
    /// Listed objects usually arrive complete. Exact keys need a head
    /// request, which is also where missing keys and versions surface.
    pub async fn stat(&self, object: &ObjectDescriptor) -> Result<ObjectDescriptor> {
        if object.size.is_some() && object.is_pinned() {
            return Ok(object.clone());
        }
        let store = self.store;
        let info = self
            .retry
            .run("head object", move || store.head_object(object))
            .await?;
        let pinned = object.pinned_to(&info);
        if !pinned.is_pinned() {
            tracing::debug!(key = %object.key, "service returned no etag, reads are unpinned");
        }
        Ok(pinned)
    }

    /// Write the object's bytes into `sink` following `plan`
    ///
    /// The first failed range aborts the fetch and drops every other
    /// outstanding request. Bytes already written stay written.
    pub async fn fetch<W>(
        &self,
        object: &ObjectDescriptor,
        plan: &RangePlan,
        sink: &mut W,
    ) -> Result<FetchStats>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        match plan.ranges() {
            [] => Ok(FetchStats::default()),
            [range] => self.stream(object, *range, sink).await,
            _ => self.fetch_windowed(object, plan, sink).await,
        }
    }

    /// Copy one range from the response body into `sink`
    ///
    /// Holds at most one read buffer. A body that breaks off is reopened
    /// from the first byte not yet written.
    async fn stream<W>(
        &self,
        object: &ObjectDescriptor,
        range: ByteRange,
        sink: &mut W,
    ) -> Result<FetchStats>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let operation = format!("read {} bytes {}-{}", object.key, range.start, range.end);
        let mut written = 0;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .stream_attempt(object, range.after(written), sink, &mut written)
                .await
            {
                Ok(()) => break,
                Err(e) => {
                    let delay = self.retry.retry_delay(&operation, attempt, e)?;
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Ok(FetchStats {
            ranges: 1,
            bytes: written,
            peak_outstanding: 1,
        })
    }

    async fn stream_attempt<W>(
        &self,
        object: &ObjectDescriptor,
        range: ByteRange,
        sink: &mut W,
        written: &mut u64,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let operation = format!("stream {} bytes {}-{}", object.key, range.start, range.end);
        let mut reader = within(
            &operation,
            self.retry.attempt_timeout,
            self.store.open_range(object, range),
        )
        .await?;

        let mut buf = vec![0u8; STREAM_CHUNK.min(range.len() as usize).max(1)];
        let mut remaining = range.len();
        while remaining > 0 {
            let read = within(&operation, self.retry.idle_timeout, async {
                reader
                    .read(&mut buf)
                    .await
                    .map_err(|e| Error::Network(e.to_string()))
            })
            .await?;
            if read == 0 {
                return Err(Error::ShortRead {
                    key: object.key.clone(),
                    expected: range.len(),
                    actual: range.len() - remaining,
                });
            }

            let take = read.min(remaining as usize);
            sink.write_all(&buf[..take]).await.map_err(Error::output)?;
            *written += take as u64;
            remaining -= take as u64;
        }
        Ok(())
    }

    async fn fetch_windowed<W>(
        &self,
        object: &ObjectDescriptor,
        plan: &RangePlan,
        sink: &mut W,
    ) -> Result<FetchStats>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let window = plan.concurrency();
        let mut undispatched = plan.ranges().iter().copied();
        let mut in_flight = FuturesUnordered::new();
        let mut buffer = ReorderBuffer::new(window);
        let mut stats = FetchStats::default();

        loop {
            while in_flight.len() + buffer.len() < window {
                let Some(range) = undispatched.next() else {
                    break;
                };
                in_flight.push(self.fetch_range(object, range));
            }
            stats.peak_outstanding = stats.peak_outstanding.max(in_flight.len() + buffer.len());

            let Some(completed) = in_flight.next().await else {
                break;
            };
            let (index, data) = completed?;
            buffer.insert(index, data)?;

            while let Some(chunk) = buffer.pop_ready() {
                sink.write_all(&chunk).await.map_err(Error::output)?;
                stats.ranges += 1;
                stats.bytes += chunk.len() as u64;
            }
        }

        if !buffer.is_empty() || stats.ranges != plan.len() {
            return Err(Error::Internal(format!(
                "delivered {} of {} ranges of {}",
                stats.ranges,
                plan.len(),
                object.key
            )));
        }

        Ok(stats)
    }

    async fn fetch_range(
        &self,
        object: &ObjectDescriptor,
        range: ByteRange,
    ) -> Result<(u32, Bytes)> {
        let store = self.store;
        let operation = format!("read {} bytes {}-{}", object.key, range.start, range.end);
        let deadline = self.retry.deadline_for(range.len());
        let data = self
            .retry
            .run_with_deadline(&operation, deadline, move || async move {
                let data = store.get_object_range(object, range).await?;
                if data.len() as u64 != range.len() {
                    return Err(Error::ShortRead {
                        key: object.key.clone(),
                        expected: range.len(),
                        actual: data.len() as u64,
                    });
                }
                Ok(data)
            })
            .await?;
        Ok((range.index, data))
    }
}
