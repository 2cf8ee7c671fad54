//! Range planning for parallel reads
//!
//! Splits an object into contiguous byte ranges of `part_size` bytes (the
//! last one may be shorter). The plan only describes the ranges; the
//! fetcher bounds how many are in flight.

use std::num::NonZeroUsize;

use crate::error::{Error, Result};

/// Half-open byte span `[start, end)` of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// Position in the plan; ascending index is ascending `start`
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// What is left of this span once its first `consumed` bytes are read
    pub fn after(&self, consumed: u64) -> ByteRange {
        ByteRange {
            index: self.index,
            start: self.start.saturating_add(consumed).min(self.end),
            end: self.end,
        }
    }

    /// Value of an HTTP `Range` header for this span
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// Ordered ranges covering one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePlan {
    object_size: u64,
    part_size: u64,
    concurrency: NonZeroUsize,
    ranges: Vec<ByteRange>,
}

impl RangePlan {
    /// Plan the reads of an object
    ///
    /// Zero `part_size` or `concurrency` is a configuration error. A single
    /// range covers the whole object when it fits in one part or when
    /// concurrency is 1, which degenerates to a plain sequential read.
    pub fn new(object_size: u64, part_size: u64, concurrency: usize) -> Result<Self> {
        if part_size == 0 {
            return Err(Error::Config("part size must be positive".into()));
        }
        let concurrency = NonZeroUsize::new(concurrency)
            .ok_or_else(|| Error::Config("concurrency must be positive".into()))?;

        let ranges = if object_size == 0 {
            Vec::new()
        } else if object_size <= part_size || concurrency.get() == 1 {
            vec![ByteRange {
                index: 0,
                start: 0,
                end: object_size,
            }]
        } else {
            let count = object_size.div_ceil(part_size);
            if count > u64::from(u32::MAX) {
                return Err(Error::Config(format!(
                    "part size {part_size} splits {object_size} bytes into too many ranges"
                )));
            }
            (0..count as u32)
                .map(|index| {
                    let start = u64::from(index) * part_size;
                    ByteRange {
                        index,
                        start,
                        end: (start + part_size).min(object_size),
                    }
                })
                .collect()
        };

        Ok(Self {
            object_size,
            part_size,
            concurrency,
            ranges,
        })
    }

    pub fn object_size(&self) -> u64 {
        self.object_size
    }

    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// In-flight window size for the fetcher
    pub fn concurrency(&self) -> usize {
        self.concurrency.get()
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
