use std::io::{self, Read, Seek, SeekFrom};
use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StreamError};
use crate::io::read_full_with;
use crate::stream::{resolve_seek, AsyncReadOnlyStream, ReadOnlyStream};

use super::page_cache::{Page, PageCache};
use super::{PagedCacheOptions, TailPolicy};

/// Counters describing how the page cache has been used so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Pages served from memory.
    pub hits: u64,
    /// Pages fetched from the wrapped stream.
    pub misses: u64,
    /// Pages dropped by a bounded cache.
    pub evictions: u64,
}

/// Caches whole pages of a wrapped stream so that overlapping or repeated
/// reads are served from memory.
///
/// Each cache miss costs one `seek_to` plus one or more `read_bytes` calls on
/// the wrapped stream (one range request when it is a
/// [`RemoteRangeStream`](crate::RemoteRangeStream)). Pages are `page_size`
/// bytes; the last page is zero padded past the end of the stream.
///
/// By default the cache is never evicted and grows with every distinct page
/// read, up to the size of the object. Use [`CacheBound`](super::CacheBound)
/// to cap it.
pub struct PagedCacheStream<S> {
    inner: S,
    page_size: usize,
    length: u64,
    position: u64,
    tail_policy: TailPolicy,
    cache: PageCache,
    stats: CacheStats,
}

/// The bytes a single read will return and the pages covering them.
#[derive(Debug, Clone, Copy)]
struct ReadSpan {
    start: u64,
    len: usize,
    first_page: u64,
    last_page: u64,
}

impl ReadSpan {
    fn pages(&self) -> RangeInclusive<u64> {
        self.first_page..=self.last_page
    }

    /// Copy the part of page `index` that overlaps this span into `out`.
    fn copy_from_page(&self, index: u64, page_size: usize, page: &[u8], out: &mut [u8]) {
        let page_start = index * page_size as u64;
        let from = self.start.max(page_start);
        let to = (self.start + self.len as u64).min(page_start + page_size as u64);
        if from >= to {
            return;
        }
        let dst = (from - self.start) as usize..(to - self.start) as usize;
        let src = (from - page_start) as usize..(to - page_start) as usize;
        out[dst].copy_from_slice(&page[src]);
    }
}

impl<S: ReadOnlyStream> PagedCacheStream<S> {
    /// Wrap `inner` with the default 16 KiB page size and an unbounded cache.
    pub fn new(inner: S) -> Self {
        Self::from_valid_options(inner, PagedCacheOptions::default())
    }

    pub fn with_page_size(inner: S, page_size: usize) -> Result<Self> {
        Self::with_options(inner, PagedCacheOptions::default().with_page_size(page_size))
    }

    pub fn with_options(inner: S, options: PagedCacheOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_valid_options(inner, options))
    }

    fn from_valid_options(inner: S, options: PagedCacheOptions) -> Self {
        let length = inner.len();
        debug!(
            "paged cache over {} bytes, page size {}, bound {:?}",
            length,
            options.page_size,
            options.bound
        );
        Self {
            cache: PageCache::new(options.page_capacity()),
            inner,
            page_size: options.page_size,
            length,
            position: 0,
            tail_policy: options.tail_policy,
            stats: CacheStats::default(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    /// Indices of the pages currently held, ascending.
    pub fn cached_page_indices(&self) -> Vec<u64> {
        self.cache.indices()
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Drop the cache and return the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn span_for(&self, requested: usize) -> Option<ReadSpan> {
        if requested == 0 || self.position >= self.length {
            return None;
        }
        let len = match self.tail_policy {
            TailPolicy::Clamp => {
                let remaining = self.length - self.position;
                requested.min(usize::try_from(remaining).unwrap_or(usize::MAX))
            }
            TailPolicy::PassThrough => requested,
        };
        let page_size = self.page_size as u64;
        Some(ReadSpan {
            start: self.position,
            len,
            first_page: self.position / page_size,
            last_page: (self.position + len as u64 - 1) / page_size,
        })
    }

    /// Page `index` if it lies wholly past the end of the stream: zeroes that
    /// are never fetched nor cached.
    fn padding_page(&self, index: u64) -> Option<Page> {
        if index * self.page_size as u64 >= self.length {
            Some(Arc::from(vec![0u8; self.page_size]))
        } else {
            None
        }
    }

    fn cached_page(&mut self, index: u64) -> Option<Page> {
        let page = self.cache.get(index)?;
        self.stats.hits += 1;
        trace!("page {} served from cache", index);
        Some(page)
    }

    fn store_page(&mut self, index: u64, page: Vec<u8>) -> Page {
        let page: Page = Arc::from(page);
        if let Some(evicted) = self.cache.insert(index, page.clone()) {
            self.stats.evictions += 1;
            trace!("page {} evicted for page {}", evicted, index);
        }
        page
    }

    fn begin_fetch(&mut self, index: u64) -> Result<Vec<u8>> {
        let offset = index * self.page_size as u64;
        self.stats.misses += 1;
        debug!(
            "fetching page {} ({} bytes at offset {})",
            index,
            self.page_size,
            offset
        );
        self.inner.seek_to(SeekFrom::Start(offset))?;
        Ok(vec![0u8; self.page_size])
    }

    fn load_page(&mut self, index: u64) -> Result<Page> {
        if let Some(page) = self.padding_page(index) {
            return Ok(page);
        }
        if let Some(page) = self.cached_page(index) {
            return Ok(page);
        }

        let mut page = self.begin_fetch(index)?;
        let inner = &mut self.inner;
        read_full_with(&mut page, |chunk| inner.read_bytes(chunk))?;
        Ok(self.store_page(index, page))
    }

    fn finish_read(&mut self, span: &ReadSpan) -> usize {
        self.position += span.len as u64;
        span.len
    }
}

impl<S: AsyncReadOnlyStream> PagedCacheStream<S> {
    /// Async counterpart of `load_page`. A page whose fetch fails or is
    /// cancelled is never cached.
    async fn load_page_async(&mut self, index: u64, cancel: &CancellationToken) -> Result<Page> {
        if let Some(page) = self.padding_page(index) {
            return Ok(page);
        }
        if let Some(page) = self.cached_page(index) {
            return Ok(page);
        }

        let mut page = self.begin_fetch(index)?;
        let mut filled = 0;
        while filled < page.len() {
            let n = self
                .inner
                .read_bytes_async(&mut page[filled..], cancel)
                .await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(self.store_page(index, page))
    }
}

impl<S: ReadOnlyStream> ReadOnlyStream for PagedCacheStream<S> {
    fn len(&self) -> u64 {
        self.length
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(span) = self.span_for(buf.len()) else {
            return Ok(0);
        };
        for index in span.pages() {
            let page = self.load_page(index)?;
            span.copy_from_page(index, self.page_size, &page, buf);
        }
        Ok(self.finish_read(&span))
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.position, self.length);
        if target < 0 || target > self.length as i128 {
            return Err(StreamError::InvalidPosition {
                position: target,
                length: self.length,
            });
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

#[async_trait]
impl<S: AsyncReadOnlyStream> AsyncReadOnlyStream for PagedCacheStream<S> {
    async fn read_bytes_async(
        &mut self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let Some(span) = self.span_for(buf.len()) else {
            return Ok(0);
        };
        for index in span.pages() {
            let page = self.load_page_async(index, cancel).await?;
            span.copy_from_page(index, self.page_size, &page, buf);
        }
        Ok(self.finish_read(&span))
    }
}

impl<S: ReadOnlyStream> Read for PagedCacheStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl<S: ReadOnlyStream> Seek for PagedCacheStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}
