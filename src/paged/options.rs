use std::num::NonZeroUsize;

use crate::error::{Result, StreamError};

pub const DEFAULT_PAGE_SIZE: usize = 16 * 1024;

/// What a read near the end of the stream reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailPolicy {
    /// Clamp the request to the bytes left before `len`.
    #[default]
    Clamp,
    /// Report the full requested count, filling bytes past `len` with the
    /// zero padding of the last page. The cursor may end up beyond `len`.
    /// Kept for callers that depend on the older reported counts.
    ///
    /// Only the count and cursor differ from `Clamp`. Page selection is the
    /// same under both policies: a read ending exactly on a page boundary
    /// does not fetch the following page, so it can make one fewer request
    /// than the older `(position + count) / page_size` arithmetic did.
    PassThrough,
}

/// Upper bound on what the page cache keeps in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBound {
    /// Every page ever touched stays cached for the life of the stream.
    #[default]
    Unbounded,
    /// Keep at most this many pages, evicting the least recently used.
    Pages(NonZeroUsize),
    /// Keep at most this many bytes of pages (rounded down to whole pages,
    /// never less than one), evicting the least recently used.
    Bytes(NonZeroUsize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedCacheOptions {
    pub page_size: usize,
    pub bound: CacheBound,
    pub tail_policy: TailPolicy,
}

impl Default for PagedCacheOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            bound: CacheBound::Unbounded,
            tail_policy: TailPolicy::Clamp,
        }
    }
}

impl PagedCacheOptions {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_cached_pages(mut self, pages: NonZeroUsize) -> Self {
        self.bound = CacheBound::Pages(pages);
        self
    }

    pub fn with_max_cached_bytes(mut self, bytes: NonZeroUsize) -> Self {
        self.bound = CacheBound::Bytes(bytes);
        self
    }

    pub fn with_tail_policy(mut self, tail_policy: TailPolicy) -> Self {
        self.tail_policy = tail_policy;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(StreamError::InvalidArgument(
                "page size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Page capacity implied by the bound, `None` when unbounded.
    pub(crate) fn page_capacity(&self) -> Option<NonZeroUsize> {
        match self.bound {
            CacheBound::Unbounded => None,
            CacheBound::Pages(pages) => Some(pages),
            CacheBound::Bytes(bytes) => {
                NonZeroUsize::new(bytes.get() / self.page_size.max(1)).or(Some(NonZeroUsize::MIN))
            }
        }
    }
}
