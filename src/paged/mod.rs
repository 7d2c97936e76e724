mod options;
mod page_cache;
mod stream;

pub use options::{CacheBound, PagedCacheOptions, TailPolicy, DEFAULT_PAGE_SIZE};
pub use stream::{CacheStats, PagedCacheStream};
