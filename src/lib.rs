//! Read-only, seekable streams over large remote objects, with page caching
//! to keep round trips to the store down.
//!
//! ```ignore
//! use std::io::Read;
//! use remote_pages::{PagedCacheStream, RemoteRangeStream};
//!
//! let remote = RemoteRangeStream::new(store, location, meta)?;
//! let mut stream = PagedCacheStream::new(remote);
//! let mut header = [0u8; 512];
//! stream.read_exact(&mut header)?;
//! ```
uniffi::setup_scaffolding!();

pub mod error;
pub mod ffi;
pub mod io;
pub mod paged;
pub mod remote;
pub mod seekable_mmap;
pub mod stream;

pub use error::{Result, StreamError};
pub use io::{read_full, read_full_async, read_full_with, LocalFileStream};
pub use paged::{CacheBound, CacheStats, PagedCacheOptions, PagedCacheStream, TailPolicy};
pub use remote::{RemoteRangeStream, RemoteRangeStreamBuilder};
pub use seekable_mmap::SeekableMmap;
pub use stream::{AsyncReadOnlyStream, ReadOnlyStream};
