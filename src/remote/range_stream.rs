use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use log::debug;
use object_store::path::Path;
use object_store::{GetOptions, GetRange, ObjectMeta, ObjectStore};
use tokio::runtime::{Handle, Runtime};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StreamError};
use crate::io::read_full_async;
use crate::stream::{checked_seek_target, resolve_seek, AsyncReadOnlyStream, ReadOnlyStream};

/// A remote object presented as a read-only, seekable stream.
///
/// Every read is a single byte-range request carrying the etag captured at
/// open time as an `If-Match` precondition, so a stream never mixes bytes
/// from two versions of an object. Reads issued after the object changed or
/// disappeared fail with [`StreamError::PreconditionFailed`] and are not
/// retried.
///
/// There is no buffering; wrap in a [`PagedCacheStream`](crate::PagedCacheStream)
/// to avoid re-fetching.
///
/// The blocking API (`read_bytes`, `std::io::Read`) drives the request on a
/// runtime: the handle given to the builder, or a private one created on
/// first use. It must not be called from inside an async context; use
/// [`AsyncReadOnlyStream::read_bytes_async`] there. Dropping the stream is
/// fine anywhere: a private runtime is shut down in the background.
#[derive(Debug)]
pub struct RemoteRangeStream {
    store: Arc<dyn ObjectStore>,
    location: Path,
    length: u64,
    etag: String,
    position: u64,
    handle: Option<Handle>,
    runtime: Option<Runtime>,
}

#[derive(Debug, Default)]
pub struct RemoteRangeStreamBuilder {
    store: Option<Arc<dyn ObjectStore>>,
    location: Option<Path>,
    meta: Option<ObjectMeta>,
    handle: Option<Handle>,
}

impl RemoteRangeStreamBuilder {
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn location(mut self, location: Path) -> Self {
        self.location = Some(location);
        self
    }

    /// Metadata from a previous `head` request. Supplies the length and etag.
    pub fn meta(mut self, meta: ObjectMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Runtime used by the blocking API instead of a private one.
    ///
    /// The handle must belong to a multi-thread runtime: `Handle::block_on`
    /// on a current-thread runtime does not drive its I/O driver, so requests
    /// to a network store can hang.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn build(self) -> Result<RemoteRangeStream> {
        let store = self.store.ok_or_else(|| {
            StreamError::InvalidArgument("an object store client is required".to_string())
        })?;
        let location = self
            .location
            .filter(|location| !AsRef::<str>::as_ref(location).is_empty())
            .ok_or_else(|| {
                StreamError::InvalidArgument("a non-empty object location is required".to_string())
            })?;
        let meta = self.meta.ok_or_else(|| {
            StreamError::InvalidArgument(format!("object metadata for {location} is required"))
        })?;
        let etag = meta.e_tag.ok_or_else(|| {
            StreamError::InvalidArgument(format!("object metadata for {location} has no etag"))
        })?;

        debug!(
            "remote stream over {} ({} bytes, etag {})",
            location,
            meta.size,
            etag
        );

        Ok(RemoteRangeStream {
            store,
            location,
            length: meta.size,
            etag,
            position: 0,
            handle: self.handle,
            runtime: None,
        })
    }
}

impl RemoteRangeStream {
    pub fn builder() -> RemoteRangeStreamBuilder {
        RemoteRangeStreamBuilder::default()
    }

    pub fn new(store: Arc<dyn ObjectStore>, location: Path, meta: ObjectMeta) -> Result<Self> {
        Self::builder()
            .store(store)
            .location(location)
            .meta(meta)
            .build()
    }

    /// Fetch the object's metadata and open a stream over it.
    pub async fn open(store: Arc<dyn ObjectStore>, location: Path) -> Result<Self> {
        let meta = store.head(&location).await.map_err(StreamError::Store)?;
        Self::new(store, location, meta)
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// The etag every read is conditioned on.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    fn blocking_handle(&mut self) -> Result<Handle> {
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }
        if self.runtime.is_none() {
            // Worker threads drive the I/O driver, which `Handle::block_on`
            // cannot do on a current-thread runtime.
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("remote-range-stream")
                .enable_all()
                .build()?;
            self.runtime = Some(runtime);
        }
        match &self.runtime {
            Some(runtime) => Ok(runtime.handle().clone()),
            None => Err(StreamError::Io(io::Error::other("runtime unavailable"))),
        }
    }

    fn classify(&self, err: object_store::Error) -> StreamError {
        match err {
            err @ (object_store::Error::Precondition { .. }
            | object_store::Error::NotFound { .. }) => StreamError::PreconditionFailed {
                location: self.location.to_string(),
                etag: self.etag.clone(),
                source: err,
            },
            err => StreamError::Store(err),
        }
    }

    async fn fetch_range(&self, range: Range<u64>, buf: &mut [u8]) -> Result<usize> {
        debug!(
            "range request {}..{} on {} (if-match {})",
            range.start,
            range.end,
            self.location,
            self.etag
        );
        let options = GetOptions {
            if_match: Some(self.etag.clone()),
            range: Some(GetRange::Bounded(range)),
            ..Default::default()
        };
        let result = self
            .store
            .get_opts(&self.location, options)
            .await
            .map_err(|err| self.classify(err))?;

        let body = result
            .into_stream()
            .map_err(|err| io::Error::other(self.classify(err)));
        let mut reader = StreamReader::new(body);
        Ok(read_full_async(&mut reader, buf).await?)
    }
}

impl ReadOnlyStream for RemoteRangeStream {
    fn len(&self) -> u64 {
        self.length
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.position >= self.length {
            return Ok(0);
        }
        let handle = self.blocking_handle()?;
        let cancel = CancellationToken::new();
        handle.block_on(self.read_bytes_async(buf, &cancel))
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.position, self.length);
        self.position = checked_seek_target(target, self.length)?;
        Ok(self.position)
    }
}

#[async_trait]
impl AsyncReadOnlyStream for RemoteRangeStream {
    async fn read_bytes_async(
        &mut self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if buf.is_empty() || self.position >= self.length {
            return Ok(0);
        }
        let start = self.position;
        let end = self.length.min(start.saturating_add(buf.len() as u64));
        let want = (end - start) as usize;

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            read = self.fetch_range(start..end, &mut buf[..want]) => read?,
        };
        self.position += read as u64;
        Ok(read)
    }
}

impl Drop for RemoteRangeStream {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Read for RemoteRangeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl Seek for RemoteRangeStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}
