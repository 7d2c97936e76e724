//! UniFFI surface: a page-cached, memory-mapped file for foreign callers.

use std::fs::File;
use std::io::SeekFrom;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StreamError;
use crate::paged::PagedCacheStream;
use crate::seekable_mmap::SeekableMmap;
use crate::stream::ReadOnlyStream;

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum FfiStreamError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("stream handle lock poisoned")]
    Poisoned,
}

impl From<std::io::Error> for FfiStreamError {
    fn from(e: std::io::Error) -> Self {
        FfiStreamError::Stream(e.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum SeekOrigin {
    Begin,
    Current,
    End,
}

/// Opaque handle held by foreign code. Calls are serialised by a mutex.
#[derive(uniffi::Object)]
pub struct PagedFileHandle {
    inner: Mutex<PagedCacheStream<SeekableMmap>>,
}

impl PagedFileHandle {
    fn lock(&self) -> Result<MutexGuard<'_, PagedCacheStream<SeekableMmap>>, FfiStreamError> {
        self.inner.lock().map_err(|_| FfiStreamError::Poisoned)
    }
}

#[uniffi::export]
impl PagedFileHandle {
    /// Map the file at `path`; `page_size` of 0 selects the default.
    #[uniffi::constructor]
    pub fn open(path: String, page_size: u32) -> Result<Arc<Self>, FfiStreamError> {
        let file = File::open(&path)?;
        let mmap = SeekableMmap::open(&file)?;
        let stream = match page_size {
            0 => PagedCacheStream::new(mmap),
            n => PagedCacheStream::with_page_size(mmap, n as usize)?,
        };
        Ok(Arc::new(Self {
            inner: Mutex::new(stream),
        }))
    }

    pub fn length(&self) -> Result<u64, FfiStreamError> {
        Ok(self.lock()?.len())
    }

    pub fn position(&self) -> Result<u64, FfiStreamError> {
        Ok(self.lock()?.position())
    }

    pub fn seek(&self, offset: i64, origin: SeekOrigin) -> Result<u64, FfiStreamError> {
        let pos = match origin {
            SeekOrigin::Begin if offset < 0 => {
                return Err(StreamError::InvalidPosition {
                    position: offset as i128,
                    length: self.lock()?.len(),
                }
                .into())
            }
            SeekOrigin::Begin => SeekFrom::Start(offset as u64),
            SeekOrigin::Current => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
        };
        Ok(self.lock()?.seek_to(pos)?)
    }

    /// Read up to `count` bytes at the cursor. An empty result means end of
    /// stream.
    pub fn read(&self, count: u32) -> Result<Vec<u8>, FfiStreamError> {
        let mut stream = self.lock()?;
        let mut buf = vec![0u8; count as usize];
        let n = stream.read_bytes(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

/// Crate version, for checking the binding pipeline.
#[uniffi::export]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn handle_over(contents: &[u8], page_size: u32) -> (tempfile::NamedTempFile, Arc<PagedFileHandle>) {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(contents).unwrap();
        tmp.flush().unwrap();
        let handle =
            PagedFileHandle::open(tmp.path().to_string_lossy().to_string(), page_size).unwrap();
        (tmp, handle)
    }

    #[test]
    fn reads_and_seeks_through_handle() {
        let (_tmp, handle) = handle_over(b"header|payload|trailer", 4);
        assert_eq!(handle.length().unwrap(), 22);

        assert_eq!(handle.read(6).unwrap(), b"header");
        assert_eq!(handle.seek(7, SeekOrigin::End).unwrap(), 15);
        assert_eq!(handle.read(64).unwrap(), b"trailer");
        assert!(handle.read(8).unwrap().is_empty());
        assert_eq!(handle.position().unwrap(), 22);
    }

    #[test]
    fn out_of_range_seek_is_reported() {
        let (_tmp, handle) = handle_over(b"abc", 0);
        let err = handle.seek(-1, SeekOrigin::Begin).unwrap_err();
        assert!(matches!(err, FfiStreamError::Stream(ref e) if e.is_out_of_range()));
        let err = handle.seek(4, SeekOrigin::Current).unwrap_err();
        assert!(matches!(err, FfiStreamError::Stream(ref e) if e.is_out_of_range()));
        assert_eq!(handle.position().unwrap(), 0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PagedFileHandle::open("/nonexistent/remote_pages/file".to_string(), 0)
            .err()
            .unwrap();
        assert!(matches!(err, FfiStreamError::Stream(StreamError::Io(_))));
    }
}
