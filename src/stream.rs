use std::io::{Cursor, Read, SeekFrom};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StreamError};

/// Capability contract shared by every read-only stream in the crate.
///
/// The write family is provided and always fails with
/// [`StreamError::NotSupported`], so implementors only supply the read side.
pub trait ReadOnlyStream {
    /// Total size in bytes. Fixed for the lifetime of the stream.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self) -> u64;

    /// Read up to `buf.len()` bytes at the cursor and advance it by the
    /// number of bytes returned. Returns 0 at end of stream.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move the cursor. `SeekFrom::End(n)` resolves to `len - |n|`.
    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64>;

    fn set_position(&mut self, position: u64) -> Result<u64> {
        self.seek_to(SeekFrom::Start(position))
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        false
    }

    fn write_bytes(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(StreamError::NotSupported("write"))
    }

    fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(StreamError::NotSupported("set_len"))
    }

    fn flush(&mut self) -> Result<()> {
        Err(StreamError::NotSupported("flush"))
    }
}

/// Streams whose reads suspend on I/O. Cancelling `cancel` aborts the
/// in-flight request with [`StreamError::Cancelled`].
#[async_trait]
pub trait AsyncReadOnlyStream: ReadOnlyStream + Send {
    async fn read_bytes_async(
        &mut self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize>;
}

/// Resolve a seek request against the current cursor and total length.
///
/// The result may be negative or beyond `length`; callers decide which error
/// to raise.
pub fn resolve_seek(pos: SeekFrom, current: u64, length: u64) -> i128 {
    match pos {
        SeekFrom::Start(offset) => offset as i128,
        SeekFrom::Current(offset) => current as i128 + offset as i128,
        SeekFrom::End(offset) => length as i128 - (offset as i128).abs(),
    }
}

/// Validate a resolved seek target for storage-backed sources.
pub(crate) fn checked_seek_target(target: i128, length: u64) -> Result<u64> {
    if target < 0 || target > length as i128 {
        return Err(StreamError::SeekOutOfRange {
            position: target,
            length,
        });
    }
    Ok(target as u64)
}

impl<T: ReadOnlyStream + ?Sized> ReadOnlyStream for Box<T> {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_bytes(buf)
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        (**self).seek_to(pos)
    }
}

/// In-memory source, handy as a local stand-in for a remote object.
impl<T: AsRef<[u8]>> ReadOnlyStream for Cursor<T> {
    fn len(&self) -> u64 {
        self.get_ref().as_ref().len() as u64
    }

    fn position(&self) -> u64 {
        Cursor::position(self)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.read(buf)?)
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let length = ReadOnlyStream::len(self);
        let target = resolve_seek(pos, Cursor::position(self), length);
        let position = checked_seek_target(target, length)?;
        Cursor::set_position(self, position);
        Ok(position)
    }
}
