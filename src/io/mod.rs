use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;
use crate::stream::{checked_seek_target, resolve_seek, ReadOnlyStream};

/// Keep calling `read` on the unfilled tail of `buf` until it is full or a
/// read returns 0. Returns the number of bytes written, which is short only
/// when the source hit end of stream. The first error ends the loop.
pub fn read_full_with<E, F>(buf: &mut [u8], mut read: F) -> std::result::Result<usize, E>
where
    F: FnMut(&mut [u8]) -> std::result::Result<usize, E>,
{
    let mut total = 0;
    while total < buf.len() {
        let n = read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// [`read_full_with`] over a blocking reader.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    read_full_with(buf, |chunk| reader.read(chunk))
}

/// [`read_full_with`] over an async reader, e.g. an HTTP response body.
pub async fn read_full_async<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..]).await?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Filesystem-backed stream. The length is captured at open time.
#[derive(Debug)]
pub struct LocalFileStream {
    file: File,
    length: u64,
    position: u64,
}

impl LocalFileStream {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    pub fn from_file(mut file: File) -> Result<Self> {
        let length = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        Ok(LocalFileStream {
            file,
            length,
            position: 0,
        })
    }
}

impl ReadOnlyStream for LocalFileStream {
    fn len(&self) -> u64 {
        self.length
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.length.saturating_sub(self.position);
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if want == 0 {
            return Ok(0);
        }
        let n = self.file.read(&mut buf[..want])?;
        self.position += n as u64;
        Ok(n)
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = resolve_seek(pos, self.position, self.length);
        let position = checked_seek_target(target, self.length)?;
        self.file.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(position)
    }
}

impl Read for LocalFileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl Seek for LocalFileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Write;

    use bytes::Bytes;
    use tokio_util::io::StreamReader;

    use super::*;

    /// Hands out reads of the scripted sizes, filling with a running counter.
    fn scripted(sizes: &[usize]) -> impl FnMut(&mut [u8]) -> io::Result<usize> {
        let mut sizes: VecDeque<usize> = sizes.iter().copied().collect();
        let mut next = 0u8;
        move |chunk: &mut [u8]| {
            let n = sizes.pop_front().unwrap_or(0).min(chunk.len());
            for b in &mut chunk[..n] {
                *b = next;
                next = next.wrapping_add(1);
            }
            Ok(n)
        }
    }

    #[test]
    fn stops_at_first_zero_length_read() {
        let mut buf = [0xffu8; 10];
        let n = read_full_with(&mut buf, scripted(&[3, 0, 5, 2])).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[0, 1, 2]);
        assert_eq!(buf[3], 0xff);
    }

    #[test]
    fn assembles_short_reads_until_eof() {
        let mut buf = [0u8; 10];
        let n = read_full_with(&mut buf, scripted(&[3, 5, 0])).unwrap();
        assert_eq!(n, 8);
        assert_eq!(&buf[..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn stops_once_buffer_is_full() {
        let mut calls = 0;
        let mut inner = scripted(&[4, 4, 4, 4]);
        let mut buf = [0u8; 10];
        let n = read_full_with(&mut buf, |chunk| {
            calls += 1;
            inner(chunk)
        })
        .unwrap();
        assert_eq!(n, 10);
        assert_eq!(calls, 3);
    }

    #[test]
    fn errors_end_the_loop() {
        let mut calls = 0;
        let mut buf = [0u8; 10];
        let err = read_full_with(&mut buf, |chunk: &mut [u8]| {
            calls += 1;
            if calls == 1 {
                chunk[0] = 1;
                Ok(1)
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(calls, 2);
    }

    #[test]
    fn empty_buffer_never_reads() {
        let mut buf = [0u8; 0];
        let n = read_full_with(&mut buf, |_: &mut [u8]| -> io::Result<usize> {
            panic!("should not be called")
        })
        .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn blocking_reader_is_drained() {
        let mut reader = Read::chain(io::Cursor::new(b"0123456789".to_vec()), io::Cursor::new(b"ab".to_vec()));
        let mut buf = [0u8; 11];
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 11);
        assert_eq!(&buf, b"0123456789a");
    }

    #[tokio::test]
    async fn async_reader_assembles_chunks() {
        let chunks = vec![
            Ok::<_, io::Error>(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"defgh")),
            Ok(Bytes::from_static(b"ij")),
        ];
        let mut reader = StreamReader::new(futures::stream::iter(chunks));
        let mut buf = [0u8; 16];
        let n = read_full_async(&mut reader, &mut buf).await.unwrap();
        assert_eq!(n, 10);
        assert_eq!(&buf[..n], b"abcdefghij");
    }

    #[tokio::test]
    async fn async_reader_propagates_errors() {
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "body cut")),
        ];
        let mut reader = StreamReader::new(futures::stream::iter(chunks));
        let mut buf = [0u8; 16];
        let err = read_full_async(&mut reader, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn local_file_stream_reads_and_seeks() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"local file contents").unwrap();
        tmp.flush().unwrap();

        let mut stream = LocalFileStream::open(tmp.path()).unwrap();
        assert_eq!(stream.len(), 19);

        stream.seek_to(SeekFrom::End(8)).unwrap();
        let mut buf = [0u8; 32];
        let n = read_full(&mut stream, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"contents");
        assert_eq!(stream.position(), 19);
        assert_eq!(stream.read_bytes(&mut buf).unwrap(), 0);

        let err = stream.seek_to(SeekFrom::Start(20)).unwrap_err();
        assert!(err.is_out_of_range());
        assert_eq!(stream.position(), 19);
    }
}
