use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use memmap2::Mmap;

use crate::error::Result;
use crate::stream::{checked_seek_target, resolve_seek, ReadOnlyStream};

/// A memory-mapped file exposed as a read-only stream with its own cursor.
///
/// Intended for single-threaded use; wrap in `Mutex` to share.
#[derive(Debug)]
pub struct SeekableMmap {
    mmap: Mmap,
    pos: u64,
}

impl SeekableMmap {
    /// Map the given file and return a seekable handle.
    pub fn open(file: &File) -> Result<Self> {
        // SAFETY: the mapping is read-only; callers must not truncate the file
        // while it is mapped.
        let mmap = unsafe { Mmap::map(file)? };
        Ok(Self::from_mmap(mmap))
    }

    pub fn from_mmap(mmap: Mmap) -> Self {
        Self { mmap, pos: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.mmap.len() as u64
    }
}

impl ReadOnlyStream for SeekableMmap {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.is_eof() {
            return Ok(0);
        }
        let start = self.pos as usize;
        let to_read = buf.len().min(self.mmap.len() - start);
        buf[..to_read].copy_from_slice(&self.mmap[start..start + to_read]);
        self.pos += to_read as u64;
        Ok(to_read)
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let length = self.len();
        let target = resolve_seek(pos, self.pos, length);
        self.pos = checked_seek_target(target, length)?;
        Ok(self.pos)
    }
}

impl Read for SeekableMmap {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl Seek for SeekableMmap {
    fn seek(&mut self, how: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(how)?)
    }
}
