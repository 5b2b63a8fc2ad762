//! A file-backed channel.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{BoxedChannel, Channel};

/// A read/write file handle that remembers its path.
///
/// `try_clone` opens a fresh handle rather than duplicating the descriptor, so
/// the clone has its own cursor; a reader replaying the stream during resume
/// does not move the writer's position.
#[derive(Debug)]
pub struct FileChannel {
    path: PathBuf,
    file: File,
}

impl FileChannel {
    /// Opens `path` for reading and writing, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        Ok(Self { path, file })
    }

    /// Opens `path` and truncates it to zero bytes.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let channel = Self::open(path)?;
        channel.file.set_len(0)?;
        Ok(channel)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for FileChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for FileChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for FileChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Channel for FileChannel {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    fn try_clone(&self) -> io::Result<BoxedChannel> {
        Ok(Box::new(Self::open(&self.path)?))
    }

    fn byte_len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}
