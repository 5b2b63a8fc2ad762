//! An in-memory channel whose bytes can be shared by several cursors.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{BoxedChannel, Channel};

/// A growable byte vector behind a shared handle, plus a private cursor.
///
/// `share()` hands out a second cursor over the same bytes; this is how a
/// writer and the reader it creates for resume see one stream.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    data: Arc<Mutex<Vec<u8>>>,
    pos: u64,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(bytes)),
            pos: 0,
        }
    }

    /// A new cursor at offset 0 over the same storage.
    pub fn share(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            pos: 0,
        }
    }

    /// A shared cursor, already boxed for `init`.
    pub fn boxed(&self) -> BoxedChannel {
        Box::new(self.share())
    }

    /// Copies the current contents out.
    pub fn to_vec(&self) -> Vec<u8> {
        match self.data.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.data.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Vec<u8>>> {
        self.data
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory channel lock poisoned"))
    }
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let data = self.lock()?;
            let start = (self.pos as usize).min(data.len());
            let n = buf.len().min(data.len() - start);
            buf[..n].copy_from_slice(&data[start..start + n]);
            n
        };
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        {
            let mut data = self.lock()?;
            let start = self.pos as usize;
            if data.len() < start {
                data.resize(start, 0);
            }
            let overlap = buf.len().min(data.len() - start);
            data[start..start + overlap].copy_from_slice(&buf[..overlap]);
            data.extend_from_slice(&buf[overlap..]);
        }
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.lock()?.len() as i64;
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(off) => len + off,
            SeekFrom::Current(off) => self.pos as i64 + off,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of memory channel",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl Channel for MemoryChannel {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.lock()?.resize(len as usize, 0);
        Ok(())
    }

    fn try_clone(&self) -> io::Result<BoxedChannel> {
        Ok(Box::new(self.share()))
    }

    fn byte_len(&self) -> io::Result<u64> {
        Ok(self.lock()?.len() as u64)
    }
}
