//! Staged reading from a channel with refill-on-exhaustion.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use super::{BoxedChannel, GrowBuffer};
use crate::error::{CodecError, Result};

/// Reads a channel through a fixed-size staging buffer.
///
/// Positions reported by `position()` are absolute channel offsets, so they can
/// be handed straight to `ByteWriter::truncate_to` on the same channel.
pub struct ByteReader {
    channel: BoxedChannel,
    staging: GrowBuffer<u8>,
    cursor: usize,
    origin: u64,
    consumed: u64,
}

impl ByteReader {
    pub fn new(mut channel: BoxedChannel, capacity: usize) -> Result<Self> {
        let origin = channel.stream_position()?;
        Ok(Self {
            channel,
            staging: GrowBuffer::with_capacity(capacity.max(1)),
            cursor: 0,
            origin,
            consumed: 0,
        })
    }

    /// Absolute channel offset of the next unread byte.
    #[inline]
    pub fn position(&self) -> u64 {
        self.origin + self.consumed
    }

    #[inline]
    fn staged(&self) -> usize {
        self.staging.len() - self.cursor
    }

    /// Pulls the next chunk from the channel. Returns `false` at end of stream.
    fn refill(&mut self) -> Result<bool> {
        self.staging.clear();
        self.cursor = 0;
        loop {
            match self.channel.read(self.staging.spare_mut()) {
                Ok(n) => {
                    self.staging.advance(n);
                    return Ok(n > 0);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reads one byte, `None` at end of stream.
    #[inline]
    pub fn read_u8(&mut self) -> Result<Option<u8>> {
        if self.staged() == 0 && !self.refill()? {
            return Ok(None);
        }
        let byte = self.staging.as_slice()[self.cursor];
        self.cursor += 1;
        self.consumed += 1;
        Ok(Some(byte))
    }

    /// Fills as much of `out` as the stream allows and returns the count.
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < out.len() {
            if self.staged() == 0 && !self.refill()? {
                break;
            }
            let n = self.staged().min(out.len() - filled);
            out[filled..filled + n]
                .copy_from_slice(&self.staging.as_slice()[self.cursor..self.cursor + n]);
            self.cursor += n;
            filled += n;
        }
        self.consumed += filled as u64;
        Ok(filled)
    }

    /// Fills all of `out` or reports the stream as truncated inside `what`.
    pub fn read_exact_or_corrupt(&mut self, out: &mut [u8], what: &str) -> Result<()> {
        if self.read_into(out)? < out.len() {
            return Err(CodecError::truncated(what));
        }
        Ok(())
    }

    /// Advances past up to `count` bytes without copying them. Returns the number skipped.
    pub fn skip_bytes(&mut self, count: u64) -> Result<u64> {
        let from_stage = (self.staged() as u64).min(count);
        self.cursor += from_stage as usize;
        let mut skipped = from_stage;

        let rest = count - from_stage;
        if rest > 0 {
            let here = self.channel.stream_position()?;
            let len = self.channel.byte_len()?;
            let jump = rest.min(len.saturating_sub(here));
            self.channel.seek(SeekFrom::Current(jump as i64))?;
            skipped += jump;
        }
        self.consumed += skipped;
        Ok(skipped)
    }

    /// Returns `true` once no byte is left in the stage or the channel.
    pub fn at_end(&mut self) -> Result<bool> {
        Ok(self.staged() == 0 && !self.refill()?)
    }
}
