//! Staged writing to a channel with flush-on-full and truncation.

use std::io::{Seek, SeekFrom, Write};

use log::trace;

use super::{BoxedChannel, GrowBuffer};
use crate::error::Result;

/// Writes a channel through a fixed-size staging buffer.
///
/// Bytes reach the channel only when the stage fills or on `flush`. `truncate_to`
/// cuts the stream back to any earlier absolute offset, whether or not those
/// bytes were already flushed.
pub struct ByteWriter {
    channel: BoxedChannel,
    staging: GrowBuffer<u8>,
    origin: u64,
    flushed: u64,
    /// Stale bytes from this offset on are cut before anything new reaches the channel.
    cut: Option<u64>,
}

impl ByteWriter {
    /// Starts a new stream at the channel's current offset, dropping any bytes after it.
    pub fn new(channel: BoxedChannel, capacity: usize) -> Result<Self> {
        let mut writer = Self::attach(channel, capacity)?;
        writer.channel.set_len(writer.origin)?;
        Ok(writer)
    }

    /// Wraps the channel without touching its contents; follow with `reopen_at`.
    pub fn attach(mut channel: BoxedChannel, capacity: usize) -> Result<Self> {
        let origin = channel.stream_position()?;
        Ok(Self {
            channel,
            staging: GrowBuffer::with_capacity(capacity.max(1)),
            origin,
            flushed: origin,
            cut: None,
        })
    }

    /// Absolute channel offset of the next byte to be written.
    #[inline]
    pub fn position(&self) -> u64 {
        self.flushed + self.staging.len() as u64
    }

    /// Offset at which this writer started.
    #[inline]
    pub fn origin(&self) -> u64 {
        self.origin
    }

    fn apply_cut(&mut self) -> Result<()> {
        if let Some(pos) = self.cut.take() {
            self.channel.set_len(pos)?;
            trace!("cut stale bytes after {}", pos);
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        if !self.staging.is_empty() {
            self.apply_cut()?;
            self.channel.write_all(self.staging.as_slice())?;
            self.flushed += self.staging.len() as u64;
            self.staging.clear();
        }
        Ok(())
    }

    #[inline]
    pub fn write_u8(&mut self, byte: u8) -> Result<()> {
        if self.staging.remaining() == 0 {
            self.drain()?;
        }
        self.staging.push(byte);
        Ok(())
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if self.staging.remaining() < bytes.len() {
            self.drain()?;
        }
        if bytes.len() >= self.staging.capacity() {
            self.apply_cut()?;
            self.channel.write_all(bytes)?;
            self.flushed += bytes.len() as u64;
        } else {
            self.staging.extend_from_slice(bytes);
        }
        Ok(())
    }

    /// Pushes every staged byte to the channel and flushes the channel itself.
    pub fn flush(&mut self) -> Result<()> {
        let staged = self.staging.len();
        self.drain()?;
        self.apply_cut()?;
        self.channel.flush()?;
        trace!("flushed {} staged bytes, stream now at {}", staged, self.flushed);
        Ok(())
    }

    /// Cuts the stream back so that the next byte lands at `pos`.
    ///
    /// Offsets beyond the current position are clamped to it.
    pub fn truncate_to(&mut self, pos: u64) -> Result<()> {
        let pos = pos.min(self.position()).max(self.origin);
        if pos >= self.flushed {
            self.staging.truncate((pos - self.flushed) as usize);
            return Ok(());
        }
        self.staging.clear();
        self.cut = None;
        self.channel.set_len(pos)?;
        self.channel.seek(SeekFrom::Start(pos))?;
        self.flushed = pos;
        trace!("truncated channel to {}", pos);
        Ok(())
    }

    /// Continues writing at absolute offset `pos`, taking over bytes written
    /// by an earlier writer.
    ///
    /// Used by resume. The existing bytes at or after `pos` stay in the channel
    /// until staged bytes are first drained or flushed, so a writer dropped
    /// right after resuming leaves the committed stream intact.
    pub fn reopen_at(&mut self, pos: u64) -> Result<()> {
        let pos = pos.max(self.origin);
        self.staging.clear();
        self.channel.seek(SeekFrom::Start(pos))?;
        self.flushed = pos;
        self.cut = Some(pos);
        trace!("reopened channel at {}", pos);
        Ok(())
    }

    /// Discards everything this writer has produced.
    pub fn reset(&mut self) -> Result<()> {
        self.truncate_to(self.origin)?;
        self.apply_cut()
    }
}
