//! The byte channel layer: where codecs meet storage.
//!
//! A `Channel` is an ordered byte sink/source that can also be truncated and
//! re-opened as an independent cursor. Codecs never touch a channel directly;
//! they go through a `ByteReader` (refill-on-exhaustion) or a `ByteWriter`
//! (flush-on-full), both staged through a `GrowBuffer`.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{CodecError, Result};

pub mod byte_reader;
pub mod byte_writer;
pub mod file;
pub mod grow_buffer;
pub mod memory;

pub use byte_reader::ByteReader;
pub use byte_writer::ByteWriter;
pub use file::FileChannel;
pub use grow_buffer::GrowBuffer;
pub use memory::MemoryChannel;

/// An ordered byte store a codec reads from or writes to.
pub trait Channel: Read + Write + Seek + Send {
    /// Truncates or zero-extends the channel to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Opens an independent cursor (starting at offset 0) over the same bytes.
    fn try_clone(&self) -> io::Result<BoxedChannel>;

    /// Current length of the channel in bytes.
    fn byte_len(&self) -> io::Result<u64>;
}

/// The form in which channels are handed to `init` and `resume`.
pub type BoxedChannel = Box<dyn Channel>;

/// Fails with `ChannelCount` unless exactly `expected` channels were supplied.
pub(crate) fn expect_channels(
    codec: &'static str,
    channels: &[BoxedChannel],
    expected: usize,
) -> Result<()> {
    if channels.len() != expected {
        return Err(CodecError::ChannelCount {
            codec,
            expected,
            actual: channels.len(),
        });
    }
    Ok(())
}

/// Opens independent cursors over every channel, each positioned where its
/// source currently stands, for replaying a stream during resume.
pub(crate) fn clone_channels(channels: &mut [BoxedChannel]) -> Result<Vec<BoxedChannel>> {
    channels
        .iter_mut()
        .map(|c| {
            let at = c.stream_position()?;
            let mut clone = c.try_clone()?;
            clone.seek(SeekFrom::Start(at))?;
            Ok(clone)
        })
        .collect()
}

/// Takes the single channel out of a one-channel set.
pub(crate) fn single_channel(
    codec: &'static str,
    mut channels: Vec<BoxedChannel>,
) -> Result<BoxedChannel> {
    expect_channels(codec, &channels, 1)?;
    channels.pop().ok_or(CodecError::NotInitialized)
}
