// In: src/pipeline/mod.rs

//! This module defines the composition contract every codec implements.
//!
//! A pipeline is a reader or writer whose shape is fixed at construction: a
//! transform owns the flag codec it feeds, and the whole stack is handed its
//! channels through one `init` call. Readers and writers create their
//! counterparts (`create_writer` / `create_reader`) with the same formats and
//! configuration, which is what resume relies on to replay a stream.
//!
//! Lifecycle of a writer:
//!
//! ```text
//! new -> init(channels) -> write* -> commit -> write* -> commit ...
//!                 \-> resume(channels, rows) -> write* -> commit
//! ```
//!
//! `commit` leaves a complete, decodable stream in the channels but keeps the
//! encoder's pending state, so the next write reopens the tail it emitted.
//! `flush` only pushes already-encoded bytes down; it never closes a pair,
//! frame or word.

use crate::channel::BoxedChannel;
use crate::error::{CodecError, Result};

pub mod bounded;
pub mod dynamic;


pub use bounded::Bounded;
pub use dynamic::{build_reader, build_writer, ValueReader, ValueWriter};

//==================================================================================
// 1. Reader Contract
//==================================================================================

/// Decodes a stream of `T` from one or more channels.
pub trait StreamReader<T: Default + Send>: Send {
    /// Number of channels `init` expects.
    fn channel_count(&self) -> usize;

    /// Number of items the stream is declared to hold, if the codec knows it.
    fn item_count(&self) -> Option<u64> {
        None
    }

    /// Wires the reader to its channels, each positioned at the stream start.
    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()>;

    /// Fills `buf` from the front and returns how many items were decoded.
    /// Fewer than `buf.len()` means the stream ended.
    fn read(&mut self, buf: &mut [T]) -> Result<usize>;

    /// Like `read`, into `buf[offset..offset + count]`.
    fn read_range(&mut self, buf: &mut [T], offset: usize, count: usize) -> Result<usize> {
        check_range(buf.len(), offset, count)?;
        self.read(&mut buf[offset..offset + count])
    }

    /// Decodes a single item; `None` at end of stream.
    fn read_one(&mut self) -> Result<Option<T>> {
        let mut slot = [T::default()];
        if self.read(&mut slot)? == 1 {
            let [item] = slot;
            Ok(Some(item))
        } else {
            Ok(None)
        }
    }

    /// Advances past up to `count` items and returns how many were skipped.
    fn skip(&mut self, count: u64) -> Result<u64>;

    /// A writer producing streams this reader decodes.
    fn create_writer(&self) -> Box<dyn StreamWriter<T>>;
}

//==================================================================================
// 2. Writer Contract
//==================================================================================

/// Encodes a stream of `T` into one or more channels.
pub trait StreamWriter<T: Default + Send>: Send {
    /// Number of channels `init` and `resume` expect.
    fn channel_count(&self) -> usize;

    /// Starts a new stream at each channel's current offset.
    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()>;

    fn write(&mut self, items: &[T]) -> Result<()>;

    /// Like `write`, for `items[offset..offset + count]`.
    fn write_range(&mut self, items: &[T], offset: usize, count: usize) -> Result<()> {
        check_range(items.len(), offset, count)?;
        self.write(&items[offset..offset + count])
    }

    fn write_one(&mut self, item: T) -> Result<()> {
        self.write(std::slice::from_ref(&item))
    }

    /// Emits all pending state and flushes, leaving a decodable stream.
    /// The writer stays open for further writes.
    fn commit(&mut self) -> Result<()>;

    /// Truncates the channels back to where `init` found them and clears all state.
    fn reset(&mut self) -> Result<()>;

    /// Pushes already-encoded bytes to the channels.
    fn flush(&mut self) -> Result<()>;

    /// Reopens an existing stream holding at least `row_count` items so the
    /// next write appends after row `row_count`. Anything after that row is dropped.
    fn resume(&mut self, channels: Vec<BoxedChannel>, row_count: u64) -> Result<()>;

    /// A reader decoding the streams this writer produces.
    fn create_reader(&self) -> Box<dyn StreamReader<T>>;
}

/// Validates an `(offset, count)` window against a slice of `len` items.
pub(crate) fn check_range(len: usize, offset: usize, count: usize) -> Result<()> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(CodecError::InvalidArgument(format!(
            "range {}..{}+{} is outside a buffer of {} items",
            offset, offset, count, len
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range(10, 2, 8).is_ok());
        assert!(check_range(10, 0, 0).is_ok());
        assert!(matches!(
            check_range(10, 3, 8),
            Err(CodecError::InvalidArgument(_))
        ));
        assert!(check_range(10, usize::MAX, 2).is_err());
    }
}
