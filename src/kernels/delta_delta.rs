// In: src/kernels/delta_delta.rs

//! This module contains the frame-based delta-of-delta transform.
//!
//! Items are grouped in frames of `FRAME_LEN`. For each frame the wrapping
//! deltas `d[i] = r[i] - r[i-1]` are taken at the element's native width
//! (`r[-1]` is the last raw value of the previous frame, zero at stream
//! start), and the frame is stored as `zigzag(min d)` followed by
//! `d[i] - min d` for every item. Slowly drifting series (timestamps,
//! counters) therefore turn into frames of tiny words that the flag codec
//! collapses to a byte or less each.
//!
//! A frame of `k` items is `k + 1` flag words, so a reader that gets fewer
//! than `FRAME_LEN + 1` words back knows it is looking at the final partial
//! frame. `commit` writes the pending partial frame and the next write rewinds
//! it, which keeps every frame but the last one full.

use log::debug;
use num_traits::{WrappingAdd, WrappingSub, Zero};

use crate::channel::{clone_channels, BoxedChannel};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::kernels::flag::writer::FlagMark;
use crate::kernels::flag::{FlagFormat, FlagReader, FlagWriter};
use crate::pipeline::{StreamReader, StreamWriter};
use crate::traits::{DeltaElement, Element};
use crate::utils::{signed_lt, unzigzag, zigzag};

/// Items per frame.
pub const FRAME_LEN: usize = 16;
/// Flag words per full frame: the baseline plus one word per item.
pub const FRAME_WORDS: usize = FRAME_LEN + 1;

//==================================================================================
// 1. Writer
//==================================================================================

pub struct DeltaDeltaWriter<E: DeltaElement, F: FlagFormat> {
    inner: FlagWriter<F::Word, F>,
    frame: [E::Int; FRAME_LEN],
    frame_len: usize,
    prev: E::Int,
    rollback: Option<FlagMark<F::Word>>,
}

impl<E, F> DeltaDeltaWriter<E, F>
where
    E: DeltaElement<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    pub fn new(config: CodecConfig) -> Self {
        Self {
            inner: FlagWriter::new(config),
            frame: [E::Int::zero(); FRAME_LEN],
            frame_len: 0,
            prev: E::Int::zero(),
            rollback: None,
        }
    }

    fn clear_state(&mut self) {
        self.frame_len = 0;
        self.prev = E::Int::zero();
        self.rollback = None;
    }

    /// Undoes the partial frame written by the last `commit`.
    fn undo_partial(&mut self) -> Result<()> {
        if let Some(mark) = self.rollback.take() {
            self.inner.rewind(mark)?;
        }
        Ok(())
    }

    /// Encodes the buffered items as one frame, starting from `self.prev`.
    fn emit_frame(&mut self) -> Result<()> {
        let values = &self.frame[..self.frame_len];
        let mut deltas = [E::Int::zero(); FRAME_LEN];
        let mut prev = self.prev;
        for (d, &v) in deltas.iter_mut().zip(values) {
            *d = v.wrapping_sub(&prev);
            prev = v;
        }
        let deltas = &deltas[..values.len()];
        let base = deltas
            .iter()
            .copied()
            .reduce(|min, d| if signed_lt(d, min) { d } else { min })
            .unwrap_or_else(E::Int::zero);

        self.inner.push_word(E::widen(zigzag(base)))?;
        for &d in deltas {
            self.inner.push_word(E::widen(d.wrapping_sub(&base)))?;
        }
        Ok(())
    }
}

impl<E, F> StreamWriter<E> for DeltaDeltaWriter<E, F>
where
    E: DeltaElement<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    fn channel_count(&self) -> usize {
        1
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        self.inner.init(channels)?;
        self.clear_state();
        Ok(())
    }

    fn write(&mut self, items: &[E]) -> Result<()> {
        self.inner.check_init()?;
        self.undo_partial()?;
        for &item in items {
            self.frame[self.frame_len] = item.to_int();
            self.frame_len += 1;
            if self.frame_len == FRAME_LEN {
                self.emit_frame()?;
                self.prev = self.frame[FRAME_LEN - 1];
                self.frame_len = 0;
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.undo_partial()?;
        if self.frame_len > 0 {
            let mark = self.inner.mark()?;
            self.emit_frame()?;
            self.rollback = Some(mark);
        }
        self.inner.commit_words()
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()?;
        self.clear_state();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn resume(&mut self, mut channels: Vec<BoxedChannel>, row_count: u64) -> Result<()> {
        let full_rows = row_count - row_count % FRAME_LEN as u64;
        let partial = (row_count - full_rows) as usize;

        let mut reader = DeltaDeltaReader::<E, F>::new(*self.inner.config());
        reader.init(clone_channels(&mut channels)?)?;
        let skipped = reader.skip(full_rows)?;
        let prev = reader.prev;
        let mut tail = [E::default(); FRAME_LEN];
        let read = if skipped == full_rows { reader.read(&mut tail[..partial])? } else { 0 };
        if skipped < full_rows || read < partial {
            return Err(CodecError::ResumeOutOfRange {
                requested: row_count,
                available: skipped + read as u64,
            });
        }

        let frames = full_rows / FRAME_LEN as u64;
        self.inner.resume_words(channels, frames * FRAME_WORDS as u64)?;
        self.clear_state();
        self.prev = prev;
        for (slot, item) in self.frame.iter_mut().zip(&tail[..partial]) {
            *slot = item.to_int();
        }
        self.frame_len = partial;
        debug!(
            "delta_delta: resumed after {} full frame(s) with {} buffered item(s)",
            frames, partial
        );
        Ok(())
    }

    fn create_reader(&self) -> Box<dyn StreamReader<E>> {
        Box::new(DeltaDeltaReader::<E, F>::new(*self.inner.config()))
    }
}

//==================================================================================
// 2. Reader
//==================================================================================

pub struct DeltaDeltaReader<E: DeltaElement, F: FlagFormat> {
    config: CodecConfig,
    inner: FlagReader<F::Word, F>,
    frame: [E::Int; FRAME_LEN],
    frame_len: usize,
    cursor: usize,
    prev: E::Int,
}

impl<E, F> DeltaDeltaReader<E, F>
where
    E: DeltaElement<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            inner: FlagReader::new(config),
            frame: [E::Int::zero(); FRAME_LEN],
            frame_len: 0,
            cursor: 0,
            prev: E::Int::zero(),
        }
    }

    /// Decodes the next frame. Returns `false` at end of stream.
    fn load_frame(&mut self) -> Result<bool> {
        let mut words = [F::Word::zero(); FRAME_WORDS];
        let n = self.inner.read_words(&mut words)?;
        match n {
            0 => return Ok(false),
            1 => return Err(CodecError::truncated("a delta-delta frame")),
            _ => {}
        }
        let base = unzigzag(E::narrow(words[0]));
        let mut prev = self.prev;
        for (slot, &w) in self.frame.iter_mut().zip(&words[1..n]) {
            prev = prev.wrapping_add(&E::narrow(w).wrapping_add(&base));
            *slot = prev;
        }
        self.prev = prev;
        self.frame_len = n - 1;
        self.cursor = 0;
        Ok(true)
    }
}

impl<E, F> StreamReader<E> for DeltaDeltaReader<E, F>
where
    E: DeltaElement<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    fn channel_count(&self) -> usize {
        1
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        self.inner.init(channels)?;
        self.frame_len = 0;
        self.cursor = 0;
        self.prev = E::Int::zero();
        Ok(())
    }

    fn read(&mut self, buf: &mut [E]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            if self.cursor == self.frame_len && !self.load_frame()? {
                break;
            }
            let take = (self.frame_len - self.cursor).min(buf.len() - n);
            for (slot, &v) in buf[n..n + take]
                .iter_mut()
                .zip(&self.frame[self.cursor..self.cursor + take])
            {
                *slot = E::from_int(v);
            }
            self.cursor += take;
            n += take;
        }
        Ok(n)
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        let mut left = count;
        while left > 0 {
            if self.cursor == self.frame_len && !self.load_frame()? {
                break;
            }
            let take = ((self.frame_len - self.cursor) as u64).min(left);
            self.cursor += take as usize;
            left -= take;
        }
        Ok(count - left)
    }

    fn create_writer(&self) -> Box<dyn StreamWriter<E>> {
        Box::new(DeltaDeltaWriter::<E, F>::new(self.config))
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::kernels::flag::{Flag32, Flag64};
    use crate::test_util::{boxed, decode, encode, rng, round_trip};
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rand::Rng;

    fn timestamps(len: usize) -> Vec<i64> {
        let mut rng = rng(42);
        let mut t = 1_700_000_000_000i64;
        (0..len)
            .map(|_| {
                t += 1000 + rng.random_range(-3i64..=3);
                t
            })
            .collect()
    }

    #[test]
    fn test_every_trailing_frame_length_round_trips() {
        let config = CodecConfig::default();
        let data = timestamps(80);
        for len in (0..=48).chain([64, 79, 80]) {
            let items = &data[..len];
            let back = round_trip(Box::new(DeltaDeltaWriter::<i64, Flag64>::new(config)), items);
            assert_eq!(back, items, "length {}", len);
        }
    }

    #[test]
    fn test_regular_series_is_tiny() {
        // Constant step: each frame is a baseline plus sixteen zero words.
        let items: Vec<u32> = (0..64).map(|i| 100 + i * 10).collect();
        let mut writer = DeltaDeltaWriter::<u32, Flag32>::new(CodecConfig::default());
        let channels = encode(&mut writer, &items);
        assert!(channels[0].len() < 40, "{} bytes", channels[0].len());

        let mut reader = DeltaDeltaReader::<u32, Flag32>::new(CodecConfig::default());
        assert_eq!(decode(&mut reader, &channels), items);
    }

    #[test]
    fn test_wrapping_and_signed_extremes() {
        let config = CodecConfig::default();
        let items: Vec<i8> = vec![127, -128, 0, -1, 1, 127, 127, -128, 5, -5];
        assert_eq!(round_trip(Box::new(DeltaDeltaWriter::<i8, Flag32>::new(config)), &items), items);

        let items: Vec<u64> = vec![u64::MAX - 2, u64::MAX - 1, u64::MAX, 0, 1, 2];
        assert_eq!(round_trip(Box::new(DeltaDeltaWriter::<u64, Flag64>::new(config)), &items), items);

        let mut rng = rng(9);
        let items: Vec<i32> = (0..500).map(|_| rng.random()).collect();
        assert_eq!(round_trip(Box::new(DeltaDeltaWriter::<i32, Flag32>::new(config)), &items), items);

        let items: Vec<u16> = (0..300u32).map(|i| (i * 7919 % 65536) as u16).collect();
        assert_eq!(round_trip(Box::new(DeltaDeltaWriter::<u16, Flag32>::new(config)), &items), items);
    }

    #[test]
    fn test_temporal_elements() {
        let config = CodecConfig::default();
        let start = NaiveDate::from_ymd_opt(2023, 12, 25).unwrap();
        let dates: Vec<NaiveDate> = (0..40).map(|i| start + Duration::days(i * 3)).collect();
        assert_eq!(round_trip(Box::new(DeltaDeltaWriter::<NaiveDate, Flag32>::new(config)), &dates), dates);

        let t0 = start.and_hms_opt(9, 30, 0).unwrap();
        let times: Vec<NaiveDateTime> = (0..37).map(|i| t0 + Duration::milliseconds(i * 250)).collect();
        assert_eq!(
            round_trip(Box::new(DeltaDeltaWriter::<NaiveDateTime, Flag64>::new(config)), &times),
            times
        );
    }

    #[test]
    fn test_commit_partial_frame_then_continue() {
        let items = timestamps(70);
        let ch = MemoryChannel::new();
        let mut writer = DeltaDeltaWriter::<i64, Flag64>::new(CodecConfig::default());
        writer.init(vec![ch.boxed()]).unwrap();
        let mut written = 0;
        for chunk in items.chunks(5) {
            writer.write(chunk).unwrap();
            writer.commit().unwrap();
            written += chunk.len();

            let mut reader = DeltaDeltaReader::<i64, Flag64>::new(CodecConfig::default());
            assert_eq!(decode(&mut reader, &[ch.share()]), &items[..written]);
        }

        let mut single = DeltaDeltaWriter::<i64, Flag64>::new(CodecConfig::default());
        assert_eq!(encode(&mut single, &items)[0].to_vec(), ch.to_vec());
    }

    #[test]
    fn test_skip_then_read_matches() {
        let items = timestamps(100);
        let mut writer = DeltaDeltaWriter::<i64, Flag64>::new(CodecConfig::default());
        let channels = encode(&mut writer, &items);
        for k in [0u64, 1, 15, 16, 17, 50, 99, 100] {
            let mut reader = DeltaDeltaReader::<i64, Flag64>::new(CodecConfig::default());
            reader.init(boxed(&channels)).unwrap();
            assert_eq!(reader.skip(k).unwrap(), k);
            assert_eq!(reader.read_one().unwrap(), items.get(k as usize).copied());
        }
    }
}
