// In: src/kernels/flag/writer.rs

//! The generic flag-codec encoder.
//!
//! Pending state between calls is at most one unpaired word or a count of
//! zero words seen at a pair boundary. `commit` writes that state out as tail
//! units without forgetting it; the next write truncates the tail and carries
//! on as if the commit had never happened, so the stream after any sequence
//! of commits is byte-identical to one written in a single pass.

use std::marker::PhantomData;

use log::{debug, warn};
use num_traits::Zero;

use super::reader::{locate_row, FlagReader};
use super::{encode_pair, encode_single, FlagFormat, MAX_UNIT_BYTES};
use crate::channel::{clone_channels, expect_channels, single_channel, BoxedChannel, ByteReader, ByteWriter};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::pipeline::{StreamReader, StreamWriter};
use crate::traits::Element;

/// Encoder state captured by `mark` and restored by `rewind`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlagMark<W> {
    position: u64,
    zeros: u32,
    first: Option<W>,
}

/// Encodes elements of type `E` with the flag format `F`.
pub struct FlagWriter<E, F: FlagFormat> {
    config: CodecConfig,
    out: Option<ByteWriter>,
    zeros: u32,
    first: Option<F::Word>,
    reopen: Option<u64>,
    _marker: PhantomData<fn() -> E>,
}

impl<E, F> FlagWriter<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
{
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            out: None,
            zeros: 0,
            first: None,
            reopen: None,
            _marker: PhantomData,
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    #[inline]
    fn out(&mut self) -> Result<&mut ByteWriter> {
        self.out.as_mut().ok_or(CodecError::NotInitialized)
    }

    pub(crate) fn check_init(&self) -> Result<()> {
        match self.out {
            Some(_) => Ok(()),
            None => Err(CodecError::NotInitialized),
        }
    }

    fn clear_state(&mut self) {
        self.zeros = 0;
        self.first = None;
        self.reopen = None;
    }

    /// Drops the tail units written by the last `commit`.
    #[inline]
    fn reopen_tail(&mut self) -> Result<()> {
        if let Some(pos) = self.reopen.take() {
            self.out()?.truncate_to(pos)?;
        }
        Ok(())
    }

    //------------------------------------------------------------------------------
    // Unit emission
    //------------------------------------------------------------------------------

    fn emit_pair(&mut self, a: F::Word, b: F::Word) -> Result<()> {
        let mut buf = [0u8; MAX_UNIT_BYTES];
        let n = encode_pair::<F>(a, b, &mut buf);
        self.out()?.write_all(&buf[..n])
    }

    fn emit_single(&mut self, a: F::Word) -> Result<()> {
        let mut buf = [0u8; MAX_UNIT_BYTES];
        let n = encode_single::<F>(a, &mut buf);
        self.out()?.write_all(&buf[..n])
    }

    fn emit_run(&mut self, run: u32) -> Result<()> {
        self.out()?.write_u8(F::run_flag(run))
    }

    /// Writes pending state as tail units and leaves it in place.
    fn emit_pending(&mut self) -> Result<()> {
        if let Some(a) = self.first {
            return self.emit_single(a);
        }
        match self.zeros {
            0 => Ok(()),
            1 => self.emit_single(F::Word::zero()),
            2 => self.emit_pair(F::Word::zero(), F::Word::zero()),
            n => self.emit_run(n),
        }
    }

    //------------------------------------------------------------------------------
    // Word-level interface shared with the transforms
    //------------------------------------------------------------------------------

    /// Encodes one word.
    #[inline]
    pub(crate) fn push_word(&mut self, w: F::Word) -> Result<()> {
        self.reopen_tail()?;
        if let Some(a) = self.first.take() {
            return self.emit_pair(a, w);
        }
        if w.is_zero() {
            self.zeros += 1;
            if self.zeros == F::MAX_RUN {
                self.zeros = 0;
                self.emit_run(F::MAX_RUN)?;
            }
            return Ok(());
        }
        match std::mem::take(&mut self.zeros) {
            0 => self.first = Some(w),
            1 => self.emit_pair(F::Word::zero(), w)?,
            2 => {
                self.emit_pair(F::Word::zero(), F::Word::zero())?;
                self.first = Some(w);
            }
            n => {
                self.emit_run(n)?;
                self.first = Some(w);
            }
        }
        Ok(())
    }

    pub(crate) fn push_words(&mut self, words: &[F::Word]) -> Result<()> {
        for &w in words {
            self.push_word(w)?;
        }
        Ok(())
    }

    /// Captures the encoder state at the current end of the stream.
    pub(crate) fn mark(&mut self) -> Result<FlagMark<F::Word>> {
        self.reopen_tail()?;
        let position = self.out()?.position();
        Ok(FlagMark {
            position,
            zeros: self.zeros,
            first: self.first,
        })
    }

    /// Returns to a state captured by `mark`, dropping everything written since.
    pub(crate) fn rewind(&mut self, mark: FlagMark<F::Word>) -> Result<()> {
        self.out()?.truncate_to(mark.position)?;
        self.zeros = mark.zeros;
        self.first = mark.first;
        self.reopen = None;
        Ok(())
    }

    /// Reopens the stream after `row_count` words by truncating to the unit
    /// holding the last kept word and re-encoding that unit's kept words.
    pub(crate) fn resume_words(&mut self, mut channels: Vec<BoxedChannel>, row_count: u64) -> Result<()> {
        expect_channels(F::NAME, &channels, 1)?;
        let replay = single_channel(F::NAME, clone_channels(&mut channels)?)?;
        let mut input = ByteReader::new(replay, self.config.buffer_size)?;
        let location = locate_row::<F>(&mut input, row_count)?;

        let mut out = ByteWriter::attach(single_channel(F::NAME, channels)?, self.config.buffer_size)?;
        out.reopen_at(location.offset)?;
        self.out = Some(out);
        self.clear_state();

        if location.split {
            warn!(
                "{}: resume at row {} lands inside a flag unit, recompressing {} word(s)",
                F::NAME,
                row_count,
                location.head.len()
            );
        }
        self.push_words(&location.head)?;
        log_metric!("event"="resume", "codec"=F::NAME, "rows"=&row_count, "offset"=&location.offset);
        Ok(())
    }

    pub(crate) fn commit_words(&mut self) -> Result<()> {
        self.reopen_tail()?;
        let tail_start = self.out()?.position();
        self.emit_pending()?;
        if self.out()?.position() > tail_start {
            self.reopen = Some(tail_start);
        }
        let out = self.out()?;
        out.flush()?;
        debug!("{}: committed, stream ends at {}", F::NAME, out.position());
        Ok(())
    }
}

impl<E, F> StreamWriter<E> for FlagWriter<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
{
    fn channel_count(&self) -> usize {
        1
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        let channel = single_channel(F::NAME, channels)?;
        self.out = Some(ByteWriter::new(channel, self.config.buffer_size)?);
        self.clear_state();
        debug!("{}: writer initialized", F::NAME);
        Ok(())
    }

    fn write(&mut self, items: &[E]) -> Result<()> {
        self.check_init()?;
        for &item in items {
            self.push_word(item.to_word())?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.commit_words()
    }

    fn reset(&mut self) -> Result<()> {
        self.out()?.reset()?;
        self.clear_state();
        debug!("{}: writer reset", F::NAME);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out()?.flush()
    }

    fn resume(&mut self, channels: Vec<BoxedChannel>, row_count: u64) -> Result<()> {
        self.resume_words(channels, row_count)
    }

    fn create_reader(&self) -> Box<dyn StreamReader<E>> {
        Box::new(FlagReader::<E, F>::new(self.config))
    }
}
