// In: src/kernels/flag/reader.rs

//! The generic flag-codec decoder.

use std::marker::PhantomData;

use log::debug;
use num_traits::Zero;

use super::writer::FlagWriter;
use super::{decode_unit, read_word, shape, FlagFormat, Shape, Unit};
use crate::channel::{single_channel, BoxedChannel, ByteReader};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::pipeline::{StreamReader, StreamWriter};
use crate::traits::Element;

/// Words already decoded from a unit but not yet handed out.
#[derive(Debug, Clone, Copy)]
enum Carry<W> {
    Empty,
    Value(W),
    Zeros(u32),
}

/// Decodes elements of type `E` from the flag format `F`.
pub struct FlagReader<E, F: FlagFormat> {
    config: CodecConfig,
    input: Option<ByteReader>,
    carry: Carry<F::Word>,
    _marker: PhantomData<fn() -> E>,
}

impl<E, F> FlagReader<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
{
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            input: None,
            carry: Carry::Empty,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn input(&mut self) -> Result<&mut ByteReader> {
        self.input.as_mut().ok_or(CodecError::NotInitialized)
    }

    /// Decodes into `buf` through `map`, draining the carry slot first.
    fn fill<T>(&mut self, buf: &mut [T], map: impl Fn(F::Word) -> T) -> Result<usize> {
        let zero = F::Word::zero();
        let mut n = 0;
        while n < buf.len() {
            match self.carry {
                Carry::Value(w) => {
                    buf[n] = map(w);
                    n += 1;
                    self.carry = Carry::Empty;
                    continue;
                }
                Carry::Zeros(z) => {
                    let take = (z as usize).min(buf.len() - n);
                    for slot in &mut buf[n..n + take] {
                        *slot = map(zero);
                    }
                    n += take;
                    let rest = z - take as u32;
                    self.carry = if rest > 0 { Carry::Zeros(rest) } else { Carry::Empty };
                    continue;
                }
                Carry::Empty => {}
            }

            match decode_unit::<F>(self.input()?)? {
                None => break,
                Some(Unit::Single(a)) => {
                    buf[n] = map(a);
                    n += 1;
                }
                Some(Unit::Pair(a, b)) => {
                    buf[n] = map(a);
                    n += 1;
                    if n < buf.len() {
                        buf[n] = map(b);
                        n += 1;
                    } else {
                        self.carry = Carry::Value(b);
                    }
                }
                Some(Unit::Zeros(z)) => self.carry = Carry::Zeros(z),
            }
        }
        Ok(n)
    }

    /// Word-level read used by the transforms.
    pub(crate) fn read_words(&mut self, buf: &mut [F::Word]) -> Result<usize> {
        self.fill(buf, |w| w)
    }

    pub(crate) fn skip_words(&mut self, count: u64) -> Result<u64> {
        let mut left = count;
        while left > 0 {
            match self.carry {
                Carry::Value(_) => {
                    self.carry = Carry::Empty;
                    left -= 1;
                    continue;
                }
                Carry::Zeros(z) => {
                    let take = (z as u64).min(left);
                    left -= take;
                    let rest = z - take as u32;
                    self.carry = if rest > 0 { Carry::Zeros(rest) } else { Carry::Empty };
                    continue;
                }
                Carry::Empty => {}
            }

            let input = self.input()?;
            let Some(flag) = input.read_u8()? else {
                break;
            };
            match shape::<F>(flag)? {
                Shape::Run(z) => self.carry = Carry::Zeros(z),
                Shape::Single(w) => {
                    skip_exact(input, w.count)?;
                    left -= 1;
                }
                Shape::Pair(wa, wb) if left >= 2 => {
                    skip_exact(input, wa.count + wb.count)?;
                    left -= 2;
                }
                Shape::Pair(wa, wb) => {
                    skip_exact(input, wa.count)?;
                    let b = read_word::<F>(input, wb)?;
                    self.carry = Carry::Value(b);
                    left -= 1;
                }
            }
        }
        Ok(count - left)
    }
}

fn skip_exact(input: &mut ByteReader, count: usize) -> Result<()> {
    if input.skip_bytes(count as u64)? < count as u64 {
        return Err(CodecError::truncated("a flag unit"));
    }
    Ok(())
}

/// Where a resumed writer picks up a flag stream.
#[derive(Debug)]
pub(crate) struct RowLocation<W> {
    /// Offset of the unit holding the last kept row.
    pub offset: u64,
    /// Words of that unit up to and including the last kept row.
    pub head: Vec<W>,
    /// True when the unit also holds rows past the kept ones.
    pub split: bool,
}

/// Walks units until the one holding row `row_count - 1`.
///
/// Re-encoding `head` from an empty encoder state reproduces exactly the
/// pending state a single-pass writer had at that row, so appending after a
/// resume yields the same bytes as never having stopped.
pub(crate) fn locate_row<F: FlagFormat>(
    input: &mut ByteReader,
    row_count: u64,
) -> Result<RowLocation<F::Word>> {
    let mut seen = 0u64;
    loop {
        let offset = input.position();
        if seen == row_count {
            return Ok(RowLocation {
                offset,
                head: Vec::new(),
                split: false,
            });
        }
        let Some(unit) = decode_unit::<F>(input)? else {
            return Err(CodecError::ResumeOutOfRange {
                requested: row_count,
                available: seen,
            });
        };
        let len = unit.word_count();
        if seen + len >= row_count {
            let keep = row_count - seen;
            let mut head = Vec::with_capacity(keep.min(F::MAX_RUN as u64) as usize);
            unit.take_into(keep, &mut head);
            return Ok(RowLocation {
                offset,
                head,
                split: keep < len,
            });
        }
        seen += len;
    }
}

impl<E, F> StreamReader<E> for FlagReader<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
{
    fn channel_count(&self) -> usize {
        1
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        let channel = single_channel(F::NAME, channels)?;
        self.input = Some(ByteReader::new(channel, self.config.buffer_size)?);
        self.carry = Carry::Empty;
        debug!("{}: reader initialized", F::NAME);
        Ok(())
    }

    fn read(&mut self, buf: &mut [E]) -> Result<usize> {
        self.fill(buf, E::from_word)
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        self.skip_words(count)
    }

    fn create_writer(&self) -> Box<dyn StreamWriter<E>> {
        Box::new(FlagWriter::<E, F>::new(self.config))
    }
}
