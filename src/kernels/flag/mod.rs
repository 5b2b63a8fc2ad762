// In: src/kernels/flag/mod.rs

//! This module contains the flag-byte integer codec that underlies every
//! fixed-width pipeline.
//!
//! Words are encoded two at a time. One flag byte carries a 4-bit descriptor
//! per word (the high nibble describes the first word), followed by only the
//! significant bytes of each word in little-endian order. Runs of three or
//! more zero words starting at a pair boundary collapse into a single RLE
//! flag byte. A low nibble of `0xF` marks a unit holding just one word.
//!
//! The three wire formats (`Flag32`, `Flag64`, `Flag64Lsb`) differ only in
//! how they assign descriptors and RLE bytes; that difference is captured by
//! the `FlagFormat` trait, and a single generic `FlagReader` / `FlagWriter`
//! pair drives all of them.

use std::fmt::Debug;

use crate::channel::ByteReader;
use crate::error::{CodecError, Result};
use crate::traits::Word;
use crate::utils::read_le_window;

pub mod reader;
pub mod uint32;
pub mod uint64;
pub mod uint64_lsb;
pub mod writer;

pub use reader::FlagReader;
pub use uint32::Flag32;
pub use uint64::Flag64;
pub use uint64_lsb::Flag64Lsb;
pub use writer::FlagWriter;


/// Low nibble marking a unit that carries only one word.
pub const SINGLE: u8 = 0x0F;

/// Largest encoded unit: a flag byte plus two full 64-bit words.
pub const MAX_UNIT_BYTES: usize = 1 + 8 + 8;

/// The stored bytes of one word: skip `skip` low bytes, keep `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: usize,
    pub count: usize,
}

impl Window {
    #[inline]
    pub const fn new(skip: usize, count: usize) -> Self {
        Self { skip, count }
    }
}

/// A wire format for the flag codec.
pub trait FlagFormat: Copy + Default + Debug + Send + Sync + 'static {
    type Word: Word;

    /// Short name used in logs and channel-count errors.
    const NAME: &'static str;

    /// Longest zero run a single RLE byte can hold.
    const MAX_RUN: u32;

    /// The descriptor nibble and stored window for `value`.
    fn classify(value: Self::Word) -> (u8, Window);

    /// The stored window behind a descriptor nibble, `None` if the nibble is reserved.
    fn window(nibble: u8) -> Option<Window>;

    /// The zero-run length if `flag` is an RLE byte.
    fn run_length(flag: u8) -> Option<u32>;

    /// The RLE byte for `run` zeros, `3 <= run <= MAX_RUN`.
    fn run_flag(run: u32) -> u8;
}

/// One decoded flag unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit<W> {
    Pair(W, W),
    Single(W),
    Zeros(u32),
}

impl<W: Word> Unit<W> {
    /// Number of words the unit expands to.
    #[inline]
    pub fn word_count(&self) -> u64 {
        match self {
            Unit::Pair(..) => 2,
            Unit::Single(_) => 1,
            Unit::Zeros(n) => *n as u64,
        }
    }

    /// Appends the first `count` words of the unit to `out`.
    pub fn take_into(&self, count: u64, out: &mut Vec<W>) {
        match *self {
            Unit::Pair(a, b) => out.extend([a, b].into_iter().take(count as usize)),
            Unit::Single(a) => out.extend(std::iter::once(a).take(count as usize)),
            Unit::Zeros(n) => out.extend(std::iter::repeat(W::zero()).take(count.min(n as u64) as usize)),
        }
    }
}

/// What a flag byte announces, before any value byte is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Run(u32),
    Single(Window),
    Pair(Window, Window),
}

//==================================================================================
// 1. Generic Unit Encoding
//==================================================================================

/// Encodes a two-word unit into `out` and returns its length in bytes.
pub fn encode_pair<F: FlagFormat>(a: F::Word, b: F::Word, out: &mut [u8; MAX_UNIT_BYTES]) -> usize {
    let (hi, wa) = F::classify(a);
    let (lo, wb) = F::classify(b);
    out[0] = (hi << 4) | lo;
    let mut len = 1;
    len += put_window(a.as_u64(), wa, &mut out[len..]);
    len += put_window(b.as_u64(), wb, &mut out[len..]);
    len
}

/// Encodes a one-word unit into `out` and returns its length in bytes.
pub fn encode_single<F: FlagFormat>(a: F::Word, out: &mut [u8; MAX_UNIT_BYTES]) -> usize {
    let (hi, wa) = F::classify(a);
    out[0] = (hi << 4) | SINGLE;
    1 + put_window(a.as_u64(), wa, &mut out[1..])
}

#[inline]
fn put_window(value: u64, window: Window, out: &mut [u8]) -> usize {
    crate::utils::write_le_window(value, window.skip, window.count, out);
    window.count
}

//==================================================================================
// 2. Generic Unit Decoding
//==================================================================================

fn reserved<F: FlagFormat>(nibble: u8) -> CodecError {
    CodecError::CorruptStream(format!(
        "reserved descriptor nibble {:#x} in a {} stream",
        nibble,
        F::NAME
    ))
}

/// Interprets a flag byte.
pub(crate) fn shape<F: FlagFormat>(flag: u8) -> Result<Shape> {
    if let Some(run) = F::run_length(flag) {
        return Ok(Shape::Run(run));
    }
    let (hi, lo) = (flag >> 4, flag & 0x0F);
    let first = F::window(hi).ok_or_else(|| reserved::<F>(hi))?;
    if lo == SINGLE {
        return Ok(Shape::Single(first));
    }
    let second = F::window(lo).ok_or_else(|| reserved::<F>(lo))?;
    Ok(Shape::Pair(first, second))
}

/// Reads the stored bytes of one word.
pub(crate) fn read_word<F: FlagFormat>(input: &mut ByteReader, window: Window) -> Result<F::Word> {
    let mut bytes = [0u8; 8];
    input.read_exact_or_corrupt(&mut bytes[..window.count], "a flag unit")?;
    Ok(F::Word::from_u64(read_le_window(&bytes[..window.count], window.skip)))
}

/// Decodes the next unit, `None` at a clean end of stream.
pub(crate) fn decode_unit<F: FlagFormat>(input: &mut ByteReader) -> Result<Option<Unit<F::Word>>> {
    let Some(flag) = input.read_u8()? else {
        return Ok(None);
    };
    let unit = match shape::<F>(flag)? {
        Shape::Run(n) => Unit::Zeros(n),
        Shape::Single(w) => Unit::Single(read_word::<F>(input, w)?),
        Shape::Pair(wa, wb) => {
            let a = read_word::<F>(input, wa)?;
            let b = read_word::<F>(input, wb)?;
            Unit::Pair(a, b)
        }
    };
    Ok(Some(unit))
}
