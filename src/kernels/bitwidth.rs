// In: src/kernels/bitwidth.rs

//! This module contains the sub-byte bit-width codec.
//!
//! Items of 1, 2, 4, 8 or 16 bits are packed LSB-first into a 32-bit
//! accumulator that is written as four little-endian bytes once full. Whole
//! accumulator words are packed and unpacked in one step when the batch
//! allows; the remainder goes item by item.
//!
//! `commit` writes only the bytes that cover the used bits of a partial word;
//! the next write truncates them and keeps filling the same word. Because
//! padding bits are indistinguishable from zero items, readers take an item
//! count from the caller.

use std::io::{Seek, SeekFrom};
use std::marker::PhantomData;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::channel::{clone_channels, expect_channels, single_channel, BoxedChannel, ByteReader, ByteWriter};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::pipeline::{StreamReader, StreamWriter};

const WORD_BITS: u32 = 32;
const WORD_BYTES: usize = 4;

/// Number of bits per packed item.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BitWidth {
    W1,
    W2,
    W4,
    W8,
    W16,
}

impl BitWidth {
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            BitWidth::W1 => 1,
            BitWidth::W2 => 2,
            BitWidth::W4 => 4,
            BitWidth::W8 => 8,
            BitWidth::W16 => 16,
        }
    }

    /// Items per 32-bit accumulator word.
    #[inline]
    pub const fn per_word(self) -> usize {
        (WORD_BITS / self.bits()) as usize
    }

    #[inline]
    const fn mask(self) -> u32 {
        (1u32 << self.bits()) - 1
    }

    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            1 => Ok(BitWidth::W1),
            2 => Ok(BitWidth::W2),
            4 => Ok(BitWidth::W4),
            8 => Ok(BitWidth::W8),
            16 => Ok(BitWidth::W16),
            other => Err(CodecError::InvalidArgument(format!(
                "bit width must be 1, 2, 4, 8 or 16, got {}",
                other
            ))),
        }
    }
}

/// A value that can be packed into a fixed number of bits.
pub trait BitItem: Copy + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Widest width the type can fill.
    const MAX_WIDTH: BitWidth;

    fn to_bits(self) -> u32;
    fn from_bits(bits: u32) -> Self;
}

impl BitItem for bool {
    const MAX_WIDTH: BitWidth = BitWidth::W1;

    #[inline]
    fn to_bits(self) -> u32 {
        self as u32
    }

    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits != 0
    }
}

impl BitItem for u8 {
    const MAX_WIDTH: BitWidth = BitWidth::W8;

    #[inline]
    fn to_bits(self) -> u32 {
        self as u32
    }

    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits as u8
    }
}

impl BitItem for u16 {
    const MAX_WIDTH: BitWidth = BitWidth::W16;

    #[inline]
    fn to_bits(self) -> u32 {
        self as u32
    }

    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits as u16
    }
}

fn check_width<T: BitItem>(width: BitWidth) -> Result<()> {
    if width.bits() > T::MAX_WIDTH.bits() {
        return Err(CodecError::InvalidArgument(format!(
            "a {}-bit width cannot hold items of at most {} bits",
            width.bits(),
            T::MAX_WIDTH.bits()
        )));
    }
    Ok(())
}

//==================================================================================
// 1. Writer
//==================================================================================

pub struct BitWriter<T: BitItem> {
    config: CodecConfig,
    width: BitWidth,
    out: Option<ByteWriter>,
    acc: u32,
    bit_index: u32,
    reopen: Option<u64>,
    _marker: PhantomData<fn() -> T>,
}

/// The boolean codec: a 1-bit `BitWriter`.
pub type BoolWriter = BitWriter<bool>;

impl<T: BitItem> BitWriter<T> {
    /// Fails if `width` is wider than `T` can use.
    pub fn new(width: BitWidth, config: CodecConfig) -> Result<Self> {
        check_width::<T>(width)?;
        Ok(Self {
            config,
            width,
            out: None,
            acc: 0,
            bit_index: 0,
            reopen: None,
            _marker: PhantomData,
        })
    }

    pub fn width(&self) -> BitWidth {
        self.width
    }

    #[inline]
    fn out(&mut self) -> Result<&mut ByteWriter> {
        self.out.as_mut().ok_or(CodecError::NotInitialized)
    }

    fn clear_state(&mut self) {
        self.acc = 0;
        self.bit_index = 0;
        self.reopen = None;
    }

    #[inline]
    fn push(&mut self, bits: u32) -> Result<()> {
        self.acc |= bits << self.bit_index;
        self.bit_index += self.width.bits();
        if self.bit_index == WORD_BITS {
            let word = std::mem::take(&mut self.acc);
            self.bit_index = 0;
            self.out()?.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }
}

impl<T: BitItem> StreamWriter<T> for BitWriter<T> {
    fn channel_count(&self) -> usize {
        1
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        let channel = single_channel("bit_packed", channels)?;
        self.out = Some(ByteWriter::new(channel, self.config.buffer_size)?);
        self.clear_state();
        Ok(())
    }

    fn write(&mut self, items: &[T]) -> Result<()> {
        let mask = self.width.mask();
        if let Some(bad) = items.iter().find(|v| v.to_bits() & !mask != 0) {
            return Err(CodecError::InvalidArgument(format!(
                "value {:?} does not fit in {} bits",
                bad,
                self.width.bits()
            )));
        }
        if let Some(pos) = self.reopen.take() {
            self.out()?.truncate_to(pos)?;
        }
        self.out()?;

        let bits = self.width.bits();
        let per_word = self.width.per_word();
        let mut rest = items;
        // Top up a partial word item by item.
        while self.bit_index != 0 && !rest.is_empty() {
            self.push(rest[0].to_bits())?;
            rest = &rest[1..];
        }
        // Whole words straight from the batch.
        let mut words = rest.chunks_exact(per_word);
        for chunk in &mut words {
            let word = chunk
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, v)| acc | v.to_bits() << (i as u32 * bits));
            self.out()?.write_all(&word.to_le_bytes())?;
        }
        for v in words.remainder() {
            self.push(v.to_bits())?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(pos) = self.reopen.take() {
            self.out()?.truncate_to(pos)?;
        }
        if self.bit_index > 0 {
            let used = self.bit_index.div_ceil(8) as usize;
            let bytes = self.acc.to_le_bytes();
            let out = self.out()?;
            let start = out.position();
            out.write_all(&bytes[..used])?;
            self.reopen = Some(start);
        }
        self.out()?.flush()?;
        debug!("bit_packed: committed with {} bit(s) pending", self.bit_index);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.out()?.reset()?;
        self.clear_state();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out()?.flush()
    }

    // The stream carries no item count, so any row inside the last byte's
    // padding is accepted too: rows 46 to 48 of a 45-item W1 stream resume
    // as if the padding bits were zero-valued items.
    fn resume(&mut self, mut channels: Vec<BoxedChannel>, row_count: u64) -> Result<()> {
        expect_channels("bit_packed", &channels, 1)?;
        let origin = channels[0].stream_position()?;
        let available_bytes = channels[0].byte_len()?.saturating_sub(origin);
        let width = self.width.bits() as u64;
        let out_of_range = || CodecError::ResumeOutOfRange {
            requested: row_count,
            available: available_bytes.saturating_mul(8) / width,
        };
        let total_bits = row_count.checked_mul(width).ok_or_else(out_of_range)?;
        if total_bits.div_ceil(8) > available_bytes {
            return Err(out_of_range());
        }

        let word_start = origin + total_bits / WORD_BITS as u64 * WORD_BYTES as u64;
        let bit_index = (total_bits % WORD_BITS as u64) as u32;
        let mut acc = 0u32;
        if bit_index > 0 {
            let mut replay = single_channel("bit_packed", clone_channels(&mut channels)?)?;
            replay.seek(SeekFrom::Start(word_start))?;
            let mut input = ByteReader::new(replay, WORD_BYTES)?;
            let mut bytes = [0u8; WORD_BYTES];
            let used = bit_index.div_ceil(8) as usize;
            input.read_exact_or_corrupt(&mut bytes[..used], "a packed word")?;
            acc = u32::from_le_bytes(bytes) & ((1u32 << bit_index) - 1);
        }

        let mut out = ByteWriter::attach(single_channel("bit_packed", channels)?, self.config.buffer_size)?;
        out.reopen_at(word_start)?;
        self.out = Some(out);
        self.clear_state();
        self.acc = acc;
        self.bit_index = bit_index;
        log_metric!("event"="resume", "codec"="bit_packed", "rows"=&row_count, "bit_index"=&bit_index);
        Ok(())
    }

    fn create_reader(&self) -> Box<dyn StreamReader<T>> {
        Box::new(BitReader::<T> {
            config: self.config,
            width: self.width,
            item_count: None,
            input: None,
            acc: 0,
            bits_left: 0,
            delivered: 0,
            _marker: PhantomData,
        })
    }
}

//==================================================================================
// 2. Reader
//==================================================================================

pub struct BitReader<T: BitItem> {
    config: CodecConfig,
    width: BitWidth,
    item_count: Option<u64>,
    input: Option<ByteReader>,
    acc: u32,
    bits_left: u32,
    delivered: u64,
    _marker: PhantomData<fn() -> T>,
}

/// The boolean codec: a 1-bit `BitReader`.
pub type BoolReader = BitReader<bool>;

impl<T: BitItem> BitReader<T> {
    pub fn new(width: BitWidth, config: CodecConfig) -> Result<Self> {
        check_width::<T>(width)?;
        Ok(Self {
            config,
            width,
            item_count: None,
            input: None,
            acc: 0,
            bits_left: 0,
            delivered: 0,
            _marker: PhantomData,
        })
    }

    /// Stops the reader after `count` items so trailing padding is never decoded.
    pub fn with_item_count(mut self, count: u64) -> Self {
        self.item_count = Some(count);
        self
    }

    fn remaining(&self) -> u64 {
        self.item_count
            .map_or(u64::MAX, |n| n.saturating_sub(self.delivered))
    }

    /// Loads the next accumulator word. Returns `false` at end of stream.
    fn refill(&mut self) -> Result<bool> {
        let input = self.input.as_mut().ok_or(CodecError::NotInitialized)?;
        let mut bytes = [0u8; WORD_BYTES];
        let n = input.read_into(&mut bytes)?;
        self.acc = u32::from_le_bytes(bytes);
        self.bits_left = n as u32 * 8;
        Ok(self.bits_left >= self.width.bits())
    }

    #[inline]
    fn next_bits(&mut self) -> Result<Option<u32>> {
        let bits = self.width.bits();
        if self.bits_left < bits && !self.refill()? {
            return Ok(None);
        }
        let v = self.acc & self.width.mask();
        // `bits` is at most 16, so the shift never reaches the word width.
        self.acc >>= bits;
        self.bits_left -= bits;
        Ok(Some(v))
    }
}

impl<T: BitItem> StreamReader<T> for BitReader<T> {
    fn channel_count(&self) -> usize {
        1
    }

    fn item_count(&self) -> Option<u64> {
        self.item_count
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        let channel = single_channel("bit_packed", channels)?;
        self.input = Some(ByteReader::new(channel, self.config.buffer_size)?);
        self.acc = 0;
        self.bits_left = 0;
        self.delivered = 0;
        Ok(())
    }

    fn read(&mut self, buf: &mut [T]) -> Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        let bits = self.width.bits();
        let per_word = self.width.per_word();
        let mask = self.width.mask();
        let mut n = 0;
        while n < want {
            if self.bits_left == 0 && want - n >= per_word {
                if !self.refill()? {
                    break;
                }
                if self.bits_left == WORD_BITS {
                    let word = self.acc;
                    for (i, slot) in buf[n..n + per_word].iter_mut().enumerate() {
                        *slot = T::from_bits((word >> (i as u32 * bits)) & mask);
                    }
                    n += per_word;
                    self.bits_left = 0;
                    continue;
                }
            }
            match self.next_bits()? {
                Some(v) => {
                    buf[n] = T::from_bits(v);
                    n += 1;
                }
                None => break,
            }
        }
        self.delivered += n as u64;
        Ok(n)
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        let want = count.min(self.remaining());
        let bits = self.width.bits() as u64;
        // Drain what is already loaded, then seek over whole words.
        let mut done = 0u64;
        while done < want && self.bits_left >= bits as u32 {
            self.next_bits()?;
            done += 1;
        }
        let per_word = self.width.per_word() as u64;
        let whole_words = (want - done) / per_word;
        if whole_words > 0 {
            let input = self.input.as_mut().ok_or(CodecError::NotInitialized)?;
            let skipped = input.skip_bytes(whole_words * WORD_BYTES as u64)?;
            done += skipped / WORD_BYTES as u64 * per_word;
            if skipped < whole_words * WORD_BYTES as u64 {
                // Stream ends inside the skipped span; count the items in the partial word.
                let tail_bytes = skipped % WORD_BYTES as u64;
                done += tail_bytes * 8 / bits;
                self.delivered += done;
                return Ok(done);
            }
        }
        while done < want {
            if self.next_bits()?.is_none() {
                break;
            }
            done += 1;
        }
        self.delivered += done;
        Ok(done)
    }

    fn create_writer(&self) -> Box<dyn StreamWriter<T>> {
        Box::new(BitWriter::<T> {
            config: self.config,
            width: self.width,
            out: None,
            acc: 0,
            bit_index: 0,
            reopen: None,
            _marker: PhantomData,
        })
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::test_util::{boxed, encode, rng};
    use rand::Rng;

    fn read_n<T: BitItem>(width: BitWidth, channels: &[MemoryChannel], n: u64) -> Vec<T> {
        let mut reader = BitReader::<T>::new(width, CodecConfig::default())
            .unwrap()
            .with_item_count(n);
        reader.init(boxed(channels)).unwrap();
        let mut out = vec![T::default(); n as usize + 5];
        let got = reader.read(&mut out).unwrap();
        out.truncate(got);
        out
    }

    #[test]
    fn test_packs_lsb_first_little_endian() {
        let mut writer = BitWriter::<u8>::new(BitWidth::W4, CodecConfig::default()).unwrap();
        let channels = encode(&mut writer, &[0x1, 0x2, 0x3]);
        // Three nibbles use 12 bits: two bytes of a partial word.
        assert_eq!(channels[0].to_vec(), vec![0x21, 0x03]);

        let mut writer = BoolWriter::new(BitWidth::W1, CodecConfig::default()).unwrap();
        let mut flags = vec![false; 32];
        flags[0] = true;
        flags[31] = true;
        let channels = encode(&mut writer, &flags);
        assert_eq!(channels[0].to_vec(), vec![0x01, 0x00, 0x00, 0x80]);
    }

    #[test]
    fn test_round_trip_every_width() {
        let mut rng = rng(17);
        for width in [BitWidth::W1, BitWidth::W2, BitWidth::W4, BitWidth::W8, BitWidth::W16] {
            for len in [0usize, 1, 7, 31, 32, 33, 100] {
                let max = 1u32 << width.bits();
                let items: Vec<u16> = (0..len).map(|_| rng.random_range(0..max) as u16).collect();
                let mut writer = BitWriter::<u16>::new(width, CodecConfig::default()).unwrap();
                let channels = encode(&mut writer, &items);
                assert_eq!(read_n::<u16>(width, &channels, len as u64), items, "{:?} x {}", width, len);
            }
        }
    }

    #[test]
    fn test_value_too_wide_is_rejected() {
        let ch = MemoryChannel::new();
        let mut writer = BitWriter::<u8>::new(BitWidth::W2, CodecConfig::default()).unwrap();
        writer.init(vec![ch.boxed()]).unwrap();
        assert!(matches!(writer.write(&[1, 4]), Err(CodecError::InvalidArgument(_))));
        assert!(BitWriter::<bool>::new(BitWidth::W2, CodecConfig::default()).is_err());
        assert!(BitWidth::from_bits(3).is_err());
    }

    #[test]
    fn test_commit_partial_word_then_continue() {
        let items: Vec<u8> = (0..50).map(|i| (i % 4) as u8).collect();
        let ch = MemoryChannel::new();
        let mut writer = BitWriter::<u8>::new(BitWidth::W2, CodecConfig::default()).unwrap();
        writer.init(vec![ch.boxed()]).unwrap();
        for chunk in items.chunks(3) {
            writer.write(chunk).unwrap();
            writer.commit().unwrap();
        }
        let mut single = BitWriter::<u8>::new(BitWidth::W2, CodecConfig::default()).unwrap();
        assert_eq!(encode(&mut single, &items)[0].to_vec(), ch.to_vec());
        assert_eq!(read_n::<u8>(BitWidth::W2, &[ch], 50), items);
    }

    #[test]
    fn test_resume_mid_word() {
        let items: Vec<bool> = (0..45).map(|i| i % 3 == 0).collect();
        let mut writer = BoolWriter::new(BitWidth::W1, CodecConfig::default()).unwrap();
        let ch = encode(&mut writer, &items).remove(0);

        for n in [0u64, 5, 32, 40, 45] {
            let copy = MemoryChannel::from_bytes(ch.to_vec());
            let mut resumed = BoolWriter::new(BitWidth::W1, CodecConfig::default()).unwrap();
            resumed.resume(vec![copy.boxed()], n).unwrap();
            resumed.write(&[true, true, false, true]).unwrap();
            resumed.commit().unwrap();

            let mut expected = items[..n as usize].to_vec();
            expected.extend([true, true, false, true]);
            assert_eq!(read_n::<bool>(BitWidth::W1, &[copy], n + 4), expected, "resume at {}", n);
        }

        let mut resumed = BoolWriter::new(BitWidth::W1, CodecConfig::default()).unwrap();
        assert!(matches!(
            resumed.resume(vec![ch.boxed()], 49),
            Err(CodecError::ResumeOutOfRange { available: 48, .. })
        ));
        // Padding rows of the last byte resume like any other.
        let copy = MemoryChannel::from_bytes(ch.to_vec());
        let mut padded = BoolWriter::new(BitWidth::W1, CodecConfig::default()).unwrap();
        assert!(padded.resume(vec![copy.boxed()], 47).is_ok());
    }

    #[test]
    fn test_huge_resume_row_count_is_out_of_range() {
        let items: Vec<u16> = (0..10).collect();
        let mut writer = BitWriter::<u16>::new(BitWidth::W16, CodecConfig::default()).unwrap();
        let ch = encode(&mut writer, &items).remove(0);

        for rows in [u64::MAX / 4, u64::MAX] {
            let mut resumed = BitWriter::<u16>::new(BitWidth::W16, CodecConfig::default()).unwrap();
            assert!(matches!(
                resumed.resume(vec![ch.boxed()], rows),
                Err(CodecError::ResumeOutOfRange { available: 10, .. })
            ));
        }
    }

    #[test]
    fn test_dropped_resume_keeps_committed_bytes() {
        let items: Vec<u8> = (0..13).map(|i| (i % 4) as u8).collect();
        let mut writer = BitWriter::<u8>::new(BitWidth::W2, CodecConfig::default()).unwrap();
        let ch = encode(&mut writer, &items).remove(0);
        let committed = ch.to_vec();

        for n in [0u64, 5, 12, 13] {
            let mut resumed = BitWriter::<u8>::new(BitWidth::W2, CodecConfig::default()).unwrap();
            resumed.resume(vec![ch.boxed()], n).unwrap();
            drop(resumed);
            assert_eq!(ch.to_vec(), committed, "resume at {}", n);
        }
    }

    #[test]
    fn test_item_count_and_skip() {
        let items: Vec<u8> = (0..70).map(|i| (i % 16) as u8).collect();
        let mut writer = BitWriter::<u8>::new(BitWidth::W4, CodecConfig::default()).unwrap();
        let channels = encode(&mut writer, &items);

        for k in [0u64, 3, 8, 9, 40, 69, 70] {
            let mut reader = BitReader::<u8>::new(BitWidth::W4, CodecConfig::default())
                .unwrap()
                .with_item_count(70);
            reader.init(boxed(&channels)).unwrap();
            assert_eq!(reader.skip(k).unwrap(), k);
            assert_eq!(reader.read_one().unwrap(), items.get(k as usize).copied(), "skip {}", k);
        }

        let mut reader = BitReader::<u8>::new(BitWidth::W4, CodecConfig::default())
            .unwrap()
            .with_item_count(70);
        reader.init(boxed(&channels)).unwrap();
        assert_eq!(reader.skip(1000).unwrap(), 70);
        assert_eq!(reader.item_count(), Some(70));
    }
}
