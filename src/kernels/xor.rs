// In: src/kernels/xor.rs

//! This module contains the XOR transform.
//!
//! Each word is stored as `value ^ previous`. It is particularly effective for
//! float values reinterpreted as integers, where slowly changing data only
//! flips a few low mantissa bits and the flag codec drops the zero bytes.

use num_traits::Zero;

use crate::channel::{clone_channels, BoxedChannel};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::kernels::flag::{FlagFormat, FlagReader, FlagWriter};
use crate::pipeline::{StreamReader, StreamWriter};
use crate::traits::Element;

/// Words decoded per inner read.
const CHUNK: usize = 256;

pub struct XorWriter<E, F: FlagFormat> {
    inner: FlagWriter<F::Word, F>,
    prev: F::Word,
    _marker: std::marker::PhantomData<fn() -> E>,
}

impl<E, F> XorWriter<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    pub fn new(config: CodecConfig) -> Self {
        Self {
            inner: FlagWriter::new(config),
            prev: F::Word::zero(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<E, F> StreamWriter<E> for XorWriter<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    fn channel_count(&self) -> usize {
        1
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        self.inner.init(channels)?;
        self.prev = F::Word::zero();
        Ok(())
    }

    fn write(&mut self, items: &[E]) -> Result<()> {
        self.inner.check_init()?;
        for &item in items {
            let w = item.to_word();
            self.inner.push_word(w ^ self.prev)?;
            self.prev = w;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit_words()
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()?;
        self.prev = F::Word::zero();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn resume(&mut self, mut channels: Vec<BoxedChannel>, row_count: u64) -> Result<()> {
        let mut reader = XorReader::<E, F>::new(*self.inner.config());
        reader.init(clone_channels(&mut channels)?)?;
        let skipped = reader.skip(row_count)?;
        if skipped < row_count {
            return Err(CodecError::ResumeOutOfRange {
                requested: row_count,
                available: skipped,
            });
        }
        self.inner.resume_words(channels, row_count)?;
        self.prev = reader.prev;
        Ok(())
    }

    fn create_reader(&self) -> Box<dyn StreamReader<E>> {
        Box::new(XorReader::<E, F>::new(*self.inner.config()))
    }
}

pub struct XorReader<E, F: FlagFormat> {
    config: CodecConfig,
    inner: FlagReader<F::Word, F>,
    prev: F::Word,
    _marker: std::marker::PhantomData<fn() -> E>,
}

impl<E, F> XorReader<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            inner: FlagReader::new(config),
            prev: F::Word::zero(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Decodes up to `limit` words, handing each reconstructed word to `sink`.
    fn decode(&mut self, limit: u64, mut sink: impl FnMut(usize, F::Word)) -> Result<u64> {
        let mut words = [F::Word::zero(); CHUNK];
        let mut done = 0u64;
        while done < limit {
            let want = ((limit - done) as usize).min(CHUNK);
            let n = self.inner.read_words(&mut words[..want])?;
            for (i, &e) in words[..n].iter().enumerate() {
                self.prev = self.prev ^ e;
                sink(done as usize + i, self.prev);
            }
            done += n as u64;
            if n < want {
                break;
            }
        }
        Ok(done)
    }
}

impl<E, F> StreamReader<E> for XorReader<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    fn channel_count(&self) -> usize {
        1
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        self.inner.init(channels)?;
        self.prev = F::Word::zero();
        Ok(())
    }

    fn read(&mut self, buf: &mut [E]) -> Result<usize> {
        let limit = buf.len() as u64;
        let n = self.decode(limit, |i, w| buf[i] = E::from_word(w))?;
        Ok(n as usize)
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        self.decode(count, |_, _| {})
    }

    fn create_writer(&self) -> Box<dyn StreamWriter<E>> {
        Box::new(XorWriter::<E, F>::new(self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::kernels::flag::{Flag32, Flag64};
    use crate::test_util::{decode, encode, round_trip};

    #[test]
    fn test_float_series_round_trip_and_shrinks() {
        let items: Vec<f64> = (0..200).map(|i| 20.0 + (i as f64) * 0.25).collect();
        let mut writer = XorWriter::<f64, Flag64>::new(CodecConfig::default());
        let channels = encode(&mut writer, &items);
        assert!(channels[0].len() < items.len() * 4);

        let mut reader = writer.create_reader();
        assert_eq!(decode(reader.as_mut(), &channels), items);
    }

    #[test]
    fn test_repeated_values_encode_as_zero_runs() {
        let items = vec![7.5f32; 100];
        let mut writer = XorWriter::<f32, Flag32>::new(CodecConfig::default());
        let channels = encode(&mut writer, &items);
        // The first word pairs with a zero; the other 98 zeros are one run byte.
        assert_eq!(channels[0].to_vec().len(), 3 + 1);

        let back = round_trip(Box::new(XorWriter::<f32, Flag32>::new(CodecConfig::default())), &items);
        assert_eq!(back, items);
    }

    #[test]
    fn test_resume_restores_previous_value() {
        let items: Vec<i64> = (0..50).map(|i| 1_000 + i * i).collect();
        let mut writer = XorWriter::<i64, Flag64>::new(CodecConfig::default());
        let ch = encode(&mut writer, &items).remove(0);

        let mut resumed = XorWriter::<i64, Flag64>::new(CodecConfig::default());
        resumed.resume(vec![ch.boxed()], 33).unwrap();
        resumed.write(&[-1, -2]).unwrap();
        resumed.commit().unwrap();

        let mut expected = items[..33].to_vec();
        expected.extend([-1, -2]);
        let mut reader = resumed.create_reader();
        assert_eq!(decode(reader.as_mut(), &[ch.share()]), expected);

        let mut again = XorWriter::<i64, Flag64>::new(CodecConfig::default());
        assert!(matches!(
            again.resume(vec![MemoryChannel::from_bytes(ch.to_vec()).boxed()], 36),
            Err(CodecError::ResumeOutOfRange { available: 35, .. })
        ));
    }
}
