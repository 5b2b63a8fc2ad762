// In: src/kernels/dfcm.rs

//! This module contains the DFCM (differential finite context method)
//! predictive transform.
//!
//! A table of recent word deltas, indexed by a rolling hash of the deltas
//! that preceded them, predicts the next word as `last + table[hash]`. Only
//! `value ^ prediction` is stored, so a series that repeats a pattern of
//! steps produces words that are mostly zero bytes. Encoder and decoder run
//! the same `Predictor` and stay in lockstep.

use log::debug;
use num_traits::{WrappingAdd, WrappingSub, Zero};

use crate::channel::{clone_channels, BoxedChannel};
use crate::config::{CodecConfig, DFCM_TABLE_BITS_RANGE};
use crate::error::{CodecError, Result};
use crate::kernels::flag::{FlagFormat, FlagReader, FlagWriter};
use crate::pipeline::{StreamReader, StreamWriter};
use crate::traits::{Element, Word};

/// High bits of each float delta folded into the hash.
const HASH_BITS: u32 = 24;
const CHUNK: usize = 256;

//==================================================================================
// 1. Predictor
//==================================================================================

/// The shared prediction state.
#[derive(Debug, Clone)]
pub struct Predictor<W: Word> {
    table: Vec<W>,
    mask: usize,
    shift: u32,
    hash: usize,
    last: W,
}

impl<W: Word> Predictor<W> {
    /// A zeroed predictor with `2^table_bits` entries.
    ///
    /// Float predictors hash the top `HASH_BITS` of each delta (sign, exponent
    /// and leading mantissa); integer predictors hash the low bits, where small
    /// steps actually differ.
    pub fn new(table_bits: u8, float: bool) -> Result<Self> {
        if !DFCM_TABLE_BITS_RANGE.contains(&table_bits) {
            return Err(CodecError::Config(format!(
                "dfcm_table_bits must be within {:?}, got {}",
                DFCM_TABLE_BITS_RANGE, table_bits
            )));
        }
        let size = 1usize << table_bits;
        Ok(Self {
            table: vec![W::zero(); size],
            mask: size - 1,
            shift: if float { W::BITS - HASH_BITS } else { 0 },
            hash: 0,
            last: W::zero(),
        })
    }

    #[inline]
    pub fn predict(&self) -> W {
        self.last.wrapping_add(&self.table[self.hash])
    }

    /// Feeds the actual word that followed the last prediction.
    #[inline]
    pub fn update(&mut self, value: W) {
        let delta = value.wrapping_sub(&self.last);
        self.table[self.hash] = delta;
        let folded = (delta >> self.shift as usize).as_u64() as usize;
        self.hash = ((self.hash << 2) ^ folded) & self.mask;
        self.last = value;
    }

    pub fn reset(&mut self) {
        self.table.fill(W::zero());
        self.hash = 0;
        self.last = W::zero();
    }
}

//==================================================================================
// 2. Writer
//==================================================================================

pub struct DfcmWriter<E, F: FlagFormat> {
    inner: FlagWriter<F::Word, F>,
    predictor: Predictor<F::Word>,
    _marker: std::marker::PhantomData<fn() -> E>,
}

impl<E, F> DfcmWriter<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: FlagWriter::new(config),
            predictor: Predictor::new(config.dfcm_table_bits, E::IEEE_FLOAT)?,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<E, F> StreamWriter<E> for DfcmWriter<E, F>
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
        self.predictor.reset();
        Ok(())
    }

    fn write(&mut self, items: &[E]) -> Result<()> {
        self.inner.check_init()?;
        for &item in items {
            let w = item.to_word();
            self.inner.push_word(w ^ self.predictor.predict())?;
            self.predictor.update(w);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit_words()
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()?;
        self.predictor.reset();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn resume(&mut self, mut channels: Vec<BoxedChannel>, row_count: u64) -> Result<()> {
        let mut reader = DfcmReader::<E, F>::paired(*self.inner.config(), &self.predictor);
        reader.init(clone_channels(&mut channels)?)?;
        let replayed = reader.skip(row_count)?;
        if replayed < row_count {
            return Err(CodecError::ResumeOutOfRange {
                requested: row_count,
                available: replayed,
            });
        }
        self.inner.resume_words(channels, row_count)?;
        self.predictor = reader.predictor;
        debug!("dfcm: predictor replayed over {} row(s)", row_count);
        Ok(())
    }

    fn create_reader(&self) -> Box<dyn StreamReader<E>> {
        Box::new(DfcmReader::<E, F>::paired(*self.inner.config(), &self.predictor))
    }
}

//==================================================================================
// 3. Reader
//==================================================================================

pub struct DfcmReader<E, F: FlagFormat> {
    config: CodecConfig,
    inner: FlagReader<F::Word, F>,
    predictor: Predictor<F::Word>,
    _marker: std::marker::PhantomData<fn() -> E>,
}

impl<E, F> DfcmReader<E, F>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            inner: FlagReader::new(config),
            predictor: Predictor::new(config.dfcm_table_bits, E::IEEE_FLOAT)?,
            _marker: std::marker::PhantomData,
        })
    }

    /// A reader paired with an existing writer; its config was checked on construction.
    fn paired(config: CodecConfig, predictor: &Predictor<F::Word>) -> Self {
        let mut predictor = predictor.clone();
        predictor.reset();
        Self {
            config,
            inner: FlagReader::new(config),
            predictor,
            _marker: std::marker::PhantomData,
        }
    }

    fn decode(&mut self, limit: u64, mut sink: impl FnMut(usize, F::Word)) -> Result<u64> {
        let mut words = [F::Word::zero(); CHUNK];
        let mut done = 0u64;
        while done < limit {
            let want = ((limit - done) as usize).min(CHUNK);
            let n = self.inner.read_words(&mut words[..want])?;
            for (i, &e) in words[..n].iter().enumerate() {
                let w = e ^ self.predictor.predict();
                self.predictor.update(w);
                sink(done as usize + i, w);
            }
            done += n as u64;
            if n < want {
                break;
            }
        }
        Ok(done)
    }
}

impl<E, F> StreamReader<E> for DfcmReader<E, F>
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
        self.predictor.reset();
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
        let mut predictor = self.predictor.clone();
        predictor.reset();
        Box::new(DfcmWriter::<E, F> {
            inner: FlagWriter::new(self.config),
            predictor,
            _marker: std::marker::PhantomData,
        })
    }
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::flag::{Flag32, Flag64};
    use crate::test_util::{encode, rng, round_trip};
    use rand::Rng;

    #[test]
    fn test_predictor_locks_onto_constant_step() {
        let mut p = Predictor::<u32>::new(8, true).unwrap();
        let mut misses = 0;
        for i in 1..400u32 {
            let v = i.wrapping_mul(0x0100_0012);
            if p.predict() != v {
                misses += 1;
            }
            p.update(v);
        }
        assert!(misses <= 2, "{} misses", misses);
    }

    #[test]
    fn test_integer_predictor_learns_repeating_small_steps() {
        // Steps 3, 3, 10 repeat; only the low bits of each delta tell them apart.
        let steps = [3u32, 3, 10];
        let mut low = Predictor::<u32>::new(8, false).unwrap();
        let mut high = Predictor::<u32>::new(8, true).unwrap();
        let (mut low_misses, mut high_misses) = (0, 0);
        let mut v = 0u32;
        for i in 0..300 {
            v += steps[i % 3];
            if i >= 30 {
                low_misses += (low.predict() != v) as u32;
                high_misses += (high.predict() != v) as u32;
            }
            low.update(v);
            high.update(v);
        }
        assert_eq!(low_misses, 0);
        assert!(high_misses > 100, "{} misses", high_misses);
    }

    #[test]
    fn test_table_bits_out_of_range_is_an_error() {
        assert!(matches!(Predictor::<u64>::new(64, false), Err(CodecError::Config(_))));
        let bad = CodecConfig {
            dfcm_table_bits: 64,
            ..CodecConfig::default()
        };
        assert!(matches!(DfcmWriter::<u64, Flag64>::new(bad), Err(CodecError::Config(_))));
        assert!(matches!(DfcmReader::<f32, Flag32>::new(bad), Err(CodecError::Config(_))));

        let tiny = CodecConfig {
            dfcm_table_bits: 3,
            ..CodecConfig::default()
        };
        assert!(DfcmWriter::<u32, Flag32>::new(tiny).is_err());
    }

    #[test]
    fn test_round_trip_patterns_and_noise() {
        let config = CodecConfig::default();
        let pattern: Vec<u64> = (0..1000u64).map(|i| i * 3 + (i % 4) * 1000).collect();
        assert_eq!(round_trip(Box::new(DfcmWriter::<u64, Flag64>::new(config).unwrap()), &pattern), pattern);

        let mut rng = rng(5);
        let noise: Vec<f64> = (0..300).map(|_| rng.random::<f64>() * 1e6).collect();
        assert_eq!(round_trip(Box::new(DfcmWriter::<f64, Flag64>::new(config).unwrap()), &noise), noise);

        let small = CodecConfig {
            dfcm_table_bits: 4,
            ..config
        };
        let ints: Vec<i16> = (0..200).map(|i| ((i * 37) % 500 - 250) as i16).collect();
        assert_eq!(round_trip(Box::new(DfcmWriter::<i16, Flag32>::new(small).unwrap()), &ints), ints);
    }

    #[test]
    fn test_predictable_series_compresses() {
        let pattern: Vec<u32> = (0..1000u32).map(|i| i * 12).collect();
        let mut writer = DfcmWriter::<u32, Flag32>::new(CodecConfig::default()).unwrap();
        let bytes = encode(&mut writer, &pattern)[0].len();
        assert!(bytes < 100, "{} bytes", bytes);
    }
}
