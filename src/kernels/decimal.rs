// In: src/kernels/decimal.rs

//! This module contains the decimal codec.
//!
//! Every value is one UInt64 flag pair unit `(zigzag(mantissa), scale)`. The
//! pair is always written whole, with no zero-run folding, so row `n` starts
//! at unit `n` and resume only has to skip units.

use log::debug;

use crate::channel::{clone_channels, expect_channels, single_channel, BoxedChannel, ByteReader, ByteWriter};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::kernels::flag::{decode_unit, encode_pair, Flag64, Unit, MAX_UNIT_BYTES};
use crate::pipeline::{StreamReader, StreamWriter};
use crate::types::Decimal;
use crate::utils::{unzigzag, zigzag};

fn decode_decimal(input: &mut ByteReader) -> Result<Option<Decimal>> {
    match decode_unit::<Flag64>(input)? {
        None => Ok(None),
        Some(Unit::Pair(mantissa, scale)) => {
            let scale = u8::try_from(scale)
                .map_err(|_| CodecError::CorruptStream(format!("decimal scale {} out of range", scale)))?;
            let mantissa = unzigzag(mantissa) as i64;
            Decimal::new(mantissa, scale)
                .map(Some)
                .map_err(|e| CodecError::CorruptStream(e.to_string()))
        }
        Some(other) => Err(CodecError::CorruptStream(format!(
            "expected a decimal pair unit, found {:?}",
            other
        ))),
    }
}

pub struct DecimalWriter {
    config: CodecConfig,
    out: Option<ByteWriter>,
}

impl DecimalWriter {
    pub fn new(config: CodecConfig) -> Self {
        Self { config, out: None }
    }

    #[inline]
    fn out(&mut self) -> Result<&mut ByteWriter> {
        self.out.as_mut().ok_or(CodecError::NotInitialized)
    }
}

impl StreamWriter<Decimal> for DecimalWriter {
    fn channel_count(&self) -> usize {
        1
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        let channel = single_channel("decimal", channels)?;
        self.out = Some(ByteWriter::new(channel, self.config.buffer_size)?);
        Ok(())
    }

    fn write(&mut self, items: &[Decimal]) -> Result<()> {
        let out = self.out()?;
        let mut unit = [0u8; MAX_UNIT_BYTES];
        for d in items {
            let n = encode_pair::<Flag64>(zigzag(d.mantissa() as u64), d.scale() as u64, &mut unit);
            out.write_all(&unit[..n])?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.out()?.flush()?;
        debug!("decimal: committed");
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.out()?.reset()
    }

    fn flush(&mut self) -> Result<()> {
        self.out()?.flush()
    }

    fn resume(&mut self, mut channels: Vec<BoxedChannel>, row_count: u64) -> Result<()> {
        expect_channels("decimal", &channels, 1)?;
        let replay = single_channel("decimal", clone_channels(&mut channels)?)?;
        let mut input = ByteReader::new(replay, self.config.buffer_size)?;
        let mut seen = 0;
        while seen < row_count {
            if decode_decimal(&mut input)?.is_none() {
                return Err(CodecError::ResumeOutOfRange {
                    requested: row_count,
                    available: seen,
                });
            }
            seen += 1;
        }

        let mut out = ByteWriter::attach(single_channel("decimal", channels)?, self.config.buffer_size)?;
        out.reopen_at(input.position())?;
        self.out = Some(out);
        log_metric!("event"="resume", "codec"="decimal", "rows"=&row_count);
        Ok(())
    }

    fn create_reader(&self) -> Box<dyn StreamReader<Decimal>> {
        Box::new(DecimalReader::new(self.config))
    }
}

pub struct DecimalReader {
    config: CodecConfig,
    input: Option<ByteReader>,
}

impl DecimalReader {
    pub fn new(config: CodecConfig) -> Self {
        Self { config, input: None }
    }

    #[inline]
    fn input(&mut self) -> Result<&mut ByteReader> {
        self.input.as_mut().ok_or(CodecError::NotInitialized)
    }
}

impl StreamReader<Decimal> for DecimalReader {
    fn channel_count(&self) -> usize {
        1
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        let channel = single_channel("decimal", channels)?;
        self.input = Some(ByteReader::new(channel, self.config.buffer_size)?);
        Ok(())
    }

    fn read(&mut self, buf: &mut [Decimal]) -> Result<usize> {
        let input = self.input()?;
        let mut n = 0;
        while n < buf.len() {
            match decode_decimal(input)? {
                Some(d) => buf[n] = d,
                None => break,
            }
            n += 1;
        }
        Ok(n)
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        let input = self.input()?;
        let mut done = 0;
        while done < count && decode_decimal(input)?.is_some() {
            done += 1;
        }
        Ok(done)
    }

    fn create_writer(&self) -> Box<dyn StreamWriter<Decimal>> {
        Box::new(DecimalWriter::new(self.config))
    }
}
