// In: src/pipeline/dynamic.rs

//! This module is the typed-value boundary of the crate.
//!
//! Inside a pipeline every codec is monomorphized for its element type. Callers
//! that only know a column's `ColumnSpec` at runtime (a page format reading its
//! own header, for instance) go through the object-safe `ValueWriter` /
//! `ValueReader` traits instead, which exchange `Value`s and dispatch once to
//! the concrete codec stack chosen by `build_writer` / `build_reader`.

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::channel::BoxedChannel;
use crate::config::{CodecConfig, ColumnSpec, Encoding};
use crate::error::{CodecError, Result};
use crate::kernels::flag::{Flag32, Flag64, Flag64Lsb, FlagFormat, FlagWriter};
use crate::kernels::{BitWriter, DecimalWriter, DeltaDeltaWriter, DfcmWriter, VarWriter, XorWriter};
use crate::pipeline::{Bounded, StreamReader, StreamWriter};
use crate::traits::{DeltaElement, Element};
use crate::types::{Decimal, ElementKind, Value, ValueType};

/// Items converted per inner call when reading values.
const BATCH: usize = 1024;

//==================================================================================
// 1. Object-safe Value Traits
//==================================================================================

/// A reader that yields `Value`s of one `ElementKind`.
pub trait ValueReader: Send {
    fn kind(&self) -> ElementKind;
    fn channel_count(&self) -> usize;
    fn item_count(&self) -> Option<u64>;
    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()>;

    /// Appends up to `max` values to `out` and returns how many were appended.
    fn read_values(&mut self, out: &mut Vec<Value>, max: usize) -> Result<usize>;

    fn read_value(&mut self) -> Result<Option<Value>>;
    fn skip(&mut self, count: u64) -> Result<u64>;
}

/// A writer that accepts `Value`s of one `ElementKind`.
pub trait ValueWriter: Send {
    fn kind(&self) -> ElementKind;
    fn channel_count(&self) -> usize;
    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()>;

    /// Writes all `values`, or none of them if any has the wrong kind.
    fn write_values(&mut self, values: &[Value]) -> Result<()>;

    fn write_value(&mut self, value: Value) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn reset(&mut self) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn resume(&mut self, channels: Vec<BoxedChannel>, row_count: u64) -> Result<()>;
    fn create_reader(&self) -> Box<dyn ValueReader>;
}

//==================================================================================
// 2. Typed Adapters
//==================================================================================

struct TypedReader<T> {
    inner: Box<dyn StreamReader<T>>,
    scratch: Vec<T>,
}

impl<T> ValueReader for TypedReader<T>
where
    T: ValueType + Default + Clone,
{
    fn kind(&self) -> ElementKind {
        T::KIND
    }

    fn channel_count(&self) -> usize {
        self.inner.channel_count()
    }

    fn item_count(&self) -> Option<u64> {
        self.inner.item_count()
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        self.inner.init(channels)
    }

    fn read_values(&mut self, out: &mut Vec<Value>, max: usize) -> Result<usize> {
        let mut total = 0;
        while total < max {
            let want = (max - total).min(BATCH);
            self.scratch.resize(want, T::default());
            let n = self.inner.read(&mut self.scratch[..want])?;
            out.extend(self.scratch.drain(..n).map(ValueType::into_value));
            total += n;
            if n < want {
                break;
            }
        }
        Ok(total)
    }

    fn read_value(&mut self) -> Result<Option<Value>> {
        Ok(self.inner.read_one()?.map(ValueType::into_value))
    }

    fn skip(&mut self, count: u64) -> Result<u64> {
        self.inner.skip(count)
    }
}

struct TypedWriter<T> {
    inner: Box<dyn StreamWriter<T>>,
    item_count: Option<u64>,
}

impl<T> ValueWriter for TypedWriter<T>
where
    T: ValueType + Default + Clone,
{
    fn kind(&self) -> ElementKind {
        T::KIND
    }

    fn channel_count(&self) -> usize {
        self.inner.channel_count()
    }

    fn init(&mut self, channels: Vec<BoxedChannel>) -> Result<()> {
        self.inner.init(channels)
    }

    fn write_values(&mut self, values: &[Value]) -> Result<()> {
        let items = values
            .iter()
            .cloned()
            .map(T::from_value)
            .collect::<Result<Vec<T>>>()?;
        self.inner.write(&items)
    }

    fn write_value(&mut self, value: Value) -> Result<()> {
        self.inner.write_one(T::from_value(value)?)
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn resume(&mut self, channels: Vec<BoxedChannel>, row_count: u64) -> Result<()> {
        self.inner.resume(channels, row_count)
    }

    fn create_reader(&self) -> Box<dyn ValueReader> {
        let reader = self.inner.create_reader();
        let inner: Box<dyn StreamReader<T>> = match self.item_count {
            Some(limit) => Box::new(Bounded::new(reader, limit)),
            None => reader,
        };
        Box::new(TypedReader {
            inner,
            scratch: Vec::new(),
        })
    }
}

fn typed<T>(inner: Box<dyn StreamWriter<T>>, item_count: Option<u64>) -> Box<dyn ValueWriter>
where
    T: ValueType + Default + Clone,
{
    Box::new(TypedWriter { inner, item_count })
}

//==================================================================================
// 3. Codec Stacks per Element Family
//==================================================================================

fn integer_stack<E, F>(encoding: Encoding, config: CodecConfig) -> Result<Option<Box<dyn StreamWriter<E>>>>
where
    E: DeltaElement<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    let writer: Box<dyn StreamWriter<E>> = match encoding {
        Encoding::Plain => Box::new(FlagWriter::<E, F>::new(config)),
        Encoding::DeltaDelta => Box::new(DeltaDeltaWriter::<E, F>::new(config)),
        Encoding::Xor => Box::new(XorWriter::<E, F>::new(config)),
        Encoding::Dfcm => Box::new(DfcmWriter::<E, F>::new(config)?),
        _ => return Ok(None),
    };
    Ok(Some(writer))
}

fn float_stack<E, F>(encoding: Encoding, config: CodecConfig) -> Result<Option<Box<dyn StreamWriter<E>>>>
where
    E: Element<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    let writer: Box<dyn StreamWriter<E>> = match encoding {
        Encoding::Plain => Box::new(FlagWriter::<E, F>::new(config)),
        Encoding::Xor => Box::new(XorWriter::<E, F>::new(config)),
        Encoding::Dfcm => Box::new(DfcmWriter::<E, F>::new(config)?),
        _ => return Ok(None),
    };
    Ok(Some(writer))
}

fn temporal_stack<E, F>(encoding: Encoding, config: CodecConfig) -> Result<Option<Box<dyn StreamWriter<E>>>>
where
    E: DeltaElement<Word = F::Word>,
    F: FlagFormat,
    F::Word: Element<Word = F::Word>,
{
    let writer: Box<dyn StreamWriter<E>> = match encoding {
        Encoding::Plain => Box::new(FlagWriter::<E, F>::new(config)),
        Encoding::DeltaDelta => Box::new(DeltaDeltaWriter::<E, F>::new(config)),
        Encoding::Xor => Box::new(XorWriter::<E, F>::new(config)),
        _ => return Ok(None),
    };
    Ok(Some(writer))
}

//==================================================================================
// 4. Builders
//==================================================================================

/// Builds the writer pipeline described by `spec`.
///
/// Fails with `UnsupportedType` for (kind, encoding) pairs no codec covers and
/// with `Config` if `config` does not validate.
pub fn build_writer(spec: &ColumnSpec, config: CodecConfig) -> Result<Box<dyn ValueWriter>> {
    use ElementKind as K;

    config.validate()?;
    let unsupported = || {
        CodecError::UnsupportedType(format!(
            "{} columns cannot use {:?} encoding",
            spec.kind, spec.encoding
        ))
    };
    let n = spec.item_count;
    let enc = spec.encoding;

    let writer = match (spec.kind, enc) {
        (K::UInt8, Encoding::BitPacked { width }) => typed::<u8>(Box::new(BitWriter::<u8>::new(width, config)?), n),
        (K::UInt16, Encoding::BitPacked { width }) => typed::<u16>(Box::new(BitWriter::<u16>::new(width, config)?), n),
        (K::Boolean, Encoding::BitPacked { width }) => typed::<bool>(Box::new(BitWriter::<bool>::new(width, config)?), n),

        (K::UInt64, Encoding::Lsb) => typed::<u64>(Box::new(FlagWriter::<u64, Flag64Lsb>::new(config)), n),
        (K::Int64, Encoding::Lsb) => typed::<i64>(Box::new(FlagWriter::<i64, Flag64Lsb>::new(config)), n),
        (K::DateTime, Encoding::Lsb) => typed::<NaiveDateTime>(Box::new(FlagWriter::<NaiveDateTime, Flag64Lsb>::new(config)), n),

        (K::Int8, e) => typed(integer_stack::<i8, Flag32>(e, config)?.ok_or_else(unsupported)?, n),
        (K::Int16, e) => typed(integer_stack::<i16, Flag32>(e, config)?.ok_or_else(unsupported)?, n),
        (K::Int32, e) => typed(integer_stack::<i32, Flag32>(e, config)?.ok_or_else(unsupported)?, n),
        (K::Int64, e) => typed(integer_stack::<i64, Flag64>(e, config)?.ok_or_else(unsupported)?, n),
        (K::UInt8, e) => typed(integer_stack::<u8, Flag32>(e, config)?.ok_or_else(unsupported)?, n),
        (K::UInt16, e) => typed(integer_stack::<u16, Flag32>(e, config)?.ok_or_else(unsupported)?, n),
        (K::UInt32, e) => typed(integer_stack::<u32, Flag32>(e, config)?.ok_or_else(unsupported)?, n),
        (K::UInt64, e) => typed(integer_stack::<u64, Flag64>(e, config)?.ok_or_else(unsupported)?, n),

        (K::Float32, e) => typed(float_stack::<f32, Flag32>(e, config)?.ok_or_else(unsupported)?, n),
        (K::Float64, e) => typed(float_stack::<f64, Flag64>(e, config)?.ok_or_else(unsupported)?, n),

        (K::Date, e) => typed(temporal_stack::<NaiveDate, Flag32>(e, config)?.ok_or_else(unsupported)?, n),
        (K::DateTime, e) => typed(temporal_stack::<NaiveDateTime, Flag64>(e, config)?.ok_or_else(unsupported)?, n),

        (K::Decimal, Encoding::Plain) => typed::<Decimal>(Box::new(DecimalWriter::new(config)), n),
        (K::String, Encoding::VarLength { layout }) => typed::<String>(Box::new(VarWriter::<String>::new(layout, config)), n),
        (K::Bytes, Encoding::VarLength { layout }) => typed::<Vec<u8>>(Box::new(VarWriter::<Vec<u8>>::new(layout, config)), n),

        _ => return Err(unsupported()),
    };
    debug!("built {} writer with {:?} encoding", spec.kind, enc);
    Ok(writer)
}

/// Builds the reader pipeline described by `spec`.
///
/// The reader is the counterpart of the writer `build_writer` returns for the
/// same arguments. When `spec.item_count` is set, the reader stops there.
pub fn build_reader(spec: &ColumnSpec, config: CodecConfig) -> Result<Box<dyn ValueReader>> {
    Ok(build_writer(spec, config)?.create_reader())
}
